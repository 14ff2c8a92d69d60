//! Frame sources.
//!
//! - Local video files via FFmpeg (feature: ingest-file-ffmpeg)
//! - Synthetic `stub://` sources for tests and demos
//!
//! A source reports the video's frame rate and declared frame count up front,
//! then yields frames in increasing index order until it returns `Ok(None)`.
//! Sources are single-pass: a new pass opens a new source.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;

use anyhow::Result;

use crate::frame::Frame;
use crate::record::VideoProperties;

pub use file::{FileConfig, FileSource, FileStats};

/// Lazy, finite, non-restartable sequence of frames.
pub trait FrameSource {
    /// Frame rate and declared frame count, known before the first frame.
    fn properties(&self) -> &VideoProperties;

    /// Next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}
