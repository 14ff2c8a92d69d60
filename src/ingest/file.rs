//! Local file frame source.
//!
//! `FileSource` reads frames from a local video file. Paths starting with
//! `stub://` produce synthetic frames instead, which keeps tests and demos
//! independent of FFmpeg. Synthetic parameters may be given in the path:
//!
//! `stub://street?fps=25&frames=250&available=200&width=64&height=48`
//!
//! `frames` is the declared length; `available` (default: `frames`) is how
//! many frames are actually produced, so a source can end early.

use anyhow::{anyhow, Result};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::FrameSource;
use crate::frame::Frame;
use crate::record::VideoProperties;

const STUB_SCHEME: &str = "stub://";

/// Configuration for a local file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Local file path (e.g., "clips/street.mp4") or a `stub://` URI.
    pub path: String,
    /// Synthetic frame rate.
    pub fps: f64,
    /// Synthetic declared frame count.
    pub frames: u64,
    /// Synthetic frames actually produced; `None` produces all declared frames.
    pub available_frames: Option<u64>,
    pub width: u32,
    pub height: u32,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            fps: 30.0,
            frames: 300,
            available_frames: None,
            width: 64,
            height: 48,
        }
    }
}

impl FileConfig {
    pub fn for_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Applies `?key=value&...` parameters of a `stub://` path.
    fn apply_stub_params(&mut self) -> Result<()> {
        let Some((_, query)) = self.path.split_once('?') else {
            return Ok(());
        };
        let query = query.to_string();
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("stub parameter '{}' is missing a value", pair))?;
            let invalid = |e: &dyn std::fmt::Display| anyhow!("stub parameter {}={}: {}", key, value, e);
            match key {
                "fps" => self.fps = value.parse::<f64>().map_err(|e| invalid(&e))?,
                "frames" => self.frames = value.parse::<u64>().map_err(|e| invalid(&e))?,
                "available" => self.available_frames = Some(value.parse::<u64>().map_err(|e| invalid(&e))?),
                "width" => self.width = value.parse::<u32>().map_err(|e| invalid(&e))?,
                "height" => self.height = value.parse::<u32>().map_err(|e| invalid(&e))?,
                other => return Err(anyhow!("unknown stub parameter '{}'", other)),
            }
        }
        Ok(())
    }
}

/// Local file frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticFileSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    /// Opens the source and reads its properties. Fails when the frame rate
    /// is unusable, since no timestamp could be derived.
    pub fn open(mut config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        if config.path.starts_with(STUB_SCHEME) {
            config.apply_stub_params()?;
            Ok(Self {
                backend: FileBackend::Synthetic(SyntheticFileSource::new(config)?),
            })
        } else {
            #[cfg(feature = "ingest-file-ffmpeg")]
            {
                Ok(Self {
                    backend: FileBackend::Ffmpeg(FfmpegFileSource::new(config)?),
                })
            }
            #[cfg(not(feature = "ingest-file-ffmpeg"))]
            {
                Err(anyhow!(
                    "decoding '{}' requires the ingest-file-ffmpeg feature",
                    config.path
                ))
            }
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> FileStats {
        match &self.backend {
            FileBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.stats(),
        }
    }
}

impl FrameSource for FileSource {
    fn properties(&self) -> &VideoProperties {
        match &self.backend {
            FileBackend::Synthetic(source) => &source.properties,
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.properties(),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => Ok(source.next_frame()),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }
}

/// Statistics for a file source.
#[derive(Clone, Debug)]
pub struct FileStats {
    pub frames_decoded: u64,
    pub path: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticFileSource {
    config: FileConfig,
    properties: VideoProperties,
    frame_count: u64,
}

impl SyntheticFileSource {
    fn new(config: FileConfig) -> Result<Self> {
        let properties = VideoProperties::new(config.fps, config.frames)?;
        log::info!(
            "FileSource: opened {} (synthetic, {} frames at {} fps)",
            config.path,
            config.frames,
            config.fps
        );
        Ok(Self {
            config,
            properties,
            frame_count: 0,
        })
    }

    fn next_frame(&mut self) -> Option<Frame> {
        let available = self.config.available_frames.unwrap_or(self.config.frames);
        if self.frame_count >= available {
            return None;
        }
        let index = self.frame_count;
        self.frame_count += 1;
        let pixels = self.generate_synthetic_pixels(index);
        Some(Frame::new(index, self.config.width, self.config.height, pixels))
    }

    fn generate_synthetic_pixels(&self, index: u64) -> Vec<u8> {
        let pixel_count = (self.config.width as usize) * (self.config.height as usize) * 3;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + index) % 256) as u8;
        }
        pixels
    }

    fn stats(&self) -> FileStats {
        FileStats {
            frames_decoded: self.frame_count,
            path: self.config.path.clone(),
        }
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with(STUB_SCHEME) {
        return true;
    }
    !path.contains("://")
}
