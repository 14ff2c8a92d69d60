//! Error kinds surfaced by the timeline core.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TimelineError {
    /// Frame rate is zero, negative or not finite; no timestamp can be derived.
    #[error("invalid fps {0}: frame rate must be a positive finite number")]
    InvalidFps(f64),

    /// The detector returned a detection that violates its output contract.
    #[error("invalid detection at frame {frame_index}: {reason}")]
    InvalidDetection { frame_index: u64, reason: String },

    /// Frames must reach the aggregator in non-decreasing index order.
    #[error("frame {frame_index} arrived after frame {previous}")]
    FrameOutOfOrder { frame_index: u64, previous: u64 },

    #[error("invalid detection settings: {0}")]
    InvalidSettings(String),

    #[error("unknown class '{0}': no detections were aggregated for it")]
    UnknownClass(String),

    #[error("record index {index} out of range for class '{class_name}' ({len} records)")]
    RecordIndexOutOfRange {
        class_name: String,
        index: usize,
        len: usize,
    },

    /// Frame source ended before the declared frame count. Reported, never fatal.
    #[error("frame source ended after {processed} of {declared} declared frames")]
    SourceExhaustedEarly { processed: u64, declared: u64 },

    #[error("invalid export: {0}")]
    InvalidExport(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TimelineError>;
