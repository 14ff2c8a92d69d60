//! Object Timeline
//!
//! Runs an object detector over every frame of a video and turns the raw
//! detections into a per-class timeline: when each kind of object appears,
//! with frame-accurate timestamps, confidences and bounding boxes.
//!
//! # Data flow
//!
//! ```text
//! FrameSource ──frames──▶ DetectorBackend ──raw detections──▶ DetectionAggregator
//!                                                                  │ finish()
//!                                                                  ▼
//!                     NavigationIndex ◀── AggregatedResult ──▶ export (JSON / CSV)
//! ```
//!
//! The aggregator is the only mutable stage. Once a pass finishes, the
//! `AggregatedResult` is frozen and everything downstream reads it.
//!
//! # Module Structure
//!
//! - `timestamp`: frame index → `HH:MM:SS.mmm`
//! - `record`, `classes`, `result`: the data model
//! - `aggregate`, `summary`: building a result from raw detections
//! - `navigate`, `export`: reading a finished result
//! - `pipeline`, `ingest`, `detect`: running a pass over a video
//! - `config`, `error`: ambient plumbing

pub mod aggregate;
pub mod classes;
pub mod config;
pub mod detect;
pub mod error;
pub mod export;
pub mod frame;
pub mod ingest;
pub mod navigate;
pub mod pipeline;
pub mod record;
pub mod result;
pub mod summary;
pub mod timestamp;

pub use aggregate::{DetectionAggregator, Disposition, FrameOutcome};
pub use classes::ClassMap;
pub use config::{ExtractConfig, ExtractOverrides};
pub use detect::{open_backend, open_backends, BackendKind, BackendOptions, DetectorBackend};
pub use error::{Result, TimelineError};
pub use export::{
    class_csv_path, default_output_path, import_json, render, to_csv, to_json, OutputFormat,
};
pub use frame::Frame;
pub use ingest::{FileConfig, FileSource, FrameSource};
pub use navigate::{NavigationIndex, Page, DEFAULT_PAGE_SIZE};
pub use pipeline::{CancelToken, Pipeline, PipelineReport, ProgressObserver};
pub use record::{BoundingBox, DetectionRecord, DetectionSettings, RawDetection, VideoProperties};
pub use result::AggregatedResult;
pub use summary::{
    appearance_intervals, compute_summary, AppearanceInterval, ClassSummary,
    DEFAULT_INTERVAL_GAP_SECS,
};
pub use timestamp::{format_frame, parse_timestamp, Timestamp};
