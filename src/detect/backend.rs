use anyhow::Result;

use crate::frame::Frame;
use crate::record::RawDetection;

/// Detector backend trait.
///
/// A backend turns one frame into zero or more raw detections. Its output is
/// untrusted: the aggregator validates confidence and box geometry and rejects
/// anything outside the contract.
///
/// Backends are `Send` so the pipeline can move one into each detection worker.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    ///
    /// Implementations must treat the pixel slice as read-only and must not
    /// retain it beyond the call.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
