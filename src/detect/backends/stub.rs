use std::collections::HashMap;

use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::frame::Frame;
use crate::record::{BoundingBox, RawDetection};

/// Stub backend for tests and demos.
///
/// Scripted mode returns fixed detections keyed by frame index. Demo mode
/// derives a repeatable pattern from the frame index so a run over a synthetic
/// source produces a believable timeline without a model.
pub struct StubBackend {
    mode: StubMode,
}

enum StubMode {
    Scripted(HashMap<u64, Vec<RawDetection>>),
    Demo,
}

impl StubBackend {
    /// Backend that detects nothing.
    pub fn new() -> Self {
        Self::scripted(HashMap::new())
    }

    pub fn scripted(script: HashMap<u64, Vec<RawDetection>>) -> Self {
        Self {
            mode: StubMode::Scripted(script),
        }
    }

    /// Script from `(frame_index, detections)` pairs.
    pub fn from_frames<I>(frames: I) -> Self
    where
        I: IntoIterator<Item = (u64, Vec<RawDetection>)>,
    {
        Self::scripted(frames.into_iter().collect())
    }

    pub fn demo() -> Self {
        Self {
            mode: StubMode::Demo,
        }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        match &self.mode {
            StubMode::Scripted(script) => Ok(script.get(&frame.index).cloned().unwrap_or_default()),
            StubMode::Demo => Ok(demo_detections(frame)),
        }
    }
}

// A person walks through for two of every three 30-frame windows; a car
// passes every 90 frames for 20 frames.
fn demo_detections(frame: &Frame) -> Vec<RawDetection> {
    let width = frame.width.max(4);
    let height = frame.height.max(4);
    let mut detections = Vec::new();

    let window = frame.index / 30;
    if window % 3 != 2 {
        let step = (frame.index % 30) as u32;
        let x1 = (step * (width / 4) / 30).min(width - 2);
        detections.push(RawDetection::new(
            "person",
            0.6 + (frame.index % 7) as f64 * 0.05,
            BoundingBox::new(x1, height / 4, (x1 + width / 4).min(width), height - 1),
        ));
    }
    if frame.index % 90 < 20 {
        detections.push(RawDetection::new(
            "car",
            0.45 + (frame.index % 5) as f64 * 0.1,
            BoundingBox::new(0, height / 2, width / 2, height),
        ));
    }
    detections
}
