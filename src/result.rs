//! The frozen output of one extraction pass.

use serde::{Deserialize, Serialize};

use crate::classes::ClassMap;
use crate::record::{DetectionRecord, DetectionSettings, VideoProperties};
use crate::summary::{compute_summary, ClassSummary};

/// Complete, read-only result of a pass.
///
/// Built once by `DetectionAggregator::finish`; exposes no mutating methods.
/// Field order here is the JSON key order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    video_path: String,
    video_properties: VideoProperties,
    #[serde(rename = "detection_settings")]
    settings: DetectionSettings,
    detections_by_class: ClassMap<Vec<DetectionRecord>>,
    summary: ClassMap<ClassSummary>,
    /// Not part of the wire format.
    #[serde(skip)]
    frames_processed: u64,
    #[serde(skip)]
    is_partial: bool,
}

impl AggregatedResult {
    pub(crate) fn new(
        video_path: String,
        video_properties: VideoProperties,
        settings: DetectionSettings,
        detections_by_class: ClassMap<Vec<DetectionRecord>>,
        frames_processed: u64,
    ) -> Self {
        let summary = compute_summary(&detections_by_class);
        let is_partial = frames_processed < video_properties.total_frames;
        Self {
            video_path,
            video_properties,
            settings,
            detections_by_class,
            summary,
            frames_processed,
            is_partial,
        }
    }

    /// After deserialization the skipped fields hold defaults; treat an
    /// imported export as a complete pass over its declared frames.
    pub(crate) fn mark_imported(&mut self) {
        self.frames_processed = self.video_properties.total_frames;
        self.is_partial = false;
    }

    pub fn video_path(&self) -> &str {
        &self.video_path
    }

    pub fn video_properties(&self) -> &VideoProperties {
        &self.video_properties
    }

    pub fn settings(&self) -> &DetectionSettings {
        &self.settings
    }

    pub fn detections_by_class(&self) -> &ClassMap<Vec<DetectionRecord>> {
        &self.detections_by_class
    }

    pub fn summary(&self) -> &ClassMap<ClassSummary> {
        &self.summary
    }

    /// Records of one class in frame order.
    pub fn records(&self, class_name: &str) -> Option<&[DetectionRecord]> {
        self.detections_by_class
            .get(class_name)
            .map(Vec::as_slice)
            .filter(|records| !records.is_empty())
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.detections_by_class.keys()
    }

    pub fn total_detections(&self) -> usize {
        self.detections_by_class.values().map(Vec::len).sum()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// True when the pass ended before the declared frame count.
    pub fn is_partial(&self) -> bool {
        self.is_partial
    }
}
