//! Detection and run metadata types.
//!
//! - `RawDetection`: one detector output, unvalidated.
//! - `DetectionRecord`: one accepted detection, stamped with its frame time.
//! - `VideoProperties`: frame rate and declared length of the source.
//! - `DetectionSettings`: model, confidence threshold and class filter of a run.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TimelineError};
use crate::timestamp::Timestamp;

/// Axis-aligned box in source-frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Returns a reason when the corners are not strictly increasing.
    pub(crate) fn violation(&self) -> Option<String> {
        if self.x1 >= self.x2 {
            return Some(format!("bbox x1 {} >= x2 {}", self.x1, self.x2));
        }
        if self.y1 >= self.y2 {
            return Some(format!("bbox y1 {} >= y2 {}", self.y1, self.y2));
        }
        None
    }

    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }
}

/// Detector output for one object in one frame, before validation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub class_name: String,
    pub confidence: f64,
    pub bbox: BoundingBox,
}

impl RawDetection {
    pub fn new(class_name: impl Into<String>, confidence: f64, bbox: BoundingBox) -> Self {
        Self {
            class_name: class_name.into(),
            confidence,
            bbox,
        }
    }

    /// Checks the detector output contract.
    pub fn validate(&self, frame_index: u64) -> Result<()> {
        let reason = if self.class_name.trim().is_empty() {
            Some("empty class name".to_string())
        } else if !(0.0..=1.0).contains(&self.confidence) {
            Some(format!("confidence {} outside [0, 1]", self.confidence))
        } else {
            self.bbox.violation()
        };
        match reason {
            Some(reason) => Err(TimelineError::InvalidDetection {
                frame_index,
                reason,
            }),
            None => Ok(()),
        }
    }
}

/// One accepted detection. Immutable once built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    timestamp_seconds: f64,
    timestamp_formatted: String,
    #[serde(rename = "frame_number")]
    frame_index: u64,
    class_name: String,
    confidence: f64,
    bbox: BoundingBox,
}

impl DetectionRecord {
    pub(crate) fn new(frame_index: u64, timestamp: Timestamp, detection: RawDetection) -> Self {
        Self {
            timestamp_seconds: timestamp.seconds(),
            timestamp_formatted: timestamp.formatted(),
            frame_index,
            class_name: detection.class_name,
            confidence: detection.confidence,
            bbox: detection.bbox,
        }
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn timestamp_seconds(&self) -> f64 {
        self.timestamp_seconds
    }

    pub fn timestamp_formatted(&self) -> &str {
        &self.timestamp_formatted
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }
}

/// Frame rate and declared length of the source video.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoProperties {
    pub fps: f64,
    pub total_frames: u64,
    pub duration_seconds: f64,
    pub duration_formatted: String,
}

impl VideoProperties {
    pub fn new(fps: f64, total_frames: u64) -> Result<Self> {
        let duration = Timestamp::from_frame(total_frames, fps)?;
        Ok(Self {
            fps,
            total_frames,
            duration_seconds: duration.seconds(),
            duration_formatted: duration.formatted(),
        })
    }
}

/// Settings of one extraction run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionSettings {
    #[serde(rename = "model")]
    pub model_identifier: String,
    pub confidence_threshold: f64,
    /// `None` accepts every class.
    pub target_classes: Option<BTreeSet<String>>,
}

impl DetectionSettings {
    /// An empty class list means "no filter".
    pub fn new<I, S>(
        model_identifier: impl Into<String>,
        confidence_threshold: f64,
        target_classes: Option<I>,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if !(0.0..=1.0).contains(&confidence_threshold) {
            return Err(TimelineError::InvalidSettings(format!(
                "confidence threshold {confidence_threshold} outside [0, 1]"
            )));
        }
        let target_classes = target_classes
            .map(|classes| {
                classes
                    .into_iter()
                    .map(Into::into)
                    .map(|class: String| class.trim().to_string())
                    .filter(|class| !class.is_empty())
                    .collect::<BTreeSet<String>>()
            })
            .filter(|classes| !classes.is_empty());
        Ok(Self {
            model_identifier: model_identifier.into(),
            confidence_threshold,
            target_classes,
        })
    }

    /// Settings that accept every class.
    pub fn all_classes(model_identifier: impl Into<String>, confidence_threshold: f64) -> Result<Self> {
        Self::new(model_identifier, confidence_threshold, None::<Vec<String>>)
    }

    pub fn accepts_class(&self, class_name: &str) -> bool {
        self.target_classes
            .as_ref()
            .map_or(true, |classes| classes.contains(class_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_must_be_strictly_increasing() {
        let det = RawDetection::new("car", 0.5, BoundingBox::new(10, 0, 10, 5));
        let err = det.validate(3).unwrap_err();
        assert!(matches!(
            err,
            TimelineError::InvalidDetection { frame_index: 3, .. }
        ));

        let det = RawDetection::new("car", 0.5, BoundingBox::new(0, 7, 10, 2));
        assert!(det.validate(0).is_err());
    }

    #[test]
    fn confidence_must_be_in_unit_interval() {
        let bbox = BoundingBox::new(0, 0, 1, 1);
        assert!(RawDetection::new("dog", 1.5, bbox).validate(0).is_err());
        assert!(RawDetection::new("dog", -0.1, bbox).validate(0).is_err());
        assert!(RawDetection::new("dog", f64::NAN, bbox).validate(0).is_err());
        assert!(RawDetection::new("dog", 1.0, bbox).validate(0).is_ok());
        assert!(RawDetection::new("dog", 0.0, bbox).validate(0).is_ok());
    }

    #[test]
    fn empty_class_list_means_no_filter() {
        let settings = DetectionSettings::new("m", 0.25, Some(Vec::<String>::new())).unwrap();
        assert!(settings.target_classes.is_none());
        assert!(settings.accepts_class("anything"));

        let settings = DetectionSettings::new("m", 0.25, Some(vec![" car ", "bus", "car"])).unwrap();
        let classes: Vec<_> = settings.target_classes.clone().unwrap().into_iter().collect();
        assert_eq!(classes, vec!["bus", "car"]);
        assert!(settings.accepts_class("car"));
        assert!(!settings.accepts_class("person"));
    }

    #[test]
    fn threshold_outside_unit_interval_is_rejected() {
        assert!(DetectionSettings::all_classes("m", 1.01).is_err());
        assert!(DetectionSettings::all_classes("m", -0.5).is_err());
    }

    #[test]
    fn video_duration_uses_frame_rounding() {
        let props = VideoProperties::new(30.0, 95).unwrap();
        assert_eq!(props.duration_seconds, 3.167);
        assert_eq!(props.duration_formatted, "00:00:03.167");
        assert!(VideoProperties::new(0.0, 10).is_err());
    }
}
