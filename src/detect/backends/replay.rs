use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::detect::backend::DetectorBackend;
use crate::error::TimelineError;
use crate::frame::Frame;
use crate::record::{BoundingBox, RawDetection};

/// Replays detections computed earlier by an external detector.
///
/// Input is JSON Lines, one object per frame that had detections:
///
/// ```text
/// {"frame": 12, "detections": [{"class_name": "person", "confidence": 0.91,
///   "bbox": {"x1": 10, "y1": 20, "x2": 110, "y2": 220}}]}
/// ```
///
/// Frames missing from the file have no detections. Blank lines are skipped.
///
/// Box coordinates may be fractional and are rounded to whole pixels. A box
/// with a negative or out-of-range coordinate is dropped with a warning; the
/// rest of its line is kept. Everything else is passed through unvalidated
/// and checked by the aggregator.
pub struct ReplayBackend {
    frames: HashMap<u64, Vec<RawDetection>>,
    rejected: usize,
}

#[derive(Deserialize)]
struct ReplayLine {
    frame: u64,
    #[serde(default)]
    detections: Vec<ReplayDetection>,
}

#[derive(Deserialize)]
struct ReplayDetection {
    class_name: String,
    confidence: f64,
    bbox: ReplayBox,
}

#[derive(Deserialize)]
struct ReplayBox {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
}

impl ReplayDetection {
    fn into_raw(self, frame_index: u64) -> std::result::Result<RawDetection, TimelineError> {
        let ReplayBox { x1, y1, x2, y2 } = self.bbox;
        let pixel = |value: f64| -> std::result::Result<u32, TimelineError> {
            let rounded = value.round();
            if !rounded.is_finite() || rounded < 0.0 || rounded > f64::from(u32::MAX) {
                return Err(TimelineError::InvalidDetection {
                    frame_index,
                    reason: format!("bbox coordinate {value} is not a pixel position"),
                });
            }
            Ok(rounded as u32)
        };
        let bbox = BoundingBox::new(pixel(x1)?, pixel(y1)?, pixel(x2)?, pixel(y2)?);
        Ok(RawDetection::new(self.class_name, self.confidence, bbox))
    }
}

impl ReplayBackend {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read replay file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid replay file {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let mut frames: HashMap<u64, Vec<RawDetection>> = HashMap::new();
        let mut rejected = 0;
        for (line_no, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: ReplayLine = serde_json::from_str(line)
                .map_err(|e| anyhow!("line {}: {}", line_no + 1, e))?;
            let detections = frames.entry(entry.frame).or_default();
            for detection in entry.detections {
                match detection.into_raw(entry.frame) {
                    Ok(raw) => detections.push(raw),
                    Err(err) => {
                        rejected += 1;
                        log::warn!("replay line {}: {}", line_no + 1, err);
                    }
                }
            }
        }
        log::debug!(
            "replay: loaded detections for {} frames ({} rejected)",
            frames.len(),
            rejected
        );
        Ok(Self { frames, rejected })
    }

    pub fn frames_with_detections(&self) -> usize {
        self.frames.len()
    }

    /// Detections dropped while loading because their box was unusable.
    pub fn rejected_detections(&self) -> usize {
        self.rejected
    }
}

impl DetectorBackend for ReplayBackend {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        Ok(self.frames.get(&frame.index).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
{"frame": 0, "detections": [{"class_name": "person", "confidence": 0.9, "bbox": {"x1": 0, "y1": 0, "x2": 10, "y2": 10}}]}

{"frame": 2, "detections": [{"class_name": "person", "confidence": 0.95, "bbox": {"x1": 1, "y1": 1, "x2": 11, "y2": 11}}]}
{"frame": 2, "detections": [{"class_name": "dog", "confidence": 0.5, "bbox": {"x1": 3, "y1": 3, "x2": 9, "y2": 9}}]}
{"frame": 5}
"#;

    fn frame(index: u64) -> Frame {
        Frame::new(index, 2, 2, vec![0u8; 12])
    }

    #[test]
    fn replays_by_frame_index() {
        let mut backend = ReplayBackend::parse(SAMPLE).unwrap();
        assert_eq!(backend.frames_with_detections(), 3);
        assert_eq!(backend.detect(&frame(0)).unwrap().len(), 1);
        assert!(backend.detect(&frame(1)).unwrap().is_empty());

        let merged = backend.detect(&frame(2)).unwrap();
        let classes: Vec<_> = merged.iter().map(|d| d.class_name.as_str()).collect();
        assert_eq!(classes, vec!["person", "dog"]);
        assert!(backend.detect(&frame(5)).unwrap().is_empty());
    }

    #[test]
    fn reports_bad_line_number() {
        let err = ReplayBackend::parse("{\"frame\": 0}\nnot json\n").err().unwrap();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn fractional_boxes_are_rounded() {
        let line = r#"{"frame": 0, "detections": [{"class_name": "car", "confidence": 0.7, "bbox": {"x1": 10.5, "y1": 2.25, "x2": 40.49, "y2": 30.0}}]}"#;
        let mut backend = ReplayBackend::parse(line).unwrap();
        let detections = backend.detect(&frame(0)).unwrap();
        assert_eq!(detections[0].bbox, BoundingBox::new(11, 2, 40, 30));
        assert_eq!(backend.rejected_detections(), 0);
    }

    #[test]
    fn bad_box_drops_only_that_detection() {
        let raw = concat!(
            r#"{"frame": 0, "detections": [{"class_name": "person", "confidence": 0.9, "bbox": {"x1": 0, "y1": 0, "x2": 10, "y2": 10}}]}"#,
            "\n",
            r#"{"frame": 1, "detections": [{"class_name": "a", "confidence": 0.5, "bbox": {"x1": -1, "y1": 0, "x2": 1, "y2": 1}}, {"class_name": "dog", "confidence": 0.6, "bbox": {"x1": 1, "y1": 1, "x2": 5, "y2": 5}}]}"#,
            "\n",
            r#"{"frame": 2, "detections": [{"class_name": "person", "confidence": 0.8, "bbox": {"x1": 2, "y1": 2, "x2": 12.6, "y2": 12}}]}"#,
        );
        let mut backend = ReplayBackend::parse(raw).unwrap();
        assert_eq!(backend.rejected_detections(), 1);
        assert_eq!(backend.detect(&frame(0)).unwrap().len(), 1);
        let frame_one = backend.detect(&frame(1)).unwrap();
        assert_eq!(frame_one.len(), 1);
        assert_eq!(frame_one[0].class_name, "dog");
        assert_eq!(backend.detect(&frame(2)).unwrap()[0].bbox.x2, 13);
    }
}
