//! Per-class aggregation of raw detections.
//!
//! The aggregator is the only writer of `detections_by_class`. It assumes frames
//! arrive in non-decreasing index order and never reorders; a frame that goes
//! backwards is refused. `finish` consumes the aggregator and yields the frozen
//! `AggregatedResult`, so nothing can be appended after the pass ends.

use crate::classes::ClassMap;
use crate::error::{Result, TimelineError};
use crate::record::{DetectionRecord, DetectionSettings, RawDetection, VideoProperties};
use crate::result::AggregatedResult;
use crate::timestamp::{validate_fps, Timestamp};

/// What happened to one raw detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    Accepted,
    BelowThreshold,
    ClassFiltered,
}

/// Per-frame ingestion tally. Malformed detections are collected, not fatal.
#[derive(Debug, Default)]
pub struct FrameOutcome {
    pub accepted: usize,
    pub below_threshold: usize,
    pub class_filtered: usize,
    pub rejected: Vec<TimelineError>,
}

pub struct DetectionAggregator {
    settings: DetectionSettings,
    detections: ClassMap<Vec<DetectionRecord>>,
    last_frame: Option<u64>,
    rejected_total: u64,
}

impl DetectionAggregator {
    pub fn new(settings: DetectionSettings) -> Self {
        Self {
            settings,
            detections: ClassMap::new(),
            last_frame: None,
            rejected_total: 0,
        }
    }

    pub fn settings(&self) -> &DetectionSettings {
        &self.settings
    }

    /// Ingests every raw detection of one frame.
    ///
    /// Structural errors (bad fps, frame out of order) fail the whole call.
    /// Malformed detections are returned in `FrameOutcome::rejected` and the
    /// remaining detections of the frame are still ingested.
    pub fn ingest<I>(&mut self, frame_index: u64, fps: f64, raw_detections: I) -> Result<FrameOutcome>
    where
        I: IntoIterator<Item = RawDetection>,
    {
        validate_fps(fps)?;
        self.check_order(frame_index)?;
        let timestamp = Timestamp::from_frame(frame_index, fps)?;

        let mut outcome = FrameOutcome::default();
        for detection in raw_detections {
            match self.ingest_at(frame_index, timestamp, detection) {
                Ok(Disposition::Accepted) => outcome.accepted += 1,
                Ok(Disposition::BelowThreshold) => outcome.below_threshold += 1,
                Ok(Disposition::ClassFiltered) => outcome.class_filtered += 1,
                Err(err) => {
                    self.rejected_total += 1;
                    outcome.rejected.push(err);
                }
            }
        }
        self.last_frame = Some(frame_index);
        Ok(outcome)
    }

    /// Ingests a single raw detection, failing with `InvalidDetection` when the
    /// detector broke its output contract.
    pub fn ingest_detection(
        &mut self,
        frame_index: u64,
        fps: f64,
        detection: RawDetection,
    ) -> Result<Disposition> {
        self.check_order(frame_index)?;
        let timestamp = Timestamp::from_frame(frame_index, fps)?;
        let disposition = self.ingest_at(frame_index, timestamp, detection);
        if disposition.is_err() {
            self.rejected_total += 1;
        }
        self.last_frame = Some(frame_index);
        disposition
    }

    fn ingest_at(
        &mut self,
        frame_index: u64,
        timestamp: Timestamp,
        detection: RawDetection,
    ) -> Result<Disposition> {
        detection.validate(frame_index)?;
        if detection.confidence < self.settings.confidence_threshold {
            return Ok(Disposition::BelowThreshold);
        }
        if !self.settings.accepts_class(&detection.class_name) {
            return Ok(Disposition::ClassFiltered);
        }
        let class_name = detection.class_name.clone();
        self.detections
            .get_or_insert_with(&class_name, Vec::new)
            .push(DetectionRecord::new(frame_index, timestamp, detection));
        Ok(Disposition::Accepted)
    }

    fn check_order(&self, frame_index: u64) -> Result<()> {
        match self.last_frame {
            Some(previous) if frame_index < previous => Err(TimelineError::FrameOutOfOrder {
                frame_index,
                previous,
            }),
            _ => Ok(()),
        }
    }

    pub fn detections_by_class(&self) -> &ClassMap<Vec<DetectionRecord>> {
        &self.detections
    }

    pub fn total_detections(&self) -> usize {
        self.detections.values().map(Vec::len).sum()
    }

    pub fn rejected_total(&self) -> u64 {
        self.rejected_total
    }

    /// Freezes the aggregate. A pass that processed fewer frames than the
    /// declared count is marked partial.
    pub fn finish(
        self,
        video_path: impl Into<String>,
        video_properties: VideoProperties,
        frames_processed: u64,
    ) -> AggregatedResult {
        AggregatedResult::new(
            video_path.into(),
            video_properties,
            self.settings,
            self.detections,
            frames_processed,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::BoundingBox;

    fn det(class_name: &str, confidence: f64) -> RawDetection {
        RawDetection::new(class_name, confidence, BoundingBox::new(0, 0, 10, 10))
    }

    #[test]
    fn groups_by_class_in_first_seen_order() {
        let settings = DetectionSettings::all_classes("stub", 0.25).unwrap();
        let mut agg = DetectionAggregator::new(settings);
        agg.ingest(0, 25.0, vec![det("dog", 0.7), det("person", 0.9)]).unwrap();
        agg.ingest(1, 25.0, vec![det("person", 0.6), det("dog", 0.5), det("dog", 0.55)])
            .unwrap();

        let by_class = agg.detections_by_class();
        assert_eq!(by_class.keys().collect::<Vec<_>>(), vec!["dog", "person"]);
        assert_eq!(by_class.get("dog").unwrap().len(), 3);
        assert_eq!(agg.total_detections(), 5);

        let frames: Vec<_> = by_class
            .get("dog")
            .unwrap()
            .iter()
            .map(DetectionRecord::frame_index)
            .collect();
        assert_eq!(frames, vec![0, 1, 1]);
    }

    #[test]
    fn threshold_is_inclusive() {
        let settings = DetectionSettings::all_classes("stub", 0.5).unwrap();
        let mut agg = DetectionAggregator::new(settings);
        let outcome = agg
            .ingest(0, 30.0, vec![det("cat", 0.5), det("cat", 0.4999)])
            .unwrap();
        assert_eq!(outcome.accepted, 1);
        assert_eq!(outcome.below_threshold, 1);
    }

    #[test]
    fn malformed_detection_does_not_drop_the_frame() {
        let settings = DetectionSettings::all_classes("stub", 0.1).unwrap();
        let mut agg = DetectionAggregator::new(settings);
        let bad_box = RawDetection::new("car", 0.9, BoundingBox::new(5, 5, 5, 9));
        let outcome = agg
            .ingest(4, 30.0, vec![det("car", 1.5), bad_box, det("car", 0.8)])
            .unwrap();

        assert_eq!(outcome.accepted, 1);
        assert_eq!(outcome.rejected.len(), 2);
        assert!(outcome
            .rejected
            .iter()
            .all(|err| matches!(err, TimelineError::InvalidDetection { frame_index: 4, .. })));
        assert_eq!(agg.rejected_total(), 2);
        assert_eq!(agg.detections_by_class().get("car").unwrap().len(), 1);
    }

    #[test]
    fn single_detection_surface_reports_rejection() {
        let settings = DetectionSettings::new("stub", 0.3, Some(["bus"])).unwrap();
        let mut agg = DetectionAggregator::new(settings);
        assert!(matches!(
            agg.ingest_detection(0, 30.0, det("bus", 1.5)),
            Err(TimelineError::InvalidDetection { .. })
        ));
        assert_eq!(
            agg.ingest_detection(0, 30.0, det("car", 0.9)).unwrap(),
            Disposition::ClassFiltered
        );
        assert_eq!(
            agg.ingest_detection(1, 30.0, det("bus", 0.2)).unwrap(),
            Disposition::BelowThreshold
        );
        assert_eq!(
            agg.ingest_detection(1, 30.0, det("bus", 0.9)).unwrap(),
            Disposition::Accepted
        );
    }

    #[test]
    fn frames_going_backwards_are_refused() {
        let settings = DetectionSettings::all_classes("stub", 0.0).unwrap();
        let mut agg = DetectionAggregator::new(settings);
        agg.ingest(5, 30.0, vec![det("cat", 0.5)]).unwrap();
        agg.ingest(5, 30.0, vec![det("cat", 0.5)]).unwrap();
        let err = agg.ingest(4, 30.0, vec![det("cat", 0.5)]).unwrap_err();
        assert!(matches!(
            err,
            TimelineError::FrameOutOfOrder {
                frame_index: 4,
                previous: 5
            }
        ));
    }

    #[test]
    fn invalid_fps_aborts_ingest() {
        let settings = DetectionSettings::all_classes("stub", 0.0).unwrap();
        let mut agg = DetectionAggregator::new(settings);
        assert!(matches!(
            agg.ingest(0, 0.0, vec![det("cat", 0.5)]),
            Err(TimelineError::InvalidFps(_))
        ));
        assert_eq!(agg.total_detections(), 0);
    }
}
