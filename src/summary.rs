//! Per-class summary statistics and appearance intervals.

use serde::{Deserialize, Serialize};

use crate::classes::ClassMap;
use crate::error::{Result, TimelineError};
use crate::record::DetectionRecord;
use crate::timestamp::Timestamp;

/// Default gap that still joins two detections into one interval.
pub const DEFAULT_INTERVAL_GAP_SECS: f64 = 1.0;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSummary {
    pub count: usize,
    pub first_appearance: String,
    pub last_appearance: String,
}

/// Derives count and first/last appearance for every class with records.
///
/// Records are frame-ordered, so first/last are the head and tail of each
/// sequence. Classes with no records are omitted.
pub fn compute_summary(detections_by_class: &ClassMap<Vec<DetectionRecord>>) -> ClassMap<ClassSummary> {
    let mut summary = ClassMap::new();
    for (class_name, records) in detections_by_class.iter() {
        let (Some(first), Some(last)) = (records.first(), records.last()) else {
            continue;
        };
        summary.insert_new(
            class_name.to_string(),
            ClassSummary {
                count: records.len(),
                first_appearance: first.timestamp_formatted().to_string(),
                last_appearance: last.timestamp_formatted().to_string(),
            },
        );
    }
    summary
}

/// A run of detections with no gap longer than the join threshold.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AppearanceInterval {
    pub start: String,
    pub end: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub duration_seconds: f64,
    pub detections: usize,
}

impl AppearanceInterval {
    fn open(record: &DetectionRecord) -> Self {
        Self {
            start: record.timestamp_formatted().to_string(),
            end: record.timestamp_formatted().to_string(),
            start_seconds: record.timestamp_seconds(),
            end_seconds: record.timestamp_seconds(),
            duration_seconds: 0.0,
            detections: 1,
        }
    }

    fn extend(&mut self, record: &DetectionRecord) {
        self.end = record.timestamp_formatted().to_string();
        self.end_seconds = record.timestamp_seconds();
        self.duration_seconds = Timestamp::from_seconds(self.end_seconds - self.start_seconds).seconds();
        self.detections += 1;
    }
}

/// Groups frame-ordered records into intervals; a record joins the current
/// interval when it is at most `max_gap_seconds` after the previous one.
pub fn appearance_intervals(
    records: &[DetectionRecord],
    max_gap_seconds: f64,
) -> Result<Vec<AppearanceInterval>> {
    if !max_gap_seconds.is_finite() || max_gap_seconds < 0.0 {
        return Err(TimelineError::InvalidSettings(format!(
            "interval gap {max_gap_seconds} must be a non-negative number of seconds"
        )));
    }

    let mut intervals: Vec<AppearanceInterval> = Vec::new();
    for record in records {
        match intervals.last_mut() {
            Some(current) if record.timestamp_seconds() - current.end_seconds <= max_gap_seconds => {
                current.extend(record);
            }
            _ => intervals.push(AppearanceInterval::open(record)),
        }
    }
    Ok(intervals)
}
