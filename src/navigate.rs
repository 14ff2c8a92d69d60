//! Read-only navigation queries over a finalized result.
//!
//! Every query on a class with no aggregated records fails with
//! `UnknownClass`; an empty answer always means "the class exists but nothing
//! matched".

use crate::error::{Result, TimelineError};
use crate::record::DetectionRecord;
use crate::result::AggregatedResult;
use crate::summary::{appearance_intervals, AppearanceInterval};

/// Rows per page in paged listings.
pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Clone, Copy, Debug)]
pub struct NavigationIndex<'a> {
    result: &'a AggregatedResult,
}

/// One page of a class's records.
#[derive(Debug)]
pub struct Page<'a> {
    pub page: usize,
    pub total_pages: usize,
    pub records: &'a [DetectionRecord],
}

impl<'a> NavigationIndex<'a> {
    pub fn new(result: &'a AggregatedResult) -> Self {
        Self { result }
    }

    fn records(&self, class_name: &str) -> Result<&'a [DetectionRecord]> {
        self.result
            .records(class_name)
            .ok_or_else(|| TimelineError::UnknownClass(class_name.to_string()))
    }

    /// Classes in first-detection order.
    pub fn classes(&self) -> Vec<&'a str> {
        self.result.classes().collect()
    }

    pub fn total_detections(&self) -> usize {
        self.result.total_detections()
    }

    pub fn first_appearance(&self, class_name: &str) -> Result<&'a DetectionRecord> {
        self.records(class_name)?
            .first()
            .ok_or_else(|| TimelineError::UnknownClass(class_name.to_string()))
    }

    pub fn last_appearance(&self, class_name: &str) -> Result<&'a DetectionRecord> {
        self.records(class_name)?
            .last()
            .ok_or_else(|| TimelineError::UnknownClass(class_name.to_string()))
    }

    /// Every record of the class, in frame order.
    pub fn all_timestamps(&self, class_name: &str) -> Result<&'a [DetectionRecord]> {
        self.records(class_name)
    }

    /// Records whose formatted timestamp starts with `time_prefix`, so
    /// `"00:00:05"` matches every sub-second variant of that second.
    pub fn search(&self, class_name: &str, time_prefix: &str) -> Result<Vec<&'a DetectionRecord>> {
        let prefix = time_prefix.trim();
        Ok(self
            .records(class_name)?
            .iter()
            .filter(|record| record.timestamp_formatted().starts_with(prefix))
            .collect())
    }

    /// Seconds to seek to for the `record_index`-th record of the class.
    pub fn jump_target(&self, class_name: &str, record_index: usize) -> Result<f64> {
        let records = self.records(class_name)?;
        records
            .get(record_index)
            .map(DetectionRecord::timestamp_seconds)
            .ok_or_else(|| TimelineError::RecordIndexOutOfRange {
                class_name: class_name.to_string(),
                index: record_index,
                len: records.len(),
            })
    }

    /// First record at or after `seconds`; the last record when `seconds` is
    /// past the final detection.
    pub fn nearest(&self, class_name: &str, seconds: f64) -> Result<&'a DetectionRecord> {
        let records = self.records(class_name)?;
        let position = records.partition_point(|record| record.timestamp_seconds() < seconds);
        records
            .get(position)
            .or_else(|| records.last())
            .ok_or_else(|| TimelineError::UnknownClass(class_name.to_string()))
    }

    /// 1-based page of records. Pages past the end are empty.
    pub fn page(&self, class_name: &str, page: usize, per_page: usize) -> Result<Page<'a>> {
        let records = self.records(class_name)?;
        let per_page = per_page.max(1);
        let total_pages = records.len().div_ceil(per_page);
        let page = page.max(1);
        let start = (page - 1).saturating_mul(per_page).min(records.len());
        let end = start.saturating_add(per_page).min(records.len());
        Ok(Page {
            page,
            total_pages,
            records: &records[start..end],
        })
    }

    pub fn intervals(&self, class_name: &str, max_gap_seconds: f64) -> Result<Vec<AppearanceInterval>> {
        appearance_intervals(self.records(class_name)?, max_gap_seconds)
    }
}
