//! JSON and CSV wire formats.
//!
//! Both writers are deterministic: the same result always serializes to the
//! same bytes. JSON is pretty-printed with two-space indentation; CSV always
//! carries the header row, even when no rows follow.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TimelineError};
use crate::record::DetectionRecord;
use crate::result::AggregatedResult;
use crate::summary::compute_summary;

pub const CSV_HEADER: [&str; 9] = [
    "timestamp_seconds",
    "timestamp_formatted",
    "frame_number",
    "class_name",
    "confidence",
    "x1",
    "y1",
    "x2",
    "y2",
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = TimelineError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(TimelineError::InvalidSettings(format!(
                "unsupported output format '{other}' (expected json or csv)"
            ))),
        }
    }
}

pub fn to_json(result: &AggregatedResult) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(result)?)
}

#[derive(Serialize)]
struct CsvRow<'a> {
    timestamp_seconds: f64,
    timestamp_formatted: &'a str,
    frame_number: u64,
    class_name: &'a str,
    confidence: f64,
    x1: u32,
    y1: u32,
    x2: u32,
    y2: u32,
}

impl<'a> From<&'a DetectionRecord> for CsvRow<'a> {
    fn from(record: &'a DetectionRecord) -> Self {
        let bbox = record.bbox();
        Self {
            timestamp_seconds: record.timestamp_seconds(),
            timestamp_formatted: record.timestamp_formatted(),
            frame_number: record.frame_index(),
            class_name: record.class_name(),
            confidence: record.confidence(),
            x1: bbox.x1,
            y1: bbox.y1,
            x2: bbox.x2,
            y2: bbox.y2,
        }
    }
}

/// CSV of one class, or of every class in first-detection order.
///
/// Asking for a class that has no records fails with `UnknownClass`.
pub fn to_csv(result: &AggregatedResult, class_name: Option<&str>) -> Result<Vec<u8>> {
    let blocks: Vec<&[DetectionRecord]> = match class_name {
        Some(name) => vec![result
            .records(name)
            .ok_or_else(|| TimelineError::UnknownClass(name.to_string()))?],
        None => result
            .detections_by_class()
            .values()
            .map(Vec::as_slice)
            .collect(),
    };

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for record in blocks.into_iter().flatten() {
        writer.serialize(CsvRow::from(record))?;
    }
    writer
        .into_inner()
        .map_err(|err| TimelineError::Io(err.into_error()))
}

/// Serializes in the requested format.
pub fn render(result: &AggregatedResult, format: OutputFormat) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Json => to_json(result),
        OutputFormat::Csv => to_csv(result, None),
    }
}

/// Parses a JSON export back into a result, checking that every record sits
/// under its own class, that each class is frame-ordered and non-empty, and
/// that the stored summary matches the records.
pub fn import_json(bytes: &[u8]) -> Result<AggregatedResult> {
    let mut result: AggregatedResult = serde_json::from_slice(bytes)?;

    for (class_name, records) in result.detections_by_class().iter() {
        if records.is_empty() {
            return Err(TimelineError::InvalidExport(format!(
                "class '{class_name}' is listed without any records"
            )));
        }
        if let Some(stray) = records.iter().find(|r| r.class_name() != class_name) {
            return Err(TimelineError::InvalidExport(format!(
                "record of class '{}' listed under '{}'",
                stray.class_name(),
                class_name
            )));
        }
        if records
            .windows(2)
            .any(|pair| pair[1].frame_index() < pair[0].frame_index())
        {
            return Err(TimelineError::InvalidExport(format!(
                "records of class '{class_name}' are not in frame order"
            )));
        }
    }

    if compute_summary(result.detections_by_class()) != *result.summary() {
        return Err(TimelineError::InvalidExport(
            "summary does not match detections_by_class".to_string(),
        ));
    }

    result.mark_imported();
    Ok(result)
}

/// `<video stem>_timestamps.<ext>` in the current directory. A `?query`
/// suffix (synthetic `stub://` sources) is not part of the stem.
pub fn default_output_path(video_path: &str, format: OutputFormat) -> PathBuf {
    let path = video_path.split_once('?').map_or(video_path, |(path, _)| path);
    let stem = Path::new(path)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("video");
    PathBuf::from(format!("{stem}_timestamps.{}", format.extension()))
}

/// `<video stem>_<class>_timestamps.csv`, the per-class CSV download name.
pub fn class_csv_path(video_path: &str, class_name: &str) -> PathBuf {
    let stem = default_output_path(video_path, OutputFormat::Csv);
    let stem = stem
        .to_str()
        .and_then(|name| name.strip_suffix("_timestamps.csv"))
        .unwrap_or("video")
        .to_string();
    let class_slug: String = class_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    PathBuf::from(format!("{stem}_{class_slug}_timestamps.csv"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::DetectionAggregator;
    use crate::record::{BoundingBox, DetectionSettings, RawDetection, VideoProperties};

    fn sample() -> AggregatedResult {
        let settings = DetectionSettings::new("yolov8n.onnx", 0.5, Some(["car", "person"])).unwrap();
        let mut agg = DetectionAggregator::new(settings);
        agg.ingest(
            0,
            30.0,
            vec![
                RawDetection::new("person", 0.9, BoundingBox::new(0, 0, 10, 10)),
                RawDetection::new("car", 0.75, BoundingBox::new(5, 6, 50, 60)),
            ],
        )
        .unwrap();
        agg.ingest(
            2,
            30.0,
            vec![RawDetection::new("person", 0.95, BoundingBox::new(1, 1, 11, 11))],
        )
        .unwrap();
        agg.finish("videos/street.mp4", VideoProperties::new(30.0, 3).unwrap(), 3)
    }

    #[test]
    fn csv_all_classes_in_insertion_order() {
        let csv = String::from_utf8(to_csv(&sample(), None).unwrap()).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(
            lines,
            vec![
                "timestamp_seconds,timestamp_formatted,frame_number,class_name,confidence,x1,y1,x2,y2",
                "0.0,00:00:00.000,0,person,0.9,0,0,10,10",
                "0.067,00:00:00.067,2,person,0.95,1,1,11,11",
                "0.0,00:00:00.000,0,car,0.75,5,6,50,60",
            ]
        );
    }

    #[test]
    fn csv_single_class_keeps_header() {
        let csv = String::from_utf8(to_csv(&sample(), Some("car")).unwrap()).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.starts_with("timestamp_seconds,"));
        assert!(matches!(
            to_csv(&sample(), Some("bus")),
            Err(TimelineError::UnknownClass(_))
        ));
    }

    #[test]
    fn empty_result_csv_is_header_only() {
        let settings = DetectionSettings::all_classes("stub", 0.5).unwrap();
        let result = DetectionAggregator::new(settings).finish("x.mp4", VideoProperties::new(25.0, 0).unwrap(), 0);
        let csv = String::from_utf8(to_csv(&result, None).unwrap()).unwrap();
        assert_eq!(csv, format!("{}\n", CSV_HEADER.join(",")));
    }

    #[test]
    fn json_keys_follow_wire_contract() {
        let value: serde_json::Value = serde_json::from_slice(&to_json(&sample()).unwrap()).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        let mut expected = vec![
            "detection_settings",
            "detections_by_class",
            "summary",
            "video_path",
            "video_properties",
        ];
        expected.sort();
        let mut keys_sorted = keys.clone();
        keys_sorted.sort();
        assert_eq!(keys_sorted, expected);

        assert_eq!(value["video_path"], "videos/street.mp4");
        assert_eq!(value["detection_settings"]["model"], "yolov8n.onnx");
        assert_eq!(value["detection_settings"]["target_classes"], serde_json::json!(["car", "person"]));
        assert_eq!(value["video_properties"]["duration_formatted"], "00:00:00.100");
        let person = &value["detections_by_class"]["person"][1];
        assert_eq!(person["frame_number"], 2);
        assert_eq!(person["timestamp_seconds"], 0.067);
        assert_eq!(person["bbox"]["x2"], 11);
        assert_eq!(value["summary"]["car"]["count"], 1);
    }

    #[test]
    fn no_filter_serializes_as_null() {
        let settings = DetectionSettings::all_classes("stub", 0.5).unwrap();
        let result = DetectionAggregator::new(settings).finish("x.mp4", VideoProperties::new(25.0, 0).unwrap(), 0);
        let value: serde_json::Value = serde_json::from_slice(&to_json(&result).unwrap()).unwrap();
        assert!(value["detection_settings"]["target_classes"].is_null());
        assert_eq!(value["summary"], serde_json::json!({}));
    }

    #[test]
    fn import_rejects_inconsistent_summary() {
        let mut value: serde_json::Value = serde_json::from_slice(&to_json(&sample()).unwrap()).unwrap();
        value["summary"]["person"]["count"] = serde_json::json!(7);
        let bytes = serde_json::to_vec(&value).unwrap();
        assert!(matches!(import_json(&bytes), Err(TimelineError::InvalidExport(_))));
    }

    #[test]
    fn import_rejects_misfiled_record() {
        let mut value: serde_json::Value = serde_json::from_slice(&to_json(&sample()).unwrap()).unwrap();
        value["detections_by_class"]["car"][0]["class_name"] = serde_json::json!("bus");
        let bytes = serde_json::to_vec(&value).unwrap();
        assert!(matches!(import_json(&bytes), Err(TimelineError::InvalidExport(_))));
    }

    #[test]
    fn import_rejects_empty_class() {
        let mut value: serde_json::Value = serde_json::from_slice(&to_json(&sample()).unwrap()).unwrap();
        value["detections_by_class"]["person"] = serde_json::json!([]);
        value["summary"].as_object_mut().unwrap().remove("person");
        let bytes = serde_json::to_vec(&value).unwrap();
        match import_json(&bytes) {
            Err(TimelineError::InvalidExport(reason)) => assert!(reason.contains("person")),
            other => panic!("expected InvalidExport, got {other:?}"),
        }
    }

    #[test]
    fn stub_query_is_not_part_of_output_name() {
        assert_eq!(
            default_output_path("stub://street?fps=25&frames=250", OutputFormat::Json),
            PathBuf::from("street_timestamps.json")
        );
        assert_eq!(
            class_csv_path("stub://street?fps=25", "person"),
            PathBuf::from("street_person_timestamps.csv")
        );
    }

    #[test]
    fn output_paths_derive_from_video_stem() {
        assert_eq!(
            default_output_path("/data/clips/street.mp4", OutputFormat::Json),
            PathBuf::from("street_timestamps.json")
        );
        assert_eq!(
            default_output_path("street", OutputFormat::Csv),
            PathBuf::from("street_timestamps.csv")
        );
        assert_eq!(
            class_csv_path("/data/street.mp4", "traffic light"),
            PathBuf::from("street_traffic_light_timestamps.csv")
        );
    }

    #[test]
    fn output_format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(" csv ".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
