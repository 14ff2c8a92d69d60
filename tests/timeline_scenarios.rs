use object_timeline::{
    import_json, to_csv, to_json, AggregatedResult, BoundingBox, ClassSummary, DetectionAggregator,
    DetectionSettings, NavigationIndex, RawDetection, TimelineError, VideoProperties,
};

fn det(class_name: &str, confidence: f64, bbox: (u32, u32, u32, u32)) -> RawDetection {
    RawDetection::new(class_name, confidence, BoundingBox::new(bbox.0, bbox.1, bbox.2, bbox.3))
}

/// Three frames at 30 fps: person, nothing, person.
fn three_frames() -> Vec<(u64, Vec<RawDetection>)> {
    vec![
        (0, vec![det("person", 0.9, (0, 0, 10, 10))]),
        (1, vec![]),
        (2, vec![det("person", 0.95, (1, 1, 11, 11))]),
    ]
}

fn aggregate(settings: DetectionSettings, frames: Vec<(u64, Vec<RawDetection>)>) -> AggregatedResult {
    let total = frames.len() as u64;
    let mut aggregator = DetectionAggregator::new(settings);
    for (frame_index, detections) in frames {
        aggregator
            .ingest(frame_index, 30.0, detections)
            .expect("ingest frame");
    }
    let properties = VideoProperties::new(30.0, total).expect("video properties");
    aggregator.finish("clips/street.mp4", properties, total)
}

#[test]
fn threshold_keeps_confident_person_detections() {
    let settings = DetectionSettings::all_classes("stub", 0.5).unwrap();
    let result = aggregate(settings, three_frames());

    let records = result.records("person").expect("person records");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].timestamp_formatted(), "00:00:00.000");
    assert_eq!(records[1].timestamp_formatted(), "00:00:00.067");
    assert_eq!(records[1].timestamp_seconds(), 0.067);
    assert_eq!(records[1].frame_index(), 2);

    assert_eq!(
        result.summary().get("person"),
        Some(&ClassSummary {
            count: 2,
            first_appearance: "00:00:00.000".into(),
            last_appearance: "00:00:00.067".into(),
        })
    );
    assert!(!result.is_partial());
}

#[test]
fn higher_threshold_drops_weaker_detection() {
    let settings = DetectionSettings::all_classes("stub", 0.92).unwrap();
    let result = aggregate(settings, three_frames());

    let records = result.records("person").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].frame_index(), 2);
    assert_eq!(result.summary().get("person").unwrap().count, 1);
}

#[test]
fn class_filter_excludes_everything_else() {
    let settings = DetectionSettings::new("stub", 0.5, Some(["car"])).unwrap();
    let result = aggregate(settings, three_frames());

    assert!(!result.detections_by_class().contains_key("person"));
    assert!(result.summary().is_empty());

    let index = NavigationIndex::new(&result);
    match index.first_appearance("person") {
        Err(TimelineError::UnknownClass(class)) => assert_eq!(class, "person"),
        other => panic!("expected UnknownClass, got {other:?}"),
    }
}

#[test]
fn malformed_detection_is_skipped_and_frame_continues() {
    let settings = DetectionSettings::all_classes("stub", 0.25).unwrap();
    let mut aggregator = DetectionAggregator::new(settings);

    let outcome = aggregator
        .ingest(
            0,
            30.0,
            vec![
                det("person", 1.5, (0, 0, 10, 10)),
                det("dog", 0.8, (5, 5, 20, 20)),
                det("car", 0.7, (10, 10, 5, 20)),
            ],
        )
        .expect("frame ingested");

    assert_eq!(outcome.accepted, 1);
    assert_eq!(outcome.rejected.len(), 2);
    assert!(outcome
        .rejected
        .iter()
        .all(|err| matches!(err, TimelineError::InvalidDetection { frame_index: 0, .. })));
    assert_eq!(aggregator.rejected_total(), 2);

    let result = aggregator.finish("v.mp4", VideoProperties::new(30.0, 1).unwrap(), 1);
    assert_eq!(result.classes().collect::<Vec<_>>(), vec!["dog"]);
}

#[test]
fn every_record_satisfies_threshold_and_filter() {
    let frames: Vec<(u64, Vec<RawDetection>)> = (0..40u64)
        .map(|frame| {
            let confidence = (frame % 10) as f64 / 10.0;
            let class = ["person", "car", "dog"][(frame % 3) as usize];
            (frame, vec![det(class, confidence, (0, 0, 4, 4)), det("cat", 0.99, (1, 1, 2, 2))])
        })
        .collect();
    let settings = DetectionSettings::new("stub", 0.45, Some(vec!["person", "dog"])).unwrap();
    let result = aggregate(settings, frames);

    let mut total = 0;
    for (class_name, records) in result.detections_by_class().iter() {
        assert!(class_name == "person" || class_name == "dog");
        assert!(!records.is_empty());
        for pair in records.windows(2) {
            assert!(pair[0].frame_index() <= pair[1].frame_index());
            assert!(pair[0].timestamp_seconds() <= pair[1].timestamp_seconds());
        }
        for record in records {
            assert_eq!(record.class_name(), class_name);
            assert!(record.confidence() >= 0.45);
        }
        let summary = result.summary().get(class_name).unwrap();
        assert_eq!(summary.count, records.len());
        assert_eq!(summary.first_appearance, records[0].timestamp_formatted());
        assert_eq!(summary.last_appearance, records[records.len() - 1].timestamp_formatted());
        total += records.len();
    }
    assert_eq!(total, result.total_detections());
    assert_eq!(result.summary().len(), result.detections_by_class().len());
}

#[test]
fn json_export_reimports_to_the_same_result() {
    let settings = DetectionSettings::new("yolov8n.onnx", 0.5, Some(["person", "car"])).unwrap();
    let mut frames = three_frames();
    frames.push((3, vec![det("car", 0.61, (3, 4, 50, 60))]));
    let result = aggregate(settings, frames);

    let first = to_json(&result).unwrap();
    let reloaded = import_json(&first).unwrap();
    assert_eq!(reloaded, result);
    assert_eq!(to_json(&reloaded).unwrap(), first);

    let value: serde_json::Value = serde_json::from_slice(&first).unwrap();
    let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
    for key in [
        "video_path",
        "video_properties",
        "detection_settings",
        "detections_by_class",
        "summary",
    ] {
        assert!(keys.contains(&key), "missing {key}");
    }
    assert_eq!(value["detection_settings"]["model"], "yolov8n.onnx");
    assert_eq!(value["detection_settings"]["target_classes"], serde_json::json!(["car", "person"]));
    assert_eq!(value["detections_by_class"]["car"][0]["frame_number"], 3);
    assert_eq!(value["detections_by_class"]["car"][0]["bbox"]["x2"], 50);
}

#[test]
fn csv_export_of_empty_result_is_header_only() {
    let settings = DetectionSettings::all_classes("stub", 0.99).unwrap();
    let result = aggregate(settings, three_frames());
    assert_eq!(result.total_detections(), 0);

    let csv = String::from_utf8(to_csv(&result, None).unwrap()).unwrap();
    assert_eq!(
        csv,
        "timestamp_seconds,timestamp_formatted,frame_number,class_name,confidence,x1,y1,x2,y2\n"
    );
    assert!(matches!(
        to_csv(&result, Some("person")),
        Err(TimelineError::UnknownClass(_))
    ));
}

#[test]
fn csv_rows_follow_class_then_frame_order() {
    let settings = DetectionSettings::all_classes("stub", 0.25).unwrap();
    let frames = vec![
        (0, vec![det("car", 0.5, (0, 0, 1, 1))]),
        (1, vec![det("person", 0.6, (0, 0, 2, 2))]),
        (2, vec![det("car", 0.7, (0, 0, 3, 3))]),
    ];
    let result = aggregate(settings, frames);
    let csv = String::from_utf8(to_csv(&result, None).unwrap()).unwrap();
    let classes: Vec<&str> = csv
        .lines()
        .skip(1)
        .map(|line| line.split(',').nth(3).unwrap())
        .collect();
    assert_eq!(classes, vec!["car", "car", "person"]);
}
