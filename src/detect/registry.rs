use std::path::PathBuf;

use anyhow::{anyhow, Result};

use super::backend::DetectorBackend;
use super::backends::{ReplayBackend, StubBackend};

/// Default YOLO input resolution.
pub const DEFAULT_INPUT_SIZE: u32 = 640;

/// Which backend a model identifier selects.
///
/// - `stub` / `stub:demo`: synthetic demo detections
/// - `stub:empty`: detects nothing
/// - `replay:<path>` or `<path>.jsonl`: precomputed detections
/// - `<path>.onnx`: ONNX model (feature: backend-tract)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendKind {
    StubDemo,
    StubEmpty,
    Replay(PathBuf),
    Onnx(PathBuf),
}

impl BackendKind {
    pub fn from_model_identifier(model: &str) -> Result<Self> {
        let model = model.trim();
        match model {
            "" => return Err(anyhow!("model identifier must not be empty")),
            "stub" | "stub:demo" => return Ok(BackendKind::StubDemo),
            "stub:empty" => return Ok(BackendKind::StubEmpty),
            _ => {}
        }
        if let Some(path) = model.strip_prefix("replay:") {
            if path.is_empty() {
                return Err(anyhow!("replay model identifier needs a file path"));
            }
            return Ok(BackendKind::Replay(PathBuf::from(path)));
        }
        let lower = model.to_ascii_lowercase();
        if lower.ends_with(".jsonl") {
            return Ok(BackendKind::Replay(PathBuf::from(model)));
        }
        if lower.ends_with(".onnx") {
            return Ok(BackendKind::Onnx(PathBuf::from(model)));
        }
        if lower.ends_with(".pt") {
            return Err(anyhow!(
                "PyTorch weights '{}' are not supported; export the model to ONNX first",
                model
            ));
        }
        Err(anyhow!("unsupported model identifier '{}'", model))
    }
}

/// Options shared by every backend instance of a run.
#[derive(Clone, Debug)]
pub struct BackendOptions {
    pub input_width: u32,
    pub input_height: u32,
    /// Label vocabulary override for model backends.
    pub labels: Option<Vec<String>>,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            input_width: DEFAULT_INPUT_SIZE,
            input_height: DEFAULT_INPUT_SIZE,
            labels: None,
        }
    }
}

/// Instantiate one backend.
pub fn open_backend(kind: &BackendKind, options: &BackendOptions) -> Result<Box<dyn DetectorBackend>> {
    let mut backend: Box<dyn DetectorBackend> = match kind {
        BackendKind::StubDemo => Box::new(StubBackend::demo()),
        BackendKind::StubEmpty => Box::new(StubBackend::new()),
        BackendKind::Replay(path) => Box::new(ReplayBackend::open(path)?),
        BackendKind::Onnx(path) => open_onnx(path, options)?,
    };
    backend.warm_up()?;
    log::debug!("detector backend '{}' ready", backend.name());
    Ok(backend)
}

/// Instantiate `count` independent backends, one per detection worker.
pub fn open_backends(
    kind: &BackendKind,
    options: &BackendOptions,
    count: usize,
) -> Result<Vec<Box<dyn DetectorBackend>>> {
    if count == 0 {
        return Err(anyhow!("at least one detector backend is required"));
    }
    (0..count).map(|_| open_backend(kind, options)).collect()
}

#[cfg(feature = "backend-tract")]
fn open_onnx(path: &std::path::Path, options: &BackendOptions) -> Result<Box<dyn DetectorBackend>> {
    let mut backend = super::backends::TractBackend::new(path, options.input_width, options.input_height)?;
    if let Some(labels) = &options.labels {
        backend = backend.with_labels(labels.clone());
    }
    Ok(Box::new(backend))
}

#[cfg(not(feature = "backend-tract"))]
fn open_onnx(path: &std::path::Path, _options: &BackendOptions) -> Result<Box<dyn DetectorBackend>> {
    Err(anyhow!(
        "running ONNX model {} requires the backend-tract feature",
        path.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_model_identifiers() {
        assert_eq!(BackendKind::from_model_identifier("stub").unwrap(), BackendKind::StubDemo);
        assert_eq!(BackendKind::from_model_identifier("stub:empty").unwrap(), BackendKind::StubEmpty);
        assert_eq!(
            BackendKind::from_model_identifier("replay:out/dets.json").unwrap(),
            BackendKind::Replay(PathBuf::from("out/dets.json"))
        );
        assert_eq!(
            BackendKind::from_model_identifier("dets.JSONL").unwrap(),
            BackendKind::Replay(PathBuf::from("dets.JSONL"))
        );
        assert_eq!(
            BackendKind::from_model_identifier("models/yolov8n.onnx").unwrap(),
            BackendKind::Onnx(PathBuf::from("models/yolov8n.onnx"))
        );
    }

    #[test]
    fn rejects_unusable_identifiers() {
        for model in ["", "replay:", "yolov8n.pt", "mystery"] {
            assert!(BackendKind::from_model_identifier(model).is_err(), "{model}");
        }
    }

    #[test]
    fn opens_one_backend_per_worker() {
        let backends = open_backends(&BackendKind::StubDemo, &BackendOptions::default(), 3).unwrap();
        assert_eq!(backends.len(), 3);
        assert!(backends.iter().all(|b| b.name() == "stub"));
        assert!(open_backends(&BackendKind::StubDemo, &BackendOptions::default(), 0).is_err());
    }

    #[test]
    fn missing_replay_file_is_an_error() {
        let kind = BackendKind::Replay(PathBuf::from("/nonexistent/replay.jsonl"));
        assert!(open_backend(&kind, &BackendOptions::default()).is_err());
    }
}
