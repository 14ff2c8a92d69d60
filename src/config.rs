use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::detect::{BackendOptions, DEFAULT_INPUT_SIZE};
use crate::export::OutputFormat;
use crate::record::DetectionSettings;

pub const DEFAULT_MODEL: &str = "yolov8n.onnx";
pub const DEFAULT_CONFIDENCE: f64 = 0.25;
pub const DEFAULT_WORKERS: usize = 1;
const MAX_WORKERS: usize = 64;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ExtractConfigFile {
    detection: Option<DetectionConfigFile>,
    output: Option<OutputConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectionConfigFile {
    model: Option<String>,
    confidence: Option<f64>,
    classes: Option<Vec<String>>,
    workers: Option<usize>,
    input_size: Option<u32>,
    labels: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct OutputConfigFile {
    format: Option<OutputFormat>,
    path: Option<PathBuf>,
}

/// Resolved settings for one `extract_timestamps` run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractConfig {
    pub model: String,
    pub confidence_threshold: f64,
    /// Empty means every class.
    pub target_classes: Vec<String>,
    pub format: OutputFormat,
    pub output_path: Option<PathBuf>,
    pub workers: usize,
    pub input_size: u32,
    pub labels: Option<Vec<String>>,
}

/// Command-line values; `None` keeps whatever the file and environment chose.
#[derive(Debug, Clone, Default)]
pub struct ExtractOverrides {
    pub model: Option<String>,
    pub confidence_threshold: Option<f64>,
    pub target_classes: Option<Vec<String>>,
    pub format: Option<OutputFormat>,
    pub output_path: Option<PathBuf>,
    pub workers: Option<usize>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            confidence_threshold: DEFAULT_CONFIDENCE,
            target_classes: Vec::new(),
            format: OutputFormat::Json,
            output_path: None,
            workers: DEFAULT_WORKERS,
            input_size: DEFAULT_INPUT_SIZE,
            labels: None,
        }
    }
}

impl ExtractConfig {
    /// Defaults, then the file named by `TIMELINE_CONFIG`, then `TIMELINE_*` variables.
    pub fn load() -> Result<Self> {
        Self::load_with(ExtractOverrides::default())
    }

    /// Like `load`, with command-line values on top. An environment variable
    /// whose field is overridden is neither parsed nor validated; the merged
    /// configuration is validated once at the end.
    pub fn load_with(overrides: ExtractOverrides) -> Result<Self> {
        let config_path = std::env::var("TIMELINE_CONFIG")
            .ok()
            .filter(|path| !path.trim().is_empty());
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env(&overrides)?;
        cfg.with_overrides(overrides)
    }

    /// Layers command-line values on top and re-validates.
    pub fn with_overrides(mut self, overrides: ExtractOverrides) -> Result<Self> {
        if let Some(model) = overrides.model {
            self.model = model;
        }
        if let Some(confidence) = overrides.confidence_threshold {
            self.confidence_threshold = confidence;
        }
        if let Some(classes) = overrides.target_classes {
            self.target_classes = normalize_classes(classes);
        }
        if let Some(format) = overrides.format {
            self.format = format;
        }
        if overrides.output_path.is_some() {
            self.output_path = overrides.output_path;
        }
        if let Some(workers) = overrides.workers {
            self.workers = workers;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn detection_settings(&self) -> Result<DetectionSettings> {
        let classes = (!self.target_classes.is_empty()).then(|| self.target_classes.clone());
        Ok(DetectionSettings::new(
            self.model.clone(),
            self.confidence_threshold,
            classes,
        )?)
    }

    pub fn backend_options(&self) -> BackendOptions {
        BackendOptions {
            input_width: self.input_size,
            input_height: self.input_size,
            labels: self.labels.clone(),
        }
    }

    fn from_file(file: ExtractConfigFile) -> Self {
        let defaults = Self::default();
        let detection = file.detection.unwrap_or_default();
        let output = file.output.unwrap_or_default();
        Self {
            model: detection.model.unwrap_or(defaults.model),
            confidence_threshold: detection
                .confidence
                .unwrap_or(defaults.confidence_threshold),
            target_classes: detection
                .classes
                .map(normalize_classes)
                .unwrap_or_default(),
            format: output.format.unwrap_or(defaults.format),
            output_path: output.path,
            workers: detection.workers.unwrap_or(defaults.workers),
            input_size: detection.input_size.unwrap_or(defaults.input_size),
            labels: detection.labels,
        }
    }

    fn apply_env(&mut self, skip: &ExtractOverrides) -> Result<()> {
        let env = |key: &str| std::env::var(key).ok();
        if let Some(model) = env("TIMELINE_MODEL").filter(|_| skip.model.is_none()) {
            if !model.trim().is_empty() {
                self.model = model.trim().to_string();
            }
        }
        if let Some(confidence) =
            env("TIMELINE_CONFIDENCE").filter(|_| skip.confidence_threshold.is_none())
        {
            self.confidence_threshold = confidence
                .trim()
                .parse::<f64>()
                .map_err(|_| anyhow!("TIMELINE_CONFIDENCE must be a number between 0 and 1"))?;
        }
        if let Some(classes) =
            env("TIMELINE_CLASSES").filter(|_| skip.target_classes.is_none())
        {
            self.target_classes = split_csv(&classes);
        }
        if let Some(format) = env("TIMELINE_FORMAT").filter(|_| skip.format.is_none()) {
            if !format.trim().is_empty() {
                self.format = format
                    .parse::<OutputFormat>()
                    .map_err(|e| anyhow!("TIMELINE_FORMAT: {e}"))?;
            }
        }
        if let Some(workers) = env("TIMELINE_WORKERS").filter(|_| skip.workers.is_none()) {
            self.workers = workers
                .trim()
                .parse::<usize>()
                .map_err(|_| anyhow!("TIMELINE_WORKERS must be a positive integer"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(anyhow!("model identifier must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(anyhow!(
                "confidence threshold {} must be between 0 and 1",
                self.confidence_threshold
            ));
        }
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(anyhow!("workers must be between 1 and {MAX_WORKERS}"));
        }
        if self.input_size == 0 || self.input_size % 32 != 0 {
            return Err(anyhow!(
                "input_size {} must be a positive multiple of 32",
                self.input_size
            ));
        }
        if let Some(labels) = &self.labels {
            if labels.is_empty() {
                return Err(anyhow!("labels must not be empty when given"));
            }
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ExtractConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn normalize_classes(classes: Vec<String>) -> Vec<String> {
    classes
        .into_iter()
        .map(|class| class.trim().to_string())
        .filter(|class| !class.is_empty())
        .collect()
}

pub(crate) fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_csv_drops_blanks() {
        assert_eq!(split_csv(" person, ,car,"), vec!["person", "car"]);
        assert!(split_csv("").is_empty());
    }

    #[test]
    fn overrides_are_validated() {
        let cfg = ExtractConfig::default();
        let bad = ExtractOverrides {
            confidence_threshold: Some(1.5),
            ..ExtractOverrides::default()
        };
        assert!(cfg.clone().with_overrides(bad).is_err());

        let good = ExtractOverrides {
            target_classes: Some(vec![" dog ".into(), "".into()]),
            workers: Some(4),
            ..ExtractOverrides::default()
        };
        let cfg = cfg.with_overrides(good).unwrap();
        assert_eq!(cfg.target_classes, vec!["dog"]);
        assert_eq!(cfg.workers, 4);
    }

    #[test]
    fn empty_class_list_means_no_filter() {
        let settings = ExtractConfig::default().detection_settings().unwrap();
        assert!(settings.target_classes.is_none());
        assert_eq!(settings.model_identifier, DEFAULT_MODEL);
    }
}
