//! extract_timestamps - Build a per-class object timeline for a video.
//!
//! Runs the configured detector over every frame, groups detections by class
//! and writes the timeline as JSON or CSV. Ctrl-C stops the pass between
//! frames; whatever was aggregated so far is still written.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use object_timeline::{
    class_csv_path, default_output_path, open_backends, render, to_csv, AggregatedResult,
    BackendKind, CancelToken, ExtractConfig, ExtractOverrides, FileConfig, FileSource,
    OutputFormat, Pipeline, PipelineReport,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "extract_timestamps",
    version,
    about = "Extract per-class object appearance timestamps from a video"
)]
struct Args {
    /// Video file path (or stub://name?fps=..&frames=.. for a synthetic source)
    video: String,

    /// Model identifier: path to an .onnx model, replay:<detections.jsonl>, or stub
    #[arg(short, long, value_name = "MODEL")]
    model: Option<String>,

    /// Minimum confidence for a detection to be kept (0.0 - 1.0)
    #[arg(short, long, value_name = "THRESHOLD")]
    conf: Option<f64>,

    /// Only keep these classes (comma-separated); omit for all classes
    #[arg(long, value_name = "CLASS", value_delimiter = ',')]
    classes: Option<Vec<String>>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Output file (default: <video stem>_timestamps.<format>)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Detector worker threads
    #[arg(short, long)]
    workers: Option<usize>,

    /// Also write one CSV per class (<video stem>_<class>_timestamps.csv)
    #[arg(long)]
    per_class_csv: bool,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

impl Args {
    fn overrides(&self) -> ExtractOverrides {
        ExtractOverrides {
            model: self.model.clone(),
            confidence_threshold: self.conf,
            target_classes: self.classes.clone(),
            format: self.format,
            output_path: self.output.clone(),
            workers: self.workers,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let config = {
        let _stage = ui.stage("Load configuration");
        ExtractConfig::load_with(args.overrides())?
    };
    let settings = config.detection_settings()?;
    let backend_kind = BackendKind::from_model_identifier(&config.model)?;

    let mut source = {
        let _stage = ui.stage("Open video");
        FileSource::open(FileConfig::for_path(&args.video))
            .with_context(|| format!("failed to open video {}", args.video))?
    };
    let detectors = {
        let _stage = ui.stage("Load detector");
        open_backends(&backend_kind, &config.backend_options(), config.workers)
            .with_context(|| format!("failed to load model {}", config.model))?
    };
    log::info!(
        "model={} confidence>={} classes={} workers={}",
        config.model,
        config.confidence_threshold,
        if config.target_classes.is_empty() {
            "all".to_string()
        } else {
            config.target_classes.join(",")
        },
        config.workers
    );

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        handler_token.cancel();
    })
    .expect("error setting Ctrl-C handler");

    let pipeline = Pipeline::new(args.video.clone(), settings).with_cancel_token(cancel);
    let mut progress = ui.frame_progress();
    let report = {
        let _stage = ui.stage("Detect objects");
        if detectors.len() == 1 {
            let mut detector = detectors
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("no detector backend loaded"))?;
            pipeline.run(&mut source, detector.as_mut(), &mut progress)?
        } else {
            pipeline.run_parallel(&mut source, detectors, &mut progress)?
        }
    };

    let output_path = config
        .output_path
        .clone()
        .unwrap_or_else(|| default_output_path(&args.video, config.format));
    {
        let _stage = ui.stage("Write results");
        let bytes = render(&report.result, config.format)?;
        std::fs::write(&output_path, bytes)
            .with_context(|| format!("failed to write {}", output_path.display()))?;
        if args.per_class_csv {
            write_class_csvs(&report.result)?;
        }
    }

    print_summary(&report, &output_path);
    Ok(())
}

fn write_class_csvs(result: &AggregatedResult) -> Result<()> {
    for class_name in result.classes() {
        let path = class_csv_path(result.video_path(), class_name);
        let bytes = to_csv(result, Some(class_name))?;
        std::fs::write(&path, bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
        log::info!("wrote {} detections to {}", class_name, path.display());
    }
    Ok(())
}

fn print_summary(report: &PipelineReport, output_path: &std::path::Path) {
    let result = &report.result;
    let properties = result.video_properties();
    println!(
        "{}: {} frames @ {:.2} fps ({})",
        result.video_path(),
        properties.total_frames,
        properties.fps,
        properties.duration_formatted
    );
    if result.summary().is_empty() {
        println!("  no detections");
    }
    for (class_name, summary) in result.summary().iter() {
        println!(
            "  {:<16} {:>6} detections  first {}  last {}",
            class_name, summary.count, summary.first_appearance, summary.last_appearance
        );
    }
    println!(
        "total: {} detections across {} classes",
        result.total_detections(),
        result.summary().len()
    );
    if result.is_partial() {
        let reason = if report.summary.cancelled {
            "cancelled"
        } else {
            "video ended early"
        };
        println!(
            "partial result ({reason}): {} of {} frames processed",
            report.summary.frames_processed, report.summary.frames_declared
        );
    }
    if report.summary.rejected_detections > 0 {
        println!(
            "{} malformed detections were rejected",
            report.summary.rejected_detections
        );
    }
    println!("results written to {}", output_path.display());
}
