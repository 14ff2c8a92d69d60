//! One extraction pass: frame source → detector → aggregator.
//!
//! Frames are ingested strictly in frame order. `run` detects inline;
//! `run_parallel` fans frames out to several detector workers and restores
//! order through a `ReorderBuffer` before anything reaches the aggregator.
//!
//! Cancellation is checked between frames. A cancelled or short pass still
//! yields a valid, exportable `AggregatedResult` marked partial.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Context, Result};

use crate::aggregate::{DetectionAggregator, FrameOutcome};
use crate::detect::DetectorBackend;
use crate::error::TimelineError;
use crate::frame::Frame;
use crate::ingest::FrameSource;
use crate::record::{DetectionSettings, RawDetection, VideoProperties};
use crate::result::AggregatedResult;

/// Frames between progress log lines.
const PROGRESS_LOG_INTERVAL: u64 = 100;

/// Frames queued per detection worker.
const WORKER_QUEUE_DEPTH: usize = 2;

/// Shared stop flag, checked between frames.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Receives progress while a pass runs.
pub trait ProgressObserver {
    fn on_start(&mut self, _properties: &VideoProperties) {}

    /// Called after each ingested frame.
    fn on_frame(&mut self, processed: u64, total: u64);

    fn on_finish(&mut self, _report: &PassSummary) {}
}

impl<F: FnMut(u64, u64)> ProgressObserver for F {
    fn on_frame(&mut self, processed: u64, total: u64) {
        self(processed, total)
    }
}

/// Observer that ignores everything.
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_frame(&mut self, _processed: u64, _total: u64) {}
}

/// How a pass ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassSummary {
    pub frames_processed: u64,
    pub frames_declared: u64,
    pub detections: usize,
    pub rejected_detections: u64,
    pub cancelled: bool,
}

/// Result of a pass plus the warnings raised along the way.
#[derive(Debug)]
pub struct PipelineReport {
    pub result: AggregatedResult,
    pub summary: PassSummary,
    /// `SourceExhaustedEarly` when the source ended before its declared length.
    pub warnings: Vec<TimelineError>,
}

/// Drives one pass over a frame source.
pub struct Pipeline {
    video_path: String,
    settings: DetectionSettings,
    cancel: CancelToken,
}

impl Pipeline {
    pub fn new(video_path: impl Into<String>, settings: DetectionSettings) -> Self {
        Self {
            video_path: video_path.into(),
            settings,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Sequential pass: detect and ingest each frame before reading the next.
    pub fn run(
        self,
        source: &mut dyn FrameSource,
        detector: &mut dyn DetectorBackend,
        progress: &mut dyn ProgressObserver,
    ) -> Result<PipelineReport> {
        let properties = source.properties().clone();
        progress.on_start(&properties);
        let mut pass = Pass::new(self.settings.clone(), properties);

        while !self.cancel.is_cancelled() {
            let Some(frame) = source.next_frame().context("frame source failed")? else {
                break;
            };
            let detections = detector
                .detect(&frame)
                .with_context(|| format!("detector '{}' failed on frame {}", detector.name(), frame.index))?;
            pass.ingest(frame.index, detections, progress)?;
        }

        Ok(self.finish(pass, progress))
    }

    /// Parallel pass: detection runs on one worker per backend; results are
    /// put back into frame order before ingestion.
    pub fn run_parallel(
        self,
        source: &mut dyn FrameSource,
        detectors: Vec<Box<dyn DetectorBackend>>,
        progress: &mut dyn ProgressObserver,
    ) -> Result<PipelineReport> {
        if detectors.is_empty() {
            return Err(anyhow!("parallel pass needs at least one detector"));
        }
        let properties = source.properties().clone();
        progress.on_start(&properties);
        let mut pass = Pass::new(self.settings.clone(), properties);
        let cancel = self.cancel.clone();

        thread::scope(|scope| -> Result<()> {
            let (result_tx, result_rx) = mpsc::channel::<DetectionJobResult>();
            let mut job_txs = Vec::with_capacity(detectors.len());

            for (worker, mut detector) in detectors.into_iter().enumerate() {
                let (job_tx, job_rx) = mpsc::sync_channel::<(u64, Frame)>(WORKER_QUEUE_DEPTH);
                let result_tx = result_tx.clone();
                job_txs.push(job_tx);
                scope.spawn(move || {
                    for (seq, frame) in job_rx {
                        let detections = detector.detect(&frame).with_context(|| {
                            format!(
                                "detector '{}' (worker {}) failed on frame {}",
                                detector.name(),
                                worker,
                                frame.index
                            )
                        });
                        if result_tx.send((seq, frame.index, detections)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(result_tx);

            let mut reorder = ReorderBuffer::new();
            let mut dispatched = 0u64;
            while !cancel.is_cancelled() {
                let Some(frame) = source.next_frame().context("frame source failed")? else {
                    break;
                };
                let worker = (dispatched % job_txs.len() as u64) as usize;
                job_txs[worker]
                    .send((dispatched, frame))
                    .map_err(|_| anyhow!("detection worker {} stopped", worker))?;
                dispatched += 1;

                while let Ok(done) = result_rx.try_recv() {
                    pass.ingest_ready(&mut reorder, done, progress)?;
                }
            }

            // Frames already handed to workers are still ingested after a cancel.
            job_txs.clear();
            for done in result_rx.iter() {
                pass.ingest_ready(&mut reorder, done, progress)?;
            }
            if !reorder.is_empty() {
                return Err(anyhow!(
                    "{} detection results never became contiguous",
                    reorder.len()
                ));
            }
            Ok(())
        })?;

        Ok(self.finish(pass, progress))
    }

    fn finish(self, pass: Pass, progress: &mut dyn ProgressObserver) -> PipelineReport {
        let cancelled = self.cancel.is_cancelled();
        let Pass {
            aggregator,
            properties,
            frames_processed,
        } = pass;

        let mut warnings = Vec::new();
        if cancelled {
            log::info!(
                "pass cancelled after {} of {} frames; keeping partial result",
                frames_processed,
                properties.total_frames
            );
        } else if frames_processed < properties.total_frames {
            let warning = TimelineError::SourceExhaustedEarly {
                processed: frames_processed,
                declared: properties.total_frames,
            };
            log::warn!("{}", warning);
            warnings.push(warning);
        }

        let summary = PassSummary {
            frames_processed,
            frames_declared: properties.total_frames,
            detections: aggregator.total_detections(),
            rejected_detections: aggregator.rejected_total(),
            cancelled,
        };
        log::info!(
            "processing complete: {} detections over {} frames ({} rejected)",
            summary.detections,
            summary.frames_processed,
            summary.rejected_detections
        );
        progress.on_finish(&summary);

        let result = aggregator.finish(self.video_path, properties, frames_processed);
        PipelineReport {
            result,
            summary,
            warnings,
        }
    }
}

type DetectionJobResult = (u64, u64, Result<Vec<RawDetection>>);

struct Pass {
    aggregator: DetectionAggregator,
    properties: VideoProperties,
    frames_processed: u64,
}

impl Pass {
    fn new(settings: DetectionSettings, properties: VideoProperties) -> Self {
        Self {
            aggregator: DetectionAggregator::new(settings),
            properties,
            frames_processed: 0,
        }
    }

    fn ingest(
        &mut self,
        frame_index: u64,
        detections: Vec<RawDetection>,
        progress: &mut dyn ProgressObserver,
    ) -> Result<()> {
        let outcome = self
            .aggregator
            .ingest(frame_index, self.properties.fps, detections)?;
        log_rejections(frame_index, &outcome);
        log::trace!(
            "frame {}: {} accepted, {} below threshold, {} filtered",
            frame_index,
            outcome.accepted,
            outcome.below_threshold,
            outcome.class_filtered
        );

        self.frames_processed += 1;
        let total = self.properties.total_frames;
        progress.on_frame(self.frames_processed, total);
        if self.frames_processed % PROGRESS_LOG_INTERVAL == 0 {
            if total > 0 {
                log::info!(
                    "progress: {:.1}% ({}/{} frames)",
                    self.frames_processed as f64 * 100.0 / total as f64,
                    self.frames_processed,
                    total
                );
            } else {
                log::info!("progress: {} frames", self.frames_processed);
            }
        }
        Ok(())
    }

    fn ingest_ready(
        &mut self,
        reorder: &mut ReorderBuffer<(u64, Vec<RawDetection>)>,
        done: DetectionJobResult,
        progress: &mut dyn ProgressObserver,
    ) -> Result<()> {
        let (seq, frame_index, detections) = done;
        for (frame_index, detections) in reorder.push(seq, (frame_index, detections?)) {
            self.ingest(frame_index, detections, progress)?;
        }
        Ok(())
    }
}

fn log_rejections(frame_index: u64, outcome: &FrameOutcome) {
    for err in &outcome.rejected {
        log::warn!("rejected detection at frame {}: {}", frame_index, err);
    }
}

/// Holds out-of-order items until every earlier sequence number has arrived.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    next: u64,
    pending: BTreeMap<u64, T>,
}

impl<T> ReorderBuffer<T> {
    pub fn new() -> Self {
        Self {
            next: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Accepts item `seq` and returns every item that is now in order.
    pub fn push(&mut self, seq: u64, item: T) -> Vec<T> {
        self.pending.insert(seq, item);
        let mut ready = Vec::new();
        while let Some(item) = self.pending.remove(&self.next) {
            ready.push(item);
            self.next += 1;
        }
        ready
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}
