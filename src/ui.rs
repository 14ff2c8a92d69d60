use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

use object_timeline::pipeline::{PassSummary, ProgressObserver};
use object_timeline::VideoProperties;

/// Plain-mode progress lines are printed at most this often.
const PLAIN_PROGRESS_EVERY: u64 = 250;

#[derive(Clone, Copy, Debug)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, disable_pretty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty, disable_pretty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Per-frame progress for an extraction pass.
    #[allow(dead_code)]
    pub fn frame_progress(&self) -> FrameProgress {
        FrameProgress {
            pretty: self.use_pretty(),
            bar: None,
            start: Instant::now(),
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

#[allow(dead_code)]
pub struct FrameProgress {
    pretty: bool,
    bar: Option<ProgressBar>,
    start: Instant,
}

impl ProgressObserver for FrameProgress {
    fn on_start(&mut self, properties: &VideoProperties) {
        self.start = Instant::now();
        if !self.pretty {
            eprintln!(
                "    {} frames @ {:.2} fps ({})",
                properties.total_frames, properties.fps, properties.duration_formatted
            );
            return;
        }
        let bar = ProgressBar::new(properties.total_frames);
        bar.set_draw_target(ProgressDrawTarget::stderr());
        let style = ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} frames ({percent}%) eta {eta} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        self.bar = Some(bar);
    }

    fn on_frame(&mut self, processed: u64, total: u64) {
        match &self.bar {
            Some(bar) => bar.set_position(processed),
            None if processed % PLAIN_PROGRESS_EVERY == 0 => {
                eprintln!("    {processed}/{total} frames");
            }
            None => {}
        }
    }

    fn on_finish(&mut self, summary: &PassSummary) {
        let verb = if summary.cancelled { "stopped" } else { "done" };
        let message = format!(
            "{verb}: {}/{} frames in {}",
            summary.frames_processed,
            summary.frames_declared,
            format_duration(self.start.elapsed())
        );
        match self.bar.take() {
            Some(bar) => bar.finish_with_message(message),
            None => eprintln!("    {message}"),
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
