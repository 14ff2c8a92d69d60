//! timeline_query - Navigate a saved object timeline.
//!
//! Loads a JSON export written by `extract_timestamps` and answers the
//! navigation queries: first/last appearance, paged listings, time search,
//! jump targets and appearance intervals.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;

use object_timeline::{
    class_csv_path, import_json, parse_timestamp, to_csv, DetectionRecord, NavigationIndex,
    DEFAULT_INTERVAL_GAP_SECS, DEFAULT_PAGE_SIZE,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "timeline_query",
    version,
    about = "Query a JSON object timeline produced by extract_timestamps"
)]
struct Args {
    /// JSON export to load
    #[arg(value_name = "TIMELINE_JSON")]
    input: PathBuf,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Per-class counts with first and last appearance
    Summary,
    /// Detected classes in first-appearance order
    Classes,
    /// First appearance of a class
    First { class: String },
    /// Last appearance of a class
    Last { class: String },
    /// List a class's detections, one page at a time
    List {
        class: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        per_page: usize,
    },
    /// Detections whose timestamp starts with a prefix (e.g. 00:01:2)
    Search { class: String, prefix: String },
    /// Seek position in seconds for the N-th detection (0-based)
    Jump { class: String, index: usize },
    /// First detection at or after a time (HH:MM:SS.mmm, MM:SS or seconds)
    Nearest { class: String, time: String },
    /// Continuous appearance intervals
    Intervals {
        class: String,
        /// Largest gap in seconds that still joins two detections
        #[arg(long, default_value_t = DEFAULT_INTERVAL_GAP_SECS)]
        gap: f64,
    },
    /// Write one class's detections as CSV
    Csv {
        class: String,
        /// Output file (default: <video stem>_<class>_timestamps.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let result = {
        let _stage = ui.stage("Load timeline");
        let bytes = std::fs::read(&args.input)
            .with_context(|| format!("failed to read {}", args.input.display()))?;
        import_json(&bytes).with_context(|| format!("invalid timeline {}", args.input.display()))?
    };
    let index = NavigationIndex::new(&result);

    match args.command {
        Command::Summary => {
            for (class_name, summary) in result.summary().iter() {
                println!(
                    "{:<16} {:>6}  {} - {}",
                    class_name, summary.count, summary.first_appearance, summary.last_appearance
                );
            }
            println!("total: {}", index.total_detections());
        }
        Command::Classes => {
            for class_name in index.classes() {
                println!("{class_name}");
            }
        }
        Command::First { class } => print_record(index.first_appearance(&class)?),
        Command::Last { class } => print_record(index.last_appearance(&class)?),
        Command::List {
            class,
            page,
            per_page,
        } => {
            let page = index.page(&class, page, per_page)?;
            for record in page.records {
                print_record(record);
            }
            println!("page {} of {}", page.page, page.total_pages);
        }
        Command::Search { class, prefix } => {
            let matches = index.search(&class, &prefix)?;
            for record in &matches {
                print_record(record);
            }
            println!("{} matches", matches.len());
        }
        Command::Jump { class, index: record_index } => {
            println!("{:.3}", index.jump_target(&class, record_index)?);
        }
        Command::Nearest { class, time } => {
            let seconds = parse_timestamp(&time)
                .ok_or_else(|| anyhow!("cannot parse time '{}' (use HH:MM:SS.mmm, MM:SS or seconds)", time))?;
            print_record(index.nearest(&class, seconds)?);
        }
        Command::Intervals { class, gap } => {
            for interval in index.intervals(&class, gap)? {
                println!(
                    "{} - {}  {:>8.3}s  {} detections",
                    interval.start, interval.end, interval.duration_seconds, interval.detections
                );
            }
        }
        Command::Csv { class, output } => {
            let path = output.unwrap_or_else(|| class_csv_path(result.video_path(), &class));
            let bytes = to_csv(&result, Some(&class))?;
            std::fs::write(&path, bytes)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("wrote {}", path.display());
        }
    }
    Ok(())
}

fn print_record(record: &DetectionRecord) {
    let bbox = record.bbox();
    println!(
        "{}  frame {:>7}  {:.2}  [{}, {}, {}, {}]",
        record.timestamp_formatted(),
        record.frame_index(),
        record.confidence(),
        bbox.x1,
        bbox.y1,
        bbox.x2,
        bbox.y2
    );
}
