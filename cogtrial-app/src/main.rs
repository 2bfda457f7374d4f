mod app;
mod participant;
mod recorder;

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use cogtrial_core::TaskKind;
use tracing_subscriber::EnvFilter;

use app::{App, Settings};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Task {
    /// Sequence recall ("constellation")
    Recall,
    /// Spatial search ("treasure hunt")
    Search,
}

impl From<Task> for TaskKind {
    fn from(task: Task) -> Self {
        match task {
            Task::Recall => TaskKind::SequenceRecall,
            Task::Search => TaskKind::SpatialSearch,
        }
    }
}

/// Runs one protocol day with a simulated participant and saves the day's records
#[derive(Parser, Debug)]
#[command(name = "cogtrial-app", version, long_about = None)]
struct Args {
    #[arg(short, long, value_enum, default_value_t = Task::Recall)]
    task: Task,

    /// Protocol day, clamped to 1..=7
    #[arg(short, long, default_value_t = 1)]
    day: u8,

    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Root directory for saved day files
    #[arg(short, long, default_value = "sessions")]
    out: PathBuf,

    #[arg(long, default_value = "sim")]
    participant: String,

    /// JSON day table replacing the built-in protocol
    #[arg(long)]
    table: Option<PathBuf>,

    /// Sleep on the wall clock instead of advancing virtual time
    #[arg(long, default_value_t = false)]
    realtime: bool,

    /// Probability of a wrong recall pick
    #[arg(long, default_value_t = 0.1)]
    error_rate: f64,

    /// Probability of re-opening an already opened slot
    #[arg(long, default_value_t = 0.1)]
    reopen_rate: f64,

    /// Consecutive failed attempts on one recall trial before the run aborts
    #[arg(long, default_value_t = 20)]
    max_replays: u32,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();

    let settings = Settings {
        task: args.task.into(),
        day: args.day,
        seed: args.seed,
        out: args.out,
        participant: args.participant,
        table: args.table,
        realtime: args.realtime,
        error_rate: args.error_rate,
        reopen_rate: args.reopen_rate,
        max_replays: args.max_replays,
    };
    let summary = App::new(settings).run()?;

    println!("Day {} complete: {} trials", summary.day, summary.trials);
    println!("  Failed attempts:  {}", summary.failed_attempts);
    println!("  Wrong attempts:   {}", summary.wrong_attempts);
    println!("  Repeat errors:    {}", summary.repeat_errors);
    println!("  Degraded layouts: {}", summary.degraded_layouts);
    println!("  Elapsed:          {:.1}s", summary.total_time_ms as f64 / 1e3);
    for path in &summary.saved {
        println!("  Saved {}", path.display());
    }

    Ok(())
}
