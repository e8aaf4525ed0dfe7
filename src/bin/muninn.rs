//! muninn - inspect the local AI error log.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use muninn::tracker::window_start;
use muninn::{Config, ErrorSink, ErrorTracker, JsonLinesErrorSink, StatsSource};

/// Muninn CLI - AI error statistics and configuration.
#[derive(Parser)]
#[command(name = "muninn")]
#[command(version)]
#[command(about = "Inspect tracked AI call failures")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "MUNINN_CONFIG")]
    config: Option<PathBuf>,

    /// Error log to read (overrides `sinks.jsonl_path`).
    #[arg(long)]
    log: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Per-kind error counts over a trailing window
    Stats {
        /// Window in days (default: `tracker.stats_window_days`)
        #[arg(long)]
        days: Option<u32>,
    },

    /// List recorded errors, newest first
    Records {
        /// Window in days (default: `tracker.stats_window_days`)
        #[arg(long)]
        days: Option<u32>,
        /// Maximum number of records to print
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load_or_default(args.config.as_deref())?;
    let log_path = args.log.unwrap_or_else(|| config.sinks.jsonl_path.clone());
    let sink = Arc::new(JsonLinesErrorSink::new(&log_path));

    match args.command {
        Command::Stats { days } => {
            let days = days.unwrap_or(config.tracker.stats_window_days);
            let tracker = ErrorTracker::builder()
                .config(config.tracker_config())
                .sink(sink)
                .build();
            let stats = tracker.get_stats(days).await;
            if stats.source == StatsSource::InMemory {
                eprintln!("warning: could not read {}", log_path.display());
            }

            println!("AI errors over the last {days} day(s):");
            for (kind, count) in stats.iter() {
                println!("  {:<16} {count:>6}", kind.as_str());
            }
            println!("  {:<16} {:>6}", "TOTAL", stats.total());
        }

        Command::Records { days, limit } => {
            let days = days.unwrap_or(config.tracker.stats_window_days);
            let mut records = sink.query(window_start(days)).await?;
            records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

            if records.is_empty() {
                println!("no errors recorded in the last {days} day(s)");
            }
            for record in records.iter().take(limit) {
                let status = record
                    .status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}  {:<16} {:<24} {:<28} {status:>3}  {}",
                    record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    record.kind.as_str(),
                    record.endpoint,
                    record.model_name,
                    record.message,
                );
            }
        }

        Command::Config => {
            print!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}
