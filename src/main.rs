use anyhow::{Context, Result};
use clap::Parser;
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use catalog_match::catalog::CatalogProvider;
use catalog_match::config::MatchConfig;
use catalog_match::engine::MatchEngine;
use catalog_match::input::read_rows;
use catalog_match::models::MatchingStats;
use catalog_match::normalize::Normalizer;
use catalog_match::progress::{
    create_progress_bar, create_spinner, format_duration, log_progress, set_log_only,
};
use catalog_match::provider::RetryingProvider;
use catalog_match::report::write_report;
use catalog_match::safety::{validate_output_path, OUTPUT_PATTERN};

#[derive(Parser)]
#[command(name = "catalog-match")]
#[command(about = "Match a local track list against a catalog and write an SQLite report")]
struct Args {
    /// Local track list (JSON array of rows)
    input: PathBuf,

    /// Catalog to search (JSON array of tracks)
    catalog: PathBuf,

    /// Report database; the file name must contain "matched"
    output: PathBuf,

    /// Scoring config (JSON, every key optional)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "0")]
    workers: usize,

    /// Hide progress bars and log periodic progress lines instead
    #[arg(long)]
    log_only: bool,

    /// Write run statistics as JSON
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Retries for transient search failures
    #[arg(long, default_value = "2")]
    retries: u32,

    #[arg(long, default_value = "250")]
    retry_delay_ms: u64,

    /// Log level (RUST_LOG overrides)
    #[arg(long, default_value = "info")]
    log_level: log::LevelFilter,
}

const PROGRESS_INTERVAL: u64 = 500;

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .parse_default_env()
        .format_timestamp_secs()
        .init();
    set_log_only(args.log_only);

    validate_output_path(
        &args.output,
        OUTPUT_PATTERN,
        &[args.input.as_path(), args.catalog.as_path()],
    )?;

    if args.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.workers)
            .build_global()
            .context("Failed to set thread pool size")?;
    }

    let start = Instant::now();

    let config = match &args.config {
        Some(path) => {
            log::info!("[CONFIG] Loading {:?}", path);
            MatchConfig::from_file(path)?
        }
        None => MatchConfig::default(),
    };

    let spinner = create_spinner("Loading catalog");
    let catalog = CatalogProvider::from_file(&args.catalog, Normalizer::from_config(&config))?;
    spinner.finish_with_message(format!("Loaded {} catalog tracks", catalog.len()));
    log::info!("[LOAD] {} catalog tracks from {:?}", catalog.len(), args.catalog);

    let rows = read_rows(&args.input)?;
    let invalid = rows.iter().filter(|r| r.is_err()).count();
    log::info!(
        "[LOAD] {} input rows from {:?} ({} invalid)",
        rows.len(),
        args.input,
        invalid
    );

    let provider = RetryingProvider::new(
        catalog,
        args.retries,
        Duration::from_millis(args.retry_delay_ms),
    );
    let engine = MatchEngine::new(provider, config);

    let total = rows.len() as u64;
    let pb = create_progress_bar(total, "Matching");
    let done = AtomicU64::new(0);
    let cancel = AtomicBool::new(false);

    let outcomes = engine
        .run_batch(rows, &cancel, |_| {
            let current = done.fetch_add(1, Ordering::Relaxed) + 1;
            pb.inc(1);
            log_progress("MATCH", current, total, PROGRESS_INTERVAL);
        })
        .context("Matching aborted, no report written")?;
    pb.finish_with_message(format!("Matched {} rows", outcomes.len()));

    if args.output.exists() {
        std::fs::remove_file(&args.output).context("Failed to remove existing output file")?;
    }

    log::info!("[REPORT] Creating {:?}", args.output);
    let mut conn = Connection::open(&args.output).context("Failed to create output database")?;
    write_report(&mut conn, &outcomes)?;

    let mut stats = MatchingStats::from_outcomes(&outcomes);
    stats.elapsed_seconds = start.elapsed().as_secs_f64();
    stats.log_phase("final");
    if let Some(path) = &args.stats {
        stats
            .write_to_file(path)
            .with_context(|| format!("Failed to write stats file: {}", path.display()))?;
    }

    println!("\n{:=<60}", "");
    println!("Matching complete!");
    println!("  Rows: {}", stats.total_records);
    println!("  Matched: {} ({:.1}%)", stats.matched, stats.match_rate());
    println!("  Not found: {}", stats.not_found);
    println!("  Unprocessed: {}", stats.unprocessed);
    println!("  Candidates scored: {}", stats.candidates_scored);
    println!("  Elapsed: {}", format_duration(start.elapsed()));
    println!("{:=<60}", "");

    Ok(())
}
