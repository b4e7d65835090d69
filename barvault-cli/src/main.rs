//! BarVault CLI — daily-bar ingestion and maintenance commands.
//!
//! Commands:
//! - `update` — batch-update the tracked universe, resuming from a checkpoint
//! - `check` — audit stored data against the weekday calendar
//! - `refresh` — re-fetch the symbols a check report flagged
//! - `cleanup` — drop recovered symbols from a progress file's failure list
//! - `progress` — show the state of the last (or current) batch run
//! - `seed` — add symbols to the tracked universe

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use barvault_core::{
    AppConfig, BarProvider, Profile, RequestPacer, SourceFetcher, SqliteStore, Store,
};
use barvault_core::providers::{EastmoneyProvider, RecentWindowProvider, TencentProvider};
use barvault_runner::{
    check_universe, cleanup_failed_symbols, targeted_refresh, BatchConfig, BatchOrchestrator,
    BatchProgress, CompletenessReport, StdoutObserver,
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);
const RECENT_WINDOW_DAYS: i64 = 30;

#[derive(Parser)]
#[command(name = "barvault", about = "BarVault — daily OHLCV ingestion and auditing")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "barvault.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Batch-update every tracked symbol, resuming from the last checkpoint.
    Update {
        /// Backfill window for symbols with no stored data.
        #[arg(long, default_value_t = 60)]
        days: i64,

        /// Limit the number of symbols processed this run.
        #[arg(long)]
        max_symbols: Option<usize>,

        /// Start over instead of resuming a previous run.
        #[arg(long, default_value_t = false)]
        no_resume: bool,

        /// Use the conservative pacing profile (slow, fewer attempts).
        #[arg(long, default_value_t = false)]
        conservative: bool,
    },
    /// Audit stored bars against the expected weekday calendar.
    Check {
        /// Number of recent weekdays each symbol should cover.
        #[arg(long, default_value_t = 30)]
        target_days: usize,

        /// Where to write the report. Defaults to the configured report path.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Re-fetch the symbols a check report flagged as incomplete.
    Refresh {
        /// Report to act on. Defaults to the configured report path.
        #[arg(long)]
        report_file: Option<PathBuf>,

        /// Limit the number of symbols refreshed.
        #[arg(long)]
        max_symbols: Option<usize>,

        /// Skip the confirmation prompt.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
    /// Drop recovered symbols from a progress file's failure list.
    Cleanup {
        /// Progress file to clean. Defaults to the configured progress path.
        #[arg(long)]
        progress_file: Option<PathBuf>,

        /// Completeness window used to decide recovery.
        #[arg(long, default_value_t = 30)]
        target_days: usize,

        /// Skip the confirmation prompt.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
    /// Show the state of the last (or current) batch run.
    Progress {
        /// Progress file to inspect. Defaults to the configured progress path.
        #[arg(long)]
        progress_file: Option<PathBuf>,
    },
    /// Add symbols to the tracked universe.
    Seed {
        /// Symbols to add (e.g., 000001 600000).
        symbols: Vec<String>,

        /// File with one symbol per line.
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_file(&cli.config).map_err(anyhow::Error::msg)?;

    match cli.command {
        Commands::Update {
            days,
            max_symbols,
            no_resume,
            conservative,
        } => run_update(&config, days, max_symbols, no_resume, conservative),
        Commands::Check {
            target_days,
            output,
        } => run_check(&config, target_days, output),
        Commands::Refresh {
            report_file,
            max_symbols,
            yes,
        } => run_refresh(&config, report_file, max_symbols, yes),
        Commands::Cleanup {
            progress_file,
            target_days,
            yes,
        } => run_cleanup(&config, progress_file, target_days, yes),
        Commands::Progress { progress_file } => run_progress(&config, progress_file),
        Commands::Seed { symbols, file } => run_seed(&config, symbols, file),
    }
}

/// Ranked backend list: Eastmoney, its trailing-window variant, then Tencent.
fn build_providers() -> Result<Vec<Box<dyn BarProvider>>> {
    let primary = EastmoneyProvider::new(HTTP_TIMEOUT).context("build eastmoney client")?;
    let recent_inner = EastmoneyProvider::new(HTTP_TIMEOUT).context("build eastmoney client")?;
    let recent = RecentWindowProvider::new(Box::new(recent_inner), RECENT_WINDOW_DAYS);
    let fallback = TencentProvider::new(HTTP_TIMEOUT).context("build tencent client")?;
    Ok(vec![
        Box::new(primary),
        Box::new(recent),
        Box::new(fallback),
    ])
}

fn confirm(prompt: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let answer = line.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

fn run_update(
    config: &AppConfig,
    days: i64,
    max_symbols: Option<usize>,
    no_resume: bool,
    conservative: bool,
) -> Result<()> {
    let profile = if conservative {
        Profile::Conservative
    } else {
        config.profile
    };

    let store = SqliteStore::open(&config.db_path).context("open database")?;
    if store.list_universe_symbols()?.is_empty() {
        bail!("universe is empty — add symbols with `barvault seed` first");
    }

    let pacer = RequestPacer::new(profile.pacer_config());
    let fetcher = SourceFetcher::new(build_providers()?, &pacer, profile.fetch_config());

    let batch_config = BatchConfig {
        window_days: days,
        max_symbols,
        resume: !no_resume,
        ..BatchConfig::default()
    };
    let orchestrator = BatchOrchestrator::new(&fetcher, &store, batch_config);
    let progress = orchestrator.run(&config.progress_path, &StdoutObserver)?;

    println!(
        "Network: {} ({:.0}% success rate)",
        pacer.tier().as_str(),
        pacer.success_rate() * 100.0
    );
    if !progress.failed_symbols.is_empty() {
        println!("Still failed: {}", progress.failed_symbols.join(", "));
    }
    Ok(())
}

fn run_check(config: &AppConfig, target_days: usize, output: Option<PathBuf>) -> Result<()> {
    let store = SqliteStore::open(&config.db_path).context("open database")?;
    let report = check_universe(&store, target_days, Local::now().date_naive())?;

    println!(
        "Checked {} symbols over the last {} weekdays:",
        report.total_symbols, report.target_days
    );
    println!("  complete:              {}", report.summary.complete);
    println!("  missing data:          {}", report.summary.missing_data);
    println!("  duplicate data:        {}", report.summary.duplicate_data);
    println!("  missing and duplicate: {}", report.summary.missing_and_duplicate);
    println!("  no data:               {}", report.summary.no_data);
    if report.summary.error > 0 {
        println!("  errors:                {}", report.summary.error);
    }

    let path = output.unwrap_or_else(|| config.report_path.clone());
    report.save(&path).context("write report")?;
    println!("Report saved to: {}", path.display());
    Ok(())
}

fn run_refresh(
    config: &AppConfig,
    report_file: Option<PathBuf>,
    max_symbols: Option<usize>,
    yes: bool,
) -> Result<()> {
    let path = report_file.unwrap_or_else(|| config.report_path.clone());
    let report = CompletenessReport::load(&path)
        .with_context(|| format!("load report {} (run `barvault check` first)", path.display()))?;

    let mut targets = report.incomplete_symbols();
    if let Some(cap) = max_symbols {
        targets.truncate(cap);
    }
    if targets.is_empty() {
        println!("Nothing to refresh — report shows every symbol complete.");
        return Ok(());
    }

    println!("Will delete and re-fetch {} symbols:", targets.len());
    for symbol in &targets {
        println!("  {symbol}");
    }
    if !confirm("Proceed?", yes)? {
        println!("Aborted.");
        return Ok(());
    }

    let store = SqliteStore::open(&config.db_path).context("open database")?;
    let pacer = RequestPacer::new(config.profile.pacer_config());
    let fetcher = SourceFetcher::new(build_providers()?, &pacer, config.profile.fetch_config());

    let window_days = report.target_days as i64 + 10;
    let outcome = targeted_refresh(&fetcher, &store, &report, window_days, max_symbols)?;

    println!(
        "Refresh done: {}/{} repaired",
        outcome.repaired, outcome.attempted
    );
    if !outcome.failed.is_empty() {
        println!("Failed: {}", outcome.failed.join(", "));
    }
    if outcome.stopped_early {
        println!("Stopped early: network health degraded.");
    }
    Ok(())
}

fn run_cleanup(
    config: &AppConfig,
    progress_file: Option<PathBuf>,
    target_days: usize,
    yes: bool,
) -> Result<()> {
    let path = progress_file.unwrap_or_else(|| config.progress_path.clone());
    if !confirm(
        &format!("Rewrite {} (a backup is kept)?", path.display()),
        yes,
    )? {
        println!("Aborted.");
        return Ok(());
    }

    let store = SqliteStore::open(&config.db_path).context("open database")?;
    let outcome = cleanup_failed_symbols(&path, &store, target_days, Local::now().date_naive())?;

    if let Some(backup) = &outcome.backup_path {
        println!("Backup: {}", backup.display());
    }
    println!(
        "Recovered {} symbols, {} still failed",
        outcome.recovered.len(),
        outcome.still_failed
    );
    Ok(())
}

fn run_progress(config: &AppConfig, progress_file: Option<PathBuf>) -> Result<()> {
    let path = progress_file.unwrap_or_else(|| config.progress_path.clone());
    let progress = match BatchProgress::load(&path)? {
        Some(p) => p,
        None => {
            println!("No progress file at {}", path.display());
            return Ok(());
        }
    };

    let processed = (progress.last_processed_index + 1).max(0);
    println!("Run started:  {}", progress.start_time.format("%Y-%m-%d %H:%M:%S"));
    println!("Last update:  {}", progress.last_update.format("%Y-%m-%d %H:%M:%S"));
    println!(
        "Processed:    {}/{} ({} succeeded, {} failed, {} paused)",
        processed,
        progress.total_symbols,
        progress.success_count,
        progress.failed_count,
        progress.paused_symbols.len()
    );
    println!("Rows written: {}", progress.total_records);
    if progress.network_pause_count > 0 {
        println!(
            "Network pauses: {} ({:.0}s total)",
            progress.network_pause_count, progress.total_pause_secs
        );
    }
    match &progress.summary {
        Some(summary) => println!(
            "Finished in {:.0}s (network {}, {:.0}% success rate)",
            summary.elapsed_secs,
            summary.final_tier,
            summary.final_success_rate * 100.0
        ),
        None => println!("Run not finished — `barvault update` will resume it."),
    }
    Ok(())
}

fn run_seed(config: &AppConfig, symbols: Vec<String>, file: Option<PathBuf>) -> Result<()> {
    let mut all = symbols;
    if let Some(path) = file {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("read symbol file {}", path.display()))?;
        all.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(String::from),
        );
    }
    if all.is_empty() {
        bail!("no symbols given — pass them as arguments or with --file");
    }

    let store = SqliteStore::open(&config.db_path).context("open database")?;
    let added = store.upsert_symbols(&all)?;
    println!(
        "Added {added} new symbols ({} tracked total)",
        store.list_universe_symbols()?.len()
    );
    Ok(())
}
