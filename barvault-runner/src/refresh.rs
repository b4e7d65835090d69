//! Repair operations: targeted re-fetch of incomplete symbols and
//! cleanup of stale failure lists in a progress file.

use std::io;
use std::path::Path;

use chrono::{Local, NaiveDate};
use tracing::{info, warn};

use barvault_core::{FetchError, SourceFetcher, Store, UpdateOutcome};

use crate::audit::{check_symbol, CompletenessReport};
use crate::batch::BatchError;
use crate::progress::BatchProgress;

/// Result of a targeted refresh pass.
#[derive(Debug, Clone, Default)]
pub struct RefreshOutcome {
    pub attempted: usize,
    pub repaired: usize,
    pub failed: Vec<String>,
    /// True when the pause signal cut the pass short.
    pub stopped_early: bool,
}

/// Re-fetch the symbols a completeness report flagged as incomplete.
///
/// Each symbol's stored rows are deleted first so duplicates cannot
/// survive, then the full window is fetched fresh. Stops early if the
/// pacer's pause signal fires.
pub fn targeted_refresh(
    fetcher: &SourceFetcher,
    store: &dyn Store,
    report: &CompletenessReport,
    window_days: i64,
    max_symbols: Option<usize>,
) -> Result<RefreshOutcome, BatchError> {
    let mut symbols = report.incomplete_symbols();
    if let Some(cap) = max_symbols {
        symbols.truncate(cap);
    }

    let mut outcome = RefreshOutcome::default();

    for symbol in &symbols {
        if fetcher.pacer().should_pause() {
            warn!("pause signal fired, stopping refresh");
            outcome.stopped_early = true;
            break;
        }

        outcome.attempted += 1;
        store.delete_daily_rows(symbol)?;

        match fetcher.update_symbol(store, symbol, window_days) {
            Ok(UpdateOutcome::Written(rows)) => {
                info!(symbol, rows, "refreshed");
                outcome.repaired += 1;
            }
            Ok(_) => {
                warn!(symbol, "refresh returned no rows");
                outcome.failed.push(symbol.clone());
            }
            Err(FetchError::Paused) => {
                outcome.failed.push(symbol.clone());
                outcome.stopped_early = true;
                break;
            }
            Err(e) => {
                warn!(symbol, error = %e, "refresh failed");
                outcome.failed.push(symbol.clone());
            }
        }
    }

    Ok(outcome)
}

/// Result of a failure-list cleanup.
#[derive(Debug, Clone, Default)]
pub struct CleanupOutcome {
    pub backup_path: Option<std::path::PathBuf>,
    /// Symbols demoted from the failure list because the store now has
    /// complete data for them.
    pub recovered: Vec<String>,
    pub still_failed: usize,
}

/// Drop symbols from a progress file's failure list when the store already
/// holds complete data for them. The original file is backed up first.
pub fn cleanup_failed_symbols(
    progress_path: &Path,
    store: &dyn Store,
    target_days: usize,
    today: NaiveDate,
) -> Result<CleanupOutcome, BatchError> {
    let mut progress = match BatchProgress::load(progress_path)? {
        Some(p) => p,
        None => {
            return Err(BatchError::Progress(io::Error::new(
                io::ErrorKind::NotFound,
                "no progress file to clean up",
            )))
        }
    };

    if progress.failed_symbols.is_empty() {
        return Ok(CleanupOutcome::default());
    }

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let backup = progress_path.with_file_name(format!(
        "{}.backup_{timestamp}",
        progress_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "progress.json".to_string()),
    ));
    std::fs::copy(progress_path, &backup).map_err(BatchError::Progress)?;

    let mut recovered = Vec::new();
    progress.failed_symbols.retain(|symbol| {
        let result = check_symbol(store, symbol, target_days, today);
        if result.is_fully_complete() {
            recovered.push(symbol.clone());
            false
        } else {
            true
        }
    });

    progress.failed_count = progress.failed_symbols.len();
    progress.success_count += recovered.len();
    progress.last_update = Local::now();
    progress.save(progress_path)?;

    info!(
        recovered = recovered.len(),
        still_failed = progress.failed_symbols.len(),
        "cleanup complete"
    );

    Ok(CleanupOutcome {
        backup_path: Some(backup),
        recovered,
        still_failed: progress.failed_symbols.len(),
    })
}
