//! Batch orchestrator — resumable, checkpointed updates over the universe.
//!
//! Walks the symbol universe in order, fetching each symbol incrementally
//! and checkpointing progress every few symbols so an interrupted run picks
//! up where it left off. Network health is sampled periodically; a Bad tier
//! triggers a cooldown, and the pacer's pause signal aborts the pass. After
//! the main pass, symbols that failed or were paused get one more chance.

use std::io;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use barvault_core::{FetchError, NetworkTier, SourceFetcher, Store, StoreError, UpdateOutcome};

use crate::progress::{BatchProgress, RunSummary};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("progress file error: {0}")]
    Progress(#[from] io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Knobs for the batch loop. Cooldowns are configurable so tests can zero them.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Checkpoint the progress file every N symbols.
    pub checkpoint_every: usize,
    /// Sample the network tier every N symbols.
    pub tier_check_every: usize,
    /// Sleep when the sampled tier is Bad.
    pub bad_tier_cooldown: Duration,
    /// Sleep before the second pass over failed symbols.
    pub retry_cooldown: Duration,
    /// Backfill window for symbols with no stored data.
    pub window_days: i64,
    /// Cap on symbols processed this run (None = whole universe).
    pub max_symbols: Option<usize>,
    /// Resume from an existing progress file instead of starting over.
    pub resume: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            checkpoint_every: 10,
            tier_check_every: 50,
            bad_tier_cooldown: Duration::from_secs(60),
            retry_cooldown: Duration::from_secs(30),
            window_days: 60,
            max_symbols: None,
            resume: true,
        }
    }
}

/// How a single symbol came out of the update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolOutcome {
    /// Rows written (possibly zero if already current).
    Success(usize),
    Failed,
    /// Skipped or aborted because the pause signal fired.
    Paused,
}

/// Progress callback for batch runs.
pub trait BatchObserver {
    fn on_symbol_start(&self, symbol: &str, index: usize, total: usize);
    fn on_symbol_done(&self, symbol: &str, index: usize, total: usize, outcome: &SymbolOutcome);
    fn on_batch_done(&self, progress: &BatchProgress);
}

/// Prints per-symbol progress to stdout.
pub struct StdoutObserver;

impl BatchObserver for StdoutObserver {
    fn on_symbol_start(&self, symbol: &str, index: usize, total: usize) {
        println!("[{}/{}] Updating {symbol}...", index + 1, total);
    }

    fn on_symbol_done(&self, symbol: &str, _index: usize, _total: usize, outcome: &SymbolOutcome) {
        match outcome {
            SymbolOutcome::Success(n) => println!("  OK: {symbol} ({n} rows)"),
            SymbolOutcome::Failed => println!("  FAIL: {symbol}"),
            SymbolOutcome::Paused => println!("  PAUSED: {symbol}"),
        }
    }

    fn on_batch_done(&self, progress: &BatchProgress) {
        println!(
            "\nUpdate complete: {}/{} succeeded, {} failed, {} paused, {} rows",
            progress.success_count,
            progress.total_symbols,
            progress.failed_count,
            progress.paused_symbols.len(),
            progress.total_records,
        );
    }
}

/// Drives a full batch update: main pass, checkpointing, second retry pass.
pub struct BatchOrchestrator<'a> {
    fetcher: &'a SourceFetcher<'a>,
    store: &'a dyn Store,
    config: BatchConfig,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(fetcher: &'a SourceFetcher<'a>, store: &'a dyn Store, config: BatchConfig) -> Self {
        Self {
            fetcher,
            store,
            config,
        }
    }

    fn update_one(&self, symbol: &str) -> SymbolOutcome {
        match self
            .fetcher
            .update_symbol(self.store, symbol, self.config.window_days)
        {
            Ok(UpdateOutcome::Written(rows)) => SymbolOutcome::Success(rows),
            Ok(UpdateOutcome::Current) => SymbolOutcome::Success(0),
            Ok(UpdateOutcome::Empty) => {
                warn!(symbol, "no rows from any source");
                self.failed_or_paused()
            }
            Err(FetchError::Paused) => SymbolOutcome::Paused,
            Err(e) => {
                warn!(symbol, error = %e, "symbol update failed");
                self.failed_or_paused()
            }
        }
    }

    /// A zero-row symbol is "paused" rather than "failed" when the pacer's
    /// pause signal is up; both lists feed the same retry pass.
    fn failed_or_paused(&self) -> SymbolOutcome {
        if self.fetcher.pacer().should_pause() {
            SymbolOutcome::Paused
        } else {
            SymbolOutcome::Failed
        }
    }

    /// Run the batch to completion (or until the pause signal aborts it).
    ///
    /// The progress file at `progress_path` is created or resumed, updated
    /// every `checkpoint_every` symbols, and finalized with a `RunSummary`
    /// unless the pause signal aborted the pass.
    pub fn run(
        &self,
        progress_path: &Path,
        observer: &dyn BatchObserver,
    ) -> Result<BatchProgress, BatchError> {
        let universe = self.store.list_universe_symbols()?;
        let symbols: Vec<String> = match self.config.max_symbols {
            Some(cap) => universe.into_iter().take(cap).collect(),
            None => universe,
        };
        let total = symbols.len();

        let mut progress = if self.config.resume {
            match BatchProgress::load(progress_path)? {
                Some(p) if !p.is_finished() && p.total_symbols == total => {
                    info!(resume_index = p.resume_index(), "resuming previous run");
                    p
                }
                _ => BatchProgress::new(total, self.config.window_days),
            }
        } else {
            BatchProgress::new(total, self.config.window_days)
        };

        let started = Instant::now();
        let mut aborted = false;

        for (i, symbol) in symbols.iter().enumerate().skip(progress.resume_index()) {
            observer.on_symbol_start(symbol, i, total);

            let outcome = self.update_one(symbol);
            observer.on_symbol_done(symbol, i, total, &outcome);

            match &outcome {
                SymbolOutcome::Success(rows) => {
                    progress.success_count += 1;
                    progress.total_records += rows;
                }
                SymbolOutcome::Failed => {
                    progress.failed_count += 1;
                    progress.failed_symbols.push(symbol.clone());
                }
                SymbolOutcome::Paused => {
                    progress.paused_symbols.push(symbol.clone());
                }
            }
            progress.last_processed_index = i as i64;
            progress.last_update = chrono::Local::now();

            if (i + 1) % self.config.checkpoint_every == 0 {
                progress.save(progress_path)?;
            }

            if self.fetcher.pacer().should_pause() {
                warn!("pause signal fired, aborting pass");
                aborted = true;
                break;
            }

            if (i + 1) % self.config.tier_check_every == 0 {
                let tier = self.fetcher.pacer().tier();
                info!(tier = tier.as_str(), rate = self.fetcher.pacer().success_rate(), "network check");
                if tier == NetworkTier::Bad {
                    progress.network_pause_count += 1;
                    progress.total_pause_secs += self.config.bad_tier_cooldown.as_secs_f64();
                    progress.save(progress_path)?;
                    thread::sleep(self.config.bad_tier_cooldown);
                }
            }
        }

        self.retry_pass(&mut progress, observer, progress_path)?;

        // An aborted pass stays resumable: no summary means the next run
        // picks up at the checkpointed index instead of starting over.
        if !aborted {
            let pacer = self.fetcher.pacer();
            progress.summary = Some(RunSummary {
                end_time: chrono::Local::now(),
                elapsed_secs: started.elapsed().as_secs_f64(),
                final_tier: pacer.tier().as_str().to_string(),
                final_success_rate: pacer.success_rate(),
            });
        }
        progress.last_update = chrono::Local::now();
        progress.save(progress_path)?;

        observer.on_batch_done(&progress);
        Ok(progress)
    }

    /// Second chance for symbols that failed or were paused in the main pass.
    fn retry_pass(
        &self,
        progress: &mut BatchProgress,
        observer: &dyn BatchObserver,
        progress_path: &Path,
    ) -> Result<(), BatchError> {
        let mut retry: Vec<String> = progress.failed_symbols.clone();
        for s in &progress.paused_symbols {
            if !retry.contains(s) {
                retry.push(s.clone());
            }
        }
        if retry.is_empty() {
            return Ok(());
        }

        info!(count = retry.len(), "retry pass over failed symbols");
        thread::sleep(self.config.retry_cooldown);

        let total = retry.len();
        for (i, symbol) in retry.iter().enumerate() {
            observer.on_symbol_start(symbol, i, total);
            let outcome = self.update_one(symbol);
            observer.on_symbol_done(symbol, i, total, &outcome);

            if let SymbolOutcome::Success(rows) = outcome {
                if progress.failed_symbols.iter().any(|s| s == symbol) {
                    progress.failed_count = progress.failed_count.saturating_sub(1);
                }
                progress.failed_symbols.retain(|s| s != symbol);
                progress.paused_symbols.retain(|s| s != symbol);
                progress.success_count += 1;
                progress.total_records += rows;
            } else if self.fetcher.pacer().should_pause() {
                warn!("pause signal fired during retry pass, stopping");
                break;
            }
        }

        progress.last_update = chrono::Local::now();
        progress.save(progress_path)?;
        Ok(())
    }
}
