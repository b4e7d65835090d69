//! Multi-source fetching with retries, fallback, and range segmentation.
//!
//! A `SourceFetcher` owns a ranked list of backend adapters. Each fetch
//! attempt walks the ranking and takes the first non-empty result; transient
//! errors consume an attempt and get a growing retry delay, while permanent
//! errors (delisted symbol, 404) stop immediately. Large date ranges are
//! split so no single upstream request covers more than `segment_days`.

use std::thread;
use std::time::Instant;

use chrono::{Duration as ChronoDuration, Local, NaiveDate};
use thiserror::Error;
use tracing::{debug, warn};

use crate::bar::{normalize_rows, DailyBar, RawRow};
use crate::pacer::RequestPacer;
use crate::provider::{BarProvider, ProviderError};
use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum FetchError {
    /// The pacer's pause signal fired; the caller should stop and cool down.
    #[error("fetching paused: network health degraded")]
    Paused,

    /// The symbol can never be fetched (delisted, unknown, 404).
    #[error("permanent failure for symbol: {0}")]
    Permanent(ProviderError),

    /// Every attempt against every source failed transiently.
    #[error("all sources failed after retries: {0}")]
    Exhausted(ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Knobs for the fetch state machine.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Attempts per symbol before giving up (each attempt walks all sources).
    pub max_attempts: u32,
    /// Ranges longer than this many days are split into sub-requests.
    pub segment_days: i64,
}

impl FetchConfig {
    pub fn standard() -> Self {
        Self {
            max_attempts: 3,
            segment_days: 30,
        }
    }

    pub fn conservative() -> Self {
        Self {
            max_attempts: 2,
            segment_days: 15,
        }
    }
}

/// Result of an incremental per-symbol update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The store already held the latest day; no request was made.
    Current,
    /// Rows fetched and written.
    Written(usize),
    /// Every source answered but had no rows for the range.
    Empty,
}

impl UpdateOutcome {
    pub fn rows_written(&self) -> usize {
        match self {
            UpdateOutcome::Written(n) => *n,
            _ => 0,
        }
    }
}

/// Fetches daily bars through a ranked provider list, pacing every request.
pub struct SourceFetcher<'a> {
    providers: Vec<Box<dyn BarProvider>>,
    pacer: &'a RequestPacer,
    config: FetchConfig,
}

impl<'a> SourceFetcher<'a> {
    pub fn new(
        providers: Vec<Box<dyn BarProvider>>,
        pacer: &'a RequestPacer,
        config: FetchConfig,
    ) -> Self {
        Self {
            providers,
            pacer,
            config,
        }
    }

    pub fn pacer(&self) -> &RequestPacer {
        self.pacer
    }

    /// Walk the provider ranking once. First non-empty result wins; empty
    /// results fall through to the next source. If every source errors or
    /// comes back empty and at least one erred, the last error is returned.
    fn try_sources(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawRow>, ProviderError> {
        let mut last_err: Option<ProviderError> = None;

        for provider in &self.providers {
            match provider.fetch_range(symbol, start, end) {
                Ok(rows) if !rows.is_empty() => {
                    debug!(symbol, source = provider.name(), rows = rows.len(), "fetched");
                    return Ok(rows);
                }
                Ok(_) => {
                    debug!(symbol, source = provider.name(), "empty result, trying next source");
                }
                Err(e) if e.is_permanent() => {
                    return Err(e);
                }
                Err(e) => {
                    warn!(symbol, source = provider.name(), error = %e, "source failed");
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) => Err(e),
            None => Ok(Vec::new()),
        }
    }

    /// Fetch one range with the full retry state machine.
    ///
    /// An empty result from every source is a definitive answer (no bars in
    /// that range) and is returned as `Ok(vec![])` without burning retries.
    pub fn fetch_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>, FetchError> {
        let mut last_err: Option<ProviderError> = None;

        for attempt in 0..self.config.max_attempts {
            if self.pacer.should_pause() {
                return Err(FetchError::Paused);
            }

            thread::sleep(self.pacer.delay(attempt > 0, attempt));

            let started = Instant::now();
            match self.try_sources(symbol, start, end) {
                Ok(rows) if !rows.is_empty() => {
                    self.pacer.record(true, started.elapsed());
                    return Ok(normalize_rows(rows));
                }
                Ok(_) => {
                    self.pacer.record(false, started.elapsed());
                    return Ok(Vec::new());
                }
                Err(e) => {
                    self.pacer.record(false, started.elapsed());
                    if e.is_permanent() {
                        return Err(FetchError::Permanent(e));
                    }
                    warn!(symbol, attempt, error = %e, "attempt failed, will retry");
                    last_err = Some(e);
                }
            }
        }

        Err(FetchError::Exhausted(last_err.unwrap_or_else(|| {
            ProviderError::Other("no sources configured".into())
        })))
    }

    /// Fetch a range, splitting it when it exceeds the segment limit.
    ///
    /// Segments are concatenated as returned: the store's (symbol, date) key
    /// absorbs any overlap between them.
    pub fn fetch_window(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>, FetchError> {
        let span = (end - start).num_days();
        if span <= self.config.segment_days {
            return self.fetch_history(symbol, start, end);
        }

        let mid = start + ChronoDuration::days(self.config.segment_days);
        debug!(symbol, %start, %mid, %end, "splitting range");

        let mut bars = self.fetch_history(symbol, start, mid)?;
        thread::sleep(self.pacer.delay(false, 0));
        bars.extend(self.fetch_history(symbol, mid + ChronoDuration::days(1), end)?);
        Ok(bars)
    }

    /// Incremental update for one symbol: fetch only what the store lacks.
    ///
    /// Starts the day after the last stored bar, or `window_days` back when
    /// the symbol has no data yet. An already-current symbol short-circuits
    /// without touching the network.
    pub fn update_symbol(
        &self,
        store: &dyn Store,
        symbol: &str,
        window_days: i64,
    ) -> Result<UpdateOutcome, FetchError> {
        let end = Local::now().date_naive();
        let start = match store.last_stored_date(symbol)? {
            Some(last) => last + ChronoDuration::days(1),
            None => end - ChronoDuration::days(window_days),
        };

        if start >= end {
            debug!(symbol, "already current");
            return Ok(UpdateOutcome::Current);
        }

        let bars = self.fetch_window(symbol, start, end)?;
        if bars.is_empty() {
            return Ok(UpdateOutcome::Empty);
        }
        let written = store.upsert_daily_rows(symbol, &bars)?;
        Ok(UpdateOutcome::Written(written))
    }
}
