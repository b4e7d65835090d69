//! Completeness auditing — compare stored bars against a weekday calendar.
//!
//! The expected calendar is the most recent `target_days` weekdays ending
//! yesterday (today's bar may not exist until the session closes). Holidays
//! are not modeled, so a handful of "missing" weekdays is normal; the report
//! is a triage tool, not an exact exchange calendar.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Datelike, Duration as ChronoDuration, Local, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use tracing::warn;

use barvault_core::Store;

pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Extra days scanned beyond the target so weekends don't starve the window.
const LOOKBACK_BUFFER_DAYS: i64 = 20;

/// Completeness classification for one symbol, worst condition first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletenessStatus {
    Complete,
    MissingData,
    DuplicateData,
    MissingAndDuplicate,
    NoData,
    /// The store could not be queried for this symbol.
    Error,
}

/// Per-symbol audit outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletenessResult {
    pub symbol: String,
    pub status: CompletenessStatus,
    pub total_records: usize,
    pub expected_records: usize,
    /// Expected weekdays with no stored bar, most recent first.
    pub missing_days: Vec<NaiveDate>,
    /// Dates stored more than once.
    pub duplicate_days: Vec<NaiveDate>,
    pub completeness_rate: f64,
}

impl CompletenessResult {
    /// Strict predicate: every expected day present, none duplicated.
    pub fn is_fully_complete(&self) -> bool {
        self.status == CompletenessStatus::Complete
    }
}

/// Counts per status across a universe audit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusCounts {
    pub complete: usize,
    pub missing_data: usize,
    pub duplicate_data: usize,
    pub missing_and_duplicate: usize,
    pub no_data: usize,
    pub error: usize,
}

impl StatusCounts {
    fn bump(&mut self, status: CompletenessStatus) {
        match status {
            CompletenessStatus::Complete => self.complete += 1,
            CompletenessStatus::MissingData => self.missing_data += 1,
            CompletenessStatus::DuplicateData => self.duplicate_data += 1,
            CompletenessStatus::MissingAndDuplicate => self.missing_and_duplicate += 1,
            CompletenessStatus::NoData => self.no_data += 1,
            CompletenessStatus::Error => self.error += 1,
        }
    }
}

/// Universe-wide completeness report, persisted as versioned JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletenessReport {
    pub schema_version: u32,
    pub check_time: DateTime<Local>,
    pub target_days: usize,
    pub total_symbols: usize,
    pub summary: StatusCounts,
    /// Symbol -> missing dates, only for symbols that have any.
    pub missing: BTreeMap<String, Vec<NaiveDate>>,
    /// Symbol -> duplicated dates, only for symbols that have any.
    pub duplicates: BTreeMap<String, Vec<NaiveDate>>,
    pub results: Vec<CompletenessResult>,
}

impl CompletenessReport {
    /// Symbols needing repair: everything except Complete and Error.
    pub fn incomplete_symbols(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| {
                !matches!(
                    r.status,
                    CompletenessStatus::Complete | CompletenessStatus::Error
                )
            })
            .map(|r| r.symbol.clone())
            .collect()
    }

    /// Save atomically: write to `.tmp`, then rename into place.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            e
        })
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        let report: Self = serde_json::from_str(&content)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if report.schema_version != REPORT_SCHEMA_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "report schema version {} (expected {})",
                    report.schema_version, REPORT_SCHEMA_VERSION
                ),
            ));
        }
        Ok(report)
    }
}

fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The most recent `target_days` weekdays ending yesterday, ascending.
pub fn expected_calendar(target_days: usize, today: NaiveDate) -> Vec<NaiveDate> {
    let end = today - ChronoDuration::days(1);
    // 7 calendar days hold 5 weekdays, so scale before adding the buffer.
    let lookback = (target_days as i64 * 7) / 5 + LOOKBACK_BUFFER_DAYS;
    let start = end - ChronoDuration::days(lookback);

    let mut days: Vec<NaiveDate> = (0..=lookback)
        .map(|offset| start + ChronoDuration::days(offset))
        .filter(|d| is_weekday(*d))
        .collect();

    if days.len() > target_days {
        days.drain(..days.len() - target_days);
    }
    days
}

/// Audit one symbol against the expected calendar.
pub fn check_symbol(
    store: &dyn Store,
    symbol: &str,
    target_days: usize,
    today: NaiveDate,
) -> CompletenessResult {
    let calendar = expected_calendar(target_days, today);
    let expected_records = calendar.len();

    let counts = match store.date_counts(symbol) {
        Ok(c) => c,
        Err(e) => {
            warn!(symbol, error = %e, "completeness query failed");
            return CompletenessResult {
                symbol: symbol.to_string(),
                status: CompletenessStatus::Error,
                total_records: 0,
                expected_records,
                missing_days: Vec::new(),
                duplicate_days: Vec::new(),
                completeness_rate: 0.0,
            };
        }
    };

    let window_start = calendar.first().copied();
    let in_window = |d: &NaiveDate| window_start.map_or(false, |start| *d >= start);

    let total_records: usize = counts
        .iter()
        .filter(|(d, _)| in_window(d))
        .map(|(_, c)| *c as usize)
        .sum();
    let stored: Vec<NaiveDate> = counts.iter().map(|(d, _)| *d).collect();
    let duplicate_days: Vec<NaiveDate> = counts
        .iter()
        .filter(|(d, c)| in_window(d) && *c > 1)
        .map(|(d, _)| *d)
        .collect();

    let mut missing_days: Vec<NaiveDate> = calendar
        .iter()
        .filter(|d| !stored.contains(d))
        .copied()
        .collect();
    missing_days.sort_unstable_by(|a, b| b.cmp(a));

    let status = if total_records == 0 {
        CompletenessStatus::NoData
    } else if !missing_days.is_empty() && !duplicate_days.is_empty() {
        CompletenessStatus::MissingAndDuplicate
    } else if !missing_days.is_empty() {
        CompletenessStatus::MissingData
    } else if !duplicate_days.is_empty() {
        CompletenessStatus::DuplicateData
    } else {
        CompletenessStatus::Complete
    };

    let completeness_rate = if expected_records == 0 {
        1.0
    } else {
        (expected_records - missing_days.len()) as f64 / expected_records as f64
    };

    CompletenessResult {
        symbol: symbol.to_string(),
        status,
        total_records,
        expected_records,
        missing_days,
        duplicate_days,
        completeness_rate,
    }
}

/// Audit the whole tracked universe.
pub fn check_universe(
    store: &dyn Store,
    target_days: usize,
    today: NaiveDate,
) -> Result<CompletenessReport, barvault_core::StoreError> {
    let symbols = store.list_universe_symbols()?;

    let mut summary = StatusCounts::default();
    let mut missing = BTreeMap::new();
    let mut duplicates = BTreeMap::new();
    let mut results = Vec::with_capacity(symbols.len());

    for symbol in &symbols {
        let result = check_symbol(store, symbol, target_days, today);
        summary.bump(result.status);
        if !result.missing_days.is_empty() {
            missing.insert(symbol.clone(), result.missing_days.clone());
        }
        if !result.duplicate_days.is_empty() {
            duplicates.insert(symbol.clone(), result.duplicate_days.clone());
        }
        results.push(result);
    }

    Ok(CompletenessReport {
        schema_version: REPORT_SCHEMA_VERSION,
        check_time: Local::now(),
        target_days,
        total_symbols: symbols.len(),
        summary,
        missing,
        duplicates,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use barvault_core::{DailyBar, SqliteStore, StoreError};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn bar(date: NaiveDate) -> DailyBar {
        DailyBar {
            date,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 1,
            amount: 1.0,
            turnover_rate: 0.0,
        }
    }

    // 2024-03-15 is a Friday.
    const TODAY: (i32, u32, u32) = (2024, 3, 15);

    fn today() -> NaiveDate {
        d(TODAY.0, TODAY.1, TODAY.2)
    }

    #[test]
    fn calendar_ends_yesterday_and_skips_weekends() {
        let days = expected_calendar(5, today());
        assert_eq!(days.len(), 5);
        assert_eq!(*days.last().unwrap(), d(2024, 3, 14));
        assert!(days.iter().all(|day| is_weekday(*day)));
        // 5 weekdays back from Thursday the 14th reaches Friday the 8th.
        assert_eq!(days[0], d(2024, 3, 8));
    }

    #[test]
    fn calendar_always_reaches_the_target_length() {
        for target in [5, 30, 60, 120] {
            assert_eq!(expected_calendar(target, today()).len(), target);
        }
    }

    #[test]
    fn calendar_is_ascending() {
        let days = expected_calendar(10, today());
        let mut sorted = days.clone();
        sorted.sort_unstable();
        assert_eq!(days, sorted);
    }

    fn seeded_store(dates: &[NaiveDate]) -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        let bars: Vec<DailyBar> = dates.iter().map(|d| bar(*d)).collect();
        store.upsert_daily_rows("000001", &bars).unwrap();
        store
    }

    #[test]
    fn complete_symbol_has_no_findings() {
        let calendar = expected_calendar(5, today());
        let store = seeded_store(&calendar);

        let result = check_symbol(&store, "000001", 5, today());
        assert_eq!(result.status, CompletenessStatus::Complete);
        assert!(result.is_fully_complete());
        assert_eq!(result.completeness_rate, 1.0);
        assert_eq!(result.total_records, 5);
    }

    #[test]
    fn missing_days_are_reported_most_recent_first() {
        let calendar = expected_calendar(5, today());
        // Drop the two most recent expected days.
        let store = seeded_store(&calendar[..3]);

        let result = check_symbol(&store, "000001", 5, today());
        assert_eq!(result.status, CompletenessStatus::MissingData);
        assert_eq!(result.missing_days.len(), 2);
        assert!(result.missing_days[0] > result.missing_days[1]);
        assert!((result.completeness_rate - 0.6).abs() < 1e-9);
    }

    /// Store with canned per-date counts. The SQLite schema's unique index
    /// cannot hold a duplicated date, so duplicate statuses need a stand-in.
    struct CountedStore {
        counts: Vec<(NaiveDate, i64)>,
    }

    impl Store for CountedStore {
        fn upsert_daily_rows(&self, _: &str, _: &[DailyBar]) -> Result<usize, StoreError> {
            Ok(0)
        }
        fn last_stored_date(&self, _: &str) -> Result<Option<NaiveDate>, StoreError> {
            Ok(None)
        }
        fn list_universe_symbols(&self) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }
        fn delete_daily_rows(&self, _: &str) -> Result<usize, StoreError> {
            Ok(0)
        }
        fn get_daily_rows(&self, _: &str, _: i64) -> Result<Vec<DailyBar>, StoreError> {
            Ok(Vec::new())
        }
        fn date_counts(&self, _: &str) -> Result<Vec<(NaiveDate, i64)>, StoreError> {
            Ok(self.counts.clone())
        }
        fn symbols_with_data(&self) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }
        fn upsert_symbols(&self, _: &[String]) -> Result<usize, StoreError> {
            Ok(0)
        }
    }

    #[test]
    fn duplicated_dates_are_flagged() {
        let calendar = expected_calendar(5, today());
        let mut counts: Vec<(NaiveDate, i64)> = calendar.iter().map(|d| (*d, 1)).collect();
        counts[2].1 = 2;
        let store = CountedStore { counts };

        let result = check_symbol(&store, "000001", 5, today());
        assert_eq!(result.status, CompletenessStatus::DuplicateData);
        assert_eq!(result.duplicate_days, vec![calendar[2]]);
        assert_eq!(result.total_records, 6);
        // Nothing is missing, so the rate stays at 1.0.
        assert_eq!(result.completeness_rate, 1.0);
        assert!(!result.is_fully_complete());
    }

    #[test]
    fn missing_plus_duplicate_is_the_combined_status() {
        let calendar = expected_calendar(5, today());
        let mut counts: Vec<(NaiveDate, i64)> = calendar.iter().map(|d| (*d, 1)).collect();
        // Most recent expected day absent, oldest stored three times.
        counts.remove(4);
        counts[0].1 = 3;
        let store = CountedStore { counts };

        let result = check_symbol(&store, "000001", 5, today());
        assert_eq!(result.status, CompletenessStatus::MissingAndDuplicate);
        assert_eq!(result.missing_days, vec![calendar[4]]);
        assert_eq!(result.duplicate_days, vec![calendar[0]]);
        assert!((result.completeness_rate - 0.8).abs() < 1e-9);
    }

    #[test]
    fn empty_symbol_is_no_data() {
        let store = SqliteStore::open_in_memory().unwrap();
        let result = check_symbol(&store, "000001", 5, today());
        assert_eq!(result.status, CompletenessStatus::NoData);
        assert_eq!(result.total_records, 0);
    }

    #[test]
    fn universe_report_counts_statuses() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_symbols(&["000001".into(), "600000".into()])
            .unwrap();
        let calendar = expected_calendar(5, today());
        let bars: Vec<DailyBar> = calendar.iter().map(|d| bar(*d)).collect();
        store.upsert_daily_rows("000001", &bars).unwrap();

        let report = check_universe(&store, 5, today()).unwrap();
        assert_eq!(report.total_symbols, 2);
        assert_eq!(report.summary.complete, 1);
        assert_eq!(report.summary.no_data, 1);
        assert_eq!(report.incomplete_symbols(), vec!["600000"]);
    }

    #[test]
    fn report_roundtrips_through_disk() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert_symbols(&["000001".into()]).unwrap();
        let report = check_universe(&store, 5, today()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        report.save(&path).unwrap();

        let loaded = CompletenessReport::load(&path).unwrap();
        assert_eq!(loaded.total_symbols, 1);
        assert_eq!(loaded.target_days, 5);
        assert!(!path.with_extension("json.tmp").exists());
    }
}
