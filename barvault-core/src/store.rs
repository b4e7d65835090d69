//! SQLite-backed bar store.
//!
//! Two tables: `symbols` (the tracked universe) and `daily_bars`, keyed
//! unique on (symbol, date) so re-ingesting a range overwrites in place
//! instead of duplicating. Dates are stored as `%Y-%m-%d` text, which keeps
//! SQLite's lexicographic ordering identical to chronological ordering.

use chrono::{Duration as ChronoDuration, Local, NaiveDate};
use rusqlite::{params, Connection};
use std::path::Path;
use thiserror::Error;

use crate::bar::DailyBar;

const DATE_FMT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("stored date is not {DATE_FMT}: {0}")]
    MalformedDate(String),
}

/// Persistence seam for daily bars and the symbol universe.
pub trait Store {
    /// Insert-or-replace bars for one symbol. Returns the row count written.
    fn upsert_daily_rows(&self, symbol: &str, bars: &[DailyBar]) -> Result<usize, StoreError>;

    /// Most recent stored trading date for a symbol, if any.
    fn last_stored_date(&self, symbol: &str) -> Result<Option<NaiveDate>, StoreError>;

    /// All symbols in the tracked universe, sorted.
    fn list_universe_symbols(&self) -> Result<Vec<String>, StoreError>;

    /// Delete every stored bar for a symbol. Returns rows removed.
    fn delete_daily_rows(&self, symbol: &str) -> Result<usize, StoreError>;

    /// Bars for a symbol within the trailing `since_n_days` window, ascending.
    fn get_daily_rows(&self, symbol: &str, since_n_days: i64) -> Result<Vec<DailyBar>, StoreError>;

    /// Per-date row counts for a symbol, ascending by date. A count above 1
    /// indicates duplicated storage for that date.
    fn date_counts(&self, symbol: &str) -> Result<Vec<(NaiveDate, i64)>, StoreError>;

    /// Symbols that have at least one stored bar.
    fn symbols_with_data(&self) -> Result<Vec<String>, StoreError>;

    /// Add symbols to the tracked universe (existing entries untouched).
    fn upsert_symbols(&self, symbols: &[String]) -> Result<usize, StoreError>;
}

/// `Store` implementation over a single rusqlite connection.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS symbols (
                symbol TEXT PRIMARY KEY,
                added_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS daily_bars (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                date TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume INTEGER NOT NULL,
                amount REAL NOT NULL,
                turnover_rate REAL NOT NULL,
                UNIQUE(symbol, date)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_daily_symbol_date
             ON daily_bars(symbol, date)",
            [],
        )?;
        Ok(Self { conn })
    }
}

fn parse_date(text: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(text, DATE_FMT).map_err(|_| StoreError::MalformedDate(text.to_string()))
}

impl Store for SqliteStore {
    fn upsert_daily_rows(&self, symbol: &str, bars: &[DailyBar]) -> Result<usize, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR REPLACE INTO daily_bars
             (symbol, date, open, high, low, close, volume, amount, turnover_rate)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;
        for bar in bars {
            stmt.execute(params![
                symbol,
                bar.date.format(DATE_FMT).to_string(),
                bar.open,
                bar.high,
                bar.low,
                bar.close,
                bar.volume,
                bar.amount,
                bar.turnover_rate,
            ])?;
        }
        Ok(bars.len())
    }

    fn last_stored_date(&self, symbol: &str) -> Result<Option<NaiveDate>, StoreError> {
        let text: Option<String> = self
            .conn
            .query_row(
                "SELECT MAX(date) FROM daily_bars WHERE symbol = ?1",
                params![symbol],
                |row| row.get(0),
            )?;
        match text {
            Some(t) => Ok(Some(parse_date(&t)?)),
            None => Ok(None),
        }
    }

    fn list_universe_symbols(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT symbol FROM symbols ORDER BY symbol")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row?);
        }
        Ok(symbols)
    }

    fn delete_daily_rows(&self, symbol: &str) -> Result<usize, StoreError> {
        let removed = self
            .conn
            .execute("DELETE FROM daily_bars WHERE symbol = ?1", params![symbol])?;
        Ok(removed)
    }

    fn get_daily_rows(&self, symbol: &str, since_n_days: i64) -> Result<Vec<DailyBar>, StoreError> {
        let cutoff = Local::now().date_naive() - ChronoDuration::days(since_n_days);
        let mut stmt = self.conn.prepare_cached(
            "SELECT date, open, high, low, close, volume, amount, turnover_rate
             FROM daily_bars
             WHERE symbol = ?1 AND date >= ?2
             ORDER BY date ASC",
        )?;
        let rows = stmt.query_map(
            params![symbol, cutoff.format(DATE_FMT).to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, f64>(6)?,
                    row.get::<_, f64>(7)?,
                ))
            },
        )?;
        let mut bars = Vec::new();
        for row in rows {
            let (date, open, high, low, close, volume, amount, turnover_rate) = row?;
            bars.push(DailyBar {
                date: parse_date(&date)?,
                open,
                high,
                low,
                close,
                volume,
                amount,
                turnover_rate,
            });
        }
        Ok(bars)
    }

    fn date_counts(&self, symbol: &str) -> Result<Vec<(NaiveDate, i64)>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT date, COUNT(*) FROM daily_bars
             WHERE symbol = ?1 GROUP BY date ORDER BY date ASC",
        )?;
        let rows = stmt.query_map(params![symbol], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut counts = Vec::new();
        for row in rows {
            let (date, count) = row?;
            counts.push((parse_date(&date)?, count));
        }
        Ok(counts)
    }

    fn symbols_with_data(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT symbol FROM daily_bars ORDER BY symbol")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row?);
        }
        Ok(symbols)
    }

    fn upsert_symbols(&self, symbols: &[String]) -> Result<usize, StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached("INSERT OR IGNORE INTO symbols (symbol) VALUES (?1)")?;
        let mut added = 0;
        for symbol in symbols {
            added += stmt.execute(params![symbol])?;
        }
        Ok(added)
    }
}
