//! Daily OHLCV bar types and raw-row normalization.
//!
//! Backend adapters return loosely-typed `RawRow`s (any field may be absent
//! or unparseable upstream). Normalization coerces them into `DailyBar`s:
//! rows missing a date or close are dropped, remaining numeric fields get
//! defaults, and the result is sorted ascending by date.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One validated daily bar for a single symbol.
///
/// Unique per (symbol, date) in the store; later writes overwrite by key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub amount: f64,
    pub turnover_rate: f64,
}

/// A row as returned by a backend adapter, before validation.
#[derive(Debug, Clone, Default)]
pub struct RawRow {
    pub date: Option<NaiveDate>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<i64>,
    pub amount: Option<f64>,
    pub turnover_rate: Option<f64>,
}

/// Normalize adapter rows into clean bars.
///
/// Drops rows without a date or close (the two fields every downstream
/// consumer requires), fills remaining gaps from the close, and sorts
/// ascending by date. The store's (symbol, date) uniqueness key relies on
/// dates being canonical `NaiveDate`s from this point on.
pub fn normalize_rows(rows: Vec<RawRow>) -> Vec<DailyBar> {
    let mut bars: Vec<DailyBar> = rows
        .into_iter()
        .filter_map(|row| {
            let date = row.date?;
            let close = row.close?;
            Some(DailyBar {
                date,
                open: row.open.unwrap_or(close),
                high: row.high.unwrap_or(close),
                low: row.low.unwrap_or(close),
                close,
                volume: row.volume.unwrap_or(0),
                amount: row.amount.unwrap_or(0.0),
                turnover_rate: row.turnover_rate.unwrap_or(0.0),
            })
        })
        .collect();

    bars.sort_by_key(|b| b.date);
    bars
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn drops_rows_without_date_or_close() {
        let rows = vec![
            RawRow {
                date: Some(d(2024, 1, 2)),
                close: Some(10.0),
                ..Default::default()
            },
            RawRow {
                date: None,
                close: Some(11.0),
                ..Default::default()
            },
            RawRow {
                date: Some(d(2024, 1, 3)),
                close: None,
                ..Default::default()
            },
        ];

        let bars = normalize_rows(rows);
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].date, d(2024, 1, 2));
    }

    #[test]
    fn sorts_ascending_by_date() {
        let rows = vec![
            RawRow {
                date: Some(d(2024, 1, 5)),
                close: Some(3.0),
                ..Default::default()
            },
            RawRow {
                date: Some(d(2024, 1, 3)),
                close: Some(1.0),
                ..Default::default()
            },
            RawRow {
                date: Some(d(2024, 1, 4)),
                close: Some(2.0),
                ..Default::default()
            },
        ];

        let bars = normalize_rows(rows);
        let dates: Vec<NaiveDate> = bars.iter().map(|b| b.date).collect();
        assert_eq!(dates, vec![d(2024, 1, 3), d(2024, 1, 4), d(2024, 1, 5)]);
    }

    #[test]
    fn missing_ohlc_fields_fall_back_to_close() {
        let rows = vec![RawRow {
            date: Some(d(2024, 1, 2)),
            close: Some(10.5),
            volume: Some(9000),
            ..Default::default()
        }];

        let bars = normalize_rows(rows);
        assert_eq!(bars[0].open, 10.5);
        assert_eq!(bars[0].high, 10.5);
        assert_eq!(bars[0].low, 10.5);
        assert_eq!(bars[0].volume, 9000);
        assert_eq!(bars[0].amount, 0.0);
    }
}
