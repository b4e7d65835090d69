//! Trailing-window adapter — the second-ranked backend.
//!
//! Some upstream failures are specific to explicit historical ranges while
//! a plain "recent data" query still works. This adapter wraps another
//! provider, always requests the trailing window ending today, and filters
//! the result down to the range the caller asked for.

use chrono::{Duration as ChronoDuration, Local, NaiveDate};

use crate::bar::RawRow;
use crate::provider::{BarProvider, ProviderError};

/// Wraps a provider and substitutes a trailing-window request.
pub struct RecentWindowProvider {
    inner: Box<dyn BarProvider>,
    window_days: i64,
}

impl RecentWindowProvider {
    pub fn new(inner: Box<dyn BarProvider>, window_days: i64) -> Self {
        Self { inner, window_days }
    }
}

impl BarProvider for RecentWindowProvider {
    fn name(&self) -> &'static str {
        "recent_window"
    }

    fn fetch_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawRow>, ProviderError> {
        let today = Local::now().date_naive();
        let window_start = today - ChronoDuration::days(self.window_days);

        let rows = self.inner.fetch_range(symbol, window_start, today)?;

        Ok(rows
            .into_iter()
            .filter(|row| match row.date {
                Some(d) => d >= start && d <= end,
                None => false,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRows(Vec<RawRow>);

    impl BarProvider for FixedRows {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn fetch_range(
            &self,
            _symbol: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<RawRow>, ProviderError> {
            Ok(self.0.clone())
        }
    }

    fn row(date: NaiveDate) -> RawRow {
        RawRow {
            date: Some(date),
            close: Some(1.0),
            ..Default::default()
        }
    }

    #[test]
    fn filters_to_requested_range() {
        let today = Local::now().date_naive();
        let inner = FixedRows(vec![
            row(today - ChronoDuration::days(10)),
            row(today - ChronoDuration::days(5)),
            row(today - ChronoDuration::days(1)),
        ]);
        let provider = RecentWindowProvider::new(Box::new(inner), 30);

        let rows = provider
            .fetch_range(
                "000001",
                today - ChronoDuration::days(6),
                today - ChronoDuration::days(2),
            )
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, Some(today - ChronoDuration::days(5)));
    }

    #[test]
    fn dateless_rows_are_dropped() {
        let today = Local::now().date_naive();
        let inner = FixedRows(vec![RawRow::default(), row(today)]);
        let provider = RecentWindowProvider::new(Box::new(inner), 30);

        let rows = provider
            .fetch_range("000001", today - ChronoDuration::days(1), today)
            .unwrap();
        assert_eq!(rows.len(), 1);
    }
}
