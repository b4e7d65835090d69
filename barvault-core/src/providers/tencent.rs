//! Tencent day-kline adapter — the last-ranked backend.
//!
//! The gtimg response nests rows under a per-symbol key and uses positional
//! JSON arrays of strings (`[date, open, close, high, low, volume, ...]`).
//! Rows carry no amount or turnover; those stay `None`.

use std::time::Duration;

use chrono::NaiveDate;
use serde_json::Value;

use crate::bar::RawRow;
use crate::provider::{BarProvider, ProviderError};

const SOURCE: &str = "tencent";

/// Tencent gtimg forward-adjusted kline provider.
pub struct TencentProvider {
    client: reqwest::blocking::Client,
}

impl TencentProvider {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| ProviderError::Other(format!("build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Exchange-prefixed code: `sh600000`, `sz000001`.
    fn market_code(symbol: &str) -> String {
        if symbol.starts_with("60") || symbol.starts_with("68") {
            format!("sh{symbol}")
        } else {
            format!("sz{symbol}")
        }
    }

    fn kline_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "https://web.ifzq.gtimg.cn/appstock/app/fqkline/get\
             ?param={},day,{},{},640,qfq",
            Self::market_code(symbol),
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d"),
        )
    }

    fn parse_row(row: &Value) -> RawRow {
        let field = |i: usize| row.get(i).and_then(Value::as_str);
        let num = |i: usize| -> Option<f64> { field(i).and_then(|s| s.parse().ok()) };
        RawRow {
            date: field(0).and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()),
            open: num(1),
            close: num(2),
            high: num(3),
            low: num(4),
            volume: num(5).map(|v| v as i64),
            amount: None,
            turnover_rate: None,
        }
    }

    fn parse_response(symbol: &str, body: &Value) -> Result<Vec<RawRow>, ProviderError> {
        let code = Self::market_code(symbol);
        let per_symbol = body
            .get("data")
            .and_then(|d| d.get(&code))
            .ok_or_else(|| ProviderError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?;

        // Forward-adjusted series when available, raw otherwise.
        let rows = per_symbol
            .get("qfqday")
            .or_else(|| per_symbol.get("day"))
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ProviderError::ResponseFormatChanged(format!("{SOURCE}: no kline array for {code}"))
            })?;

        Ok(rows.iter().map(Self::parse_row).collect())
    }
}

impl BarProvider for TencentProvider {
    fn name(&self) -> &'static str {
        SOURCE
    }

    fn fetch_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawRow>, ProviderError> {
        let url = Self::kline_url(symbol, start, end);

        let resp = self.client.get(&url).send().map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else {
                ProviderError::NetworkUnreachable(e.to_string())
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::HttpStatus {
                backend: SOURCE,
                status: status.as_u16(),
                symbol: symbol.to_string(),
            });
        }

        let body: Value = resp.json().map_err(|e| {
            ProviderError::ResponseFormatChanged(format!("{SOURCE} response for {symbol}: {e}"))
        })?;

        Self::parse_response(symbol, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn market_code_prefixes() {
        assert_eq!(TencentProvider::market_code("600000"), "sh600000");
        assert_eq!(TencentProvider::market_code("000001"), "sz000001");
    }

    #[test]
    fn parses_qfq_rows() {
        let body = json!({
            "data": {
                "sz000001": {
                    "qfqday": [
                        ["2024-01-02", "9.39", "9.31", "9.42", "9.26", "1234567"],
                        ["2024-01-03", "9.31", "9.28", "9.35", "9.20", "1100000"]
                    ]
                }
            }
        });
        let rows = TencentProvider::parse_response("000001", &body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(rows[0].close, Some(9.31));
        assert_eq!(rows[0].amount, None);
    }

    #[test]
    fn missing_symbol_key_is_not_found() {
        let body = json!({ "data": {} });
        let err = TencentProvider::parse_response("000001", &body).unwrap_err();
        assert!(matches!(err, ProviderError::SymbolNotFound { .. }));
    }

    #[test]
    fn falls_back_to_raw_day_series() {
        let body = json!({
            "data": {
                "sz000001": {
                    "day": [["2024-01-02", "9.39", "9.31", "9.42", "9.26", "1"]]
                }
            }
        });
        let rows = TencentProvider::parse_response("000001", &body).unwrap();
        assert_eq!(rows.len(), 1);
    }
}
