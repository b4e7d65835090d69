//! Eastmoney daily-kline adapter — the primary backend.
//!
//! Fetches forward-adjusted daily klines from the push2his endpoint. Rows
//! arrive as comma-joined strings
//! (`date,open,close,high,low,volume,amount,amplitude,pct,chg,turnover`);
//! unparseable fields become `None` and are resolved by normalization.

use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::bar::RawRow;
use crate::provider::{BarProvider, ProviderError};

const SOURCE: &str = "eastmoney";

#[derive(Debug, Deserialize)]
struct KlineResponse {
    data: Option<KlineData>,
}

#[derive(Debug, Deserialize)]
struct KlineData {
    #[serde(default)]
    klines: Vec<String>,
}

/// Eastmoney push2his kline provider.
pub struct EastmoneyProvider {
    client: reqwest::blocking::Client,
}

impl EastmoneyProvider {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| ProviderError::Other(format!("build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Market-prefixed security id: Shanghai listings (60/68) are market 1,
    /// everything else market 0.
    fn secid(symbol: &str) -> String {
        if symbol.starts_with("60") || symbol.starts_with("68") {
            format!("1.{symbol}")
        } else {
            format!("0.{symbol}")
        }
    }

    fn kline_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "https://push2his.eastmoney.com/api/qt/stock/kline/get\
             ?secid={}&fields1=f1,f2,f3,f4,f5,f6\
             &fields2=f51,f52,f53,f54,f55,f56,f57,f58,f59,f60,f61\
             &klt=101&fqt=1&beg={}&end={}",
            Self::secid(symbol),
            start.format("%Y%m%d"),
            end.format("%Y%m%d"),
        )
    }

    /// Parse one comma-joined kline row. Field order is fixed by the
    /// `fields2` request parameter.
    fn parse_kline(line: &str) -> RawRow {
        let fields: Vec<&str> = line.split(',').collect();
        let num = |i: usize| -> Option<f64> { fields.get(i).and_then(|s| s.parse().ok()) };
        RawRow {
            date: fields
                .first()
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()),
            open: num(1),
            close: num(2),
            high: num(3),
            low: num(4),
            volume: num(5).map(|v| v as i64),
            amount: num(6),
            turnover_rate: num(10),
        }
    }

    fn parse_response(symbol: &str, resp: KlineResponse) -> Result<Vec<RawRow>, ProviderError> {
        let data = resp.data.ok_or_else(|| ProviderError::SymbolNotFound {
            symbol: symbol.to_string(),
        })?;
        Ok(data
            .klines
            .iter()
            .map(|line| Self::parse_kline(line))
            .collect())
    }
}

impl BarProvider for EastmoneyProvider {
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
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited(format!("{SOURCE}: {status}")));
        }
        if !status.is_success() {
            return Err(ProviderError::HttpStatus {
                backend: SOURCE,
                status: status.as_u16(),
                symbol: symbol.to_string(),
            });
        }

        let parsed: KlineResponse = resp.json().map_err(|e| {
            ProviderError::ResponseFormatChanged(format!("{SOURCE} response for {symbol}: {e}"))
        })?;

        Self::parse_response(symbol, parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secid_picks_market_prefix() {
        assert_eq!(EastmoneyProvider::secid("600000"), "1.600000");
        assert_eq!(EastmoneyProvider::secid("688001"), "1.688001");
        assert_eq!(EastmoneyProvider::secid("000001"), "0.000001");
        assert_eq!(EastmoneyProvider::secid("300750"), "0.300750");
    }

    #[test]
    fn parses_kline_row() {
        let row = EastmoneyProvider::parse_kline(
            "2024-01-02,9.39,9.31,9.42,9.26,1234567,1151408291.00,1.70,-1.17,-0.11,0.63",
        );
        assert_eq!(row.date, NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(row.open, Some(9.39));
        assert_eq!(row.close, Some(9.31));
        assert_eq!(row.high, Some(9.42));
        assert_eq!(row.low, Some(9.26));
        assert_eq!(row.volume, Some(1234567));
        assert_eq!(row.amount, Some(1151408291.00));
        assert_eq!(row.turnover_rate, Some(0.63));
    }

    #[test]
    fn malformed_fields_become_none() {
        let row = EastmoneyProvider::parse_kline("2024-01-02,-,9.31");
        assert_eq!(row.open, None);
        assert_eq!(row.close, Some(9.31));
        assert_eq!(row.volume, None);
    }

    #[test]
    fn null_data_maps_to_symbol_not_found() {
        let resp: KlineResponse = serde_json::from_str(r#"{"rc":0,"data":null}"#).unwrap();
        let err = EastmoneyProvider::parse_response("999999", resp).unwrap_err();
        assert!(matches!(err, ProviderError::SymbolNotFound { .. }));
        assert!(err.is_permanent());
    }

    #[test]
    fn parses_full_response() {
        let json = r#"{
            "rc": 0,
            "data": {
                "code": "000001",
                "klines": [
                    "2024-01-02,9.39,9.31,9.42,9.26,1000,100.0,1.7,-1.1,-0.1,0.63",
                    "2024-01-03,9.31,9.28,9.35,9.20,1100,110.0,1.6,-0.3,-0.03,0.58"
                ]
            }
        }"#;
        let resp: KlineResponse = serde_json::from_str(json).unwrap();
        let rows = EastmoneyProvider::parse_response("000001", resp).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].close, Some(9.28));
    }
}
