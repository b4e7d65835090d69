//! Backend adapter trait and structured error types.
//!
//! The `BarProvider` trait abstracts over upstream bar sources (Eastmoney,
//! the trailing-window variant, Tencent) so the fetcher can rank them and
//! tests can substitute mocks. Providers know nothing about pacing, retry,
//! or the store — that all lives above this trait.

use chrono::NaiveDate;
use thiserror::Error;

use crate::bar::RawRow;

/// Message fragments that mark an error as permanent for a symbol.
///
/// Matched case-insensitively against the rendered error; upstreams encode
/// delisted/suspended/unknown symbols in free-text messages rather than
/// stable codes.
const PERMANENT_MARKERS: &[&str] = &["not found", "404", "invalid symbol", "delisted", "suspended"];

/// Errors surfaced by backend adapters.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("rate limited by upstream: {0}")]
    RateLimited(String),

    #[error("HTTP {status} from {backend} for {symbol}")]
    HttpStatus {
        backend: &'static str,
        status: u16,
        symbol: String,
    },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("provider error: {0}")]
    Other(String),
}

impl ProviderError {
    /// Whether this error means the symbol will never yield data
    /// (delisted, suspended, unknown) and retrying is pointless.
    pub fn is_permanent(&self) -> bool {
        match self {
            ProviderError::SymbolNotFound { .. } => true,
            ProviderError::HttpStatus { status: 404, .. } => true,
            other => {
                let msg = other.to_string().to_lowercase();
                PERMANENT_MARKERS.iter().any(|m| msg.contains(m))
            }
        }
    }
}

/// One ranked upstream bar source behind a common range-fetch contract.
pub trait BarProvider {
    /// Short identifier used in logs and errors.
    fn name(&self) -> &'static str;

    /// Fetch raw daily rows for `symbol` over `[start, end]` inclusive.
    ///
    /// An `Ok` with an empty vec is a structurally valid but empty payload;
    /// the caller decides how to treat it.
    fn fetch_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawRow>, ProviderError>;
}
