//! BarVault Core — daily-bar ingestion primitives.
//!
//! This crate contains the building blocks of the ingestion pipeline:
//! - Daily bar types and raw-row normalization
//! - Request pacing, health metrics, and the pause signal
//! - Ranked backend adapters with a common provider trait
//! - The multi-source fetch state machine with segmentation and
//!   incremental updates
//! - The SQLite bar store, keyed unique on (symbol, date)
//! - TOML application configuration

pub mod bar;
pub mod config;
pub mod fetch;
pub mod pacer;
pub mod provider;
pub mod providers;
pub mod store;

pub use bar::{normalize_rows, DailyBar, RawRow};
pub use config::{AppConfig, Profile};
pub use fetch::{FetchConfig, FetchError, SourceFetcher, UpdateOutcome};
pub use pacer::{NetworkTier, PacerConfig, RequestMetrics, RequestPacer};
pub use provider::{BarProvider, ProviderError};
pub use store::{SqliteStore, Store, StoreError};
