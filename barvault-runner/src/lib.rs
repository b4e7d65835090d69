//! BarVault Runner — batch orchestration over the ingestion core.
//!
//! - Resumable batch updates with checkpointed JSON progress
//! - Completeness auditing against a weekday calendar
//! - Targeted refresh and failure-list cleanup

pub mod audit;
pub mod batch;
pub mod progress;
pub mod refresh;

pub use audit::{
    check_symbol, check_universe, expected_calendar, CompletenessReport, CompletenessResult,
    CompletenessStatus, StatusCounts,
};
pub use batch::{BatchConfig, BatchError, BatchObserver, BatchOrchestrator, StdoutObserver, SymbolOutcome};
pub use progress::{BatchProgress, RunSummary, PROGRESS_SCHEMA_VERSION};
pub use refresh::{cleanup_failed_symbols, targeted_refresh, CleanupOutcome, RefreshOutcome};
