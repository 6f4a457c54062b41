//! Query instrumentation for querydeck handlers.
//!
//! - [`QueryTimer`] measures execution time on a monotonic clock
//! - [`classify`] names the statement kind from its leading keyword
//! - [`log_history`] appends a [`QueryHistoryEntry`] on a best-effort basis
//!
//! None of this participates in authorization; handlers that run user
//! queries use it to report timing and keep a history.

pub mod classify;
pub mod history;
pub mod timer;

pub use classify::{QueryType, classify};
pub use history::{
    HistoryError, QueryHistoryEntry, QueryHistorySink, log_history, spawn_log_history,
};
pub use timer::{QueryTimer, Timing};
