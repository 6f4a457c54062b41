//! Best-effort query history.
//!
//! History is write-only telemetry. A failure to record an entry is logged
//! and dropped; it must never fail or hold up the request that produced it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use querydeck_core::{ProjectId, QueryHistoryId, UserId};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use crate::classify::QueryType;

/// One executed query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryHistoryEntry {
    pub id: QueryHistoryId,
    pub project_id: ProjectId,
    pub user_id: UserId,
    pub query_text: String,
    pub query_type: QueryType,
    pub natural_language_input: Option<String>,
    pub execution_time_ms: u64,
    pub success: bool,
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl QueryHistoryEntry {
    /// Records a successful execution.
    #[must_use]
    pub fn succeeded(
        project_id: ProjectId,
        user_id: UserId,
        query_text: impl Into<String>,
        query_type: QueryType,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            id: QueryHistoryId::new(),
            project_id,
            user_id,
            query_text: query_text.into(),
            query_type,
            natural_language_input: None,
            execution_time_ms,
            success: true,
            error_message: None,
            timestamp: Utc::now(),
        }
    }

    /// Marks the execution as failed with `message`.
    #[must_use]
    pub fn failed_with(mut self, message: impl Into<String>) -> Self {
        self.success = false;
        self.error_message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_natural_language(mut self, input: Option<String>) -> Self {
        self.natural_language_input = input;
        self
    }
}

/// Failure to persist a history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryError {
    pub details: String,
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to record query history: {}", self.details)
    }
}

impl std::error::Error for HistoryError {}

/// Append-only history storage.
#[async_trait]
pub trait QueryHistorySink: Send + Sync {
    async fn append(&self, entry: &QueryHistoryEntry) -> Result<(), HistoryError>;
}

/// Appends `entry`, logging and discarding any failure.
pub async fn log_history(sink: &dyn QueryHistorySink, entry: &QueryHistoryEntry) {
    if let Err(error) = sink.append(entry).await {
        warn!(
            project_id = %entry.project_id,
            user_id = %entry.user_id,
            %error,
            "dropping query history entry"
        );
    }
}

/// Appends `entry` on a background task so the caller does not wait on
/// storage.
pub fn spawn_log_history(
    sink: Arc<dyn QueryHistorySink>,
    entry: QueryHistoryEntry,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move { log_history(sink.as_ref(), &entry).await })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        entries: Mutex<Vec<QueryHistoryEntry>>,
    }

    #[async_trait]
    impl QueryHistorySink for RecordingSink {
        async fn append(&self, entry: &QueryHistoryEntry) -> Result<(), HistoryError> {
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }
    }

    struct BrokenSink;

    #[async_trait]
    impl QueryHistorySink for BrokenSink {
        async fn append(&self, _entry: &QueryHistoryEntry) -> Result<(), HistoryError> {
            Err(HistoryError {
                details: "relation \"query_history\" does not exist".to_string(),
            })
        }
    }

    fn entry() -> QueryHistoryEntry {
        QueryHistoryEntry::succeeded(
            ProjectId::new(),
            UserId::new(),
            "select 1",
            QueryType::Select,
            3,
        )
    }

    #[tokio::test]
    async fn appends_to_sink() {
        let sink = RecordingSink::default();
        let entry = entry().with_natural_language(Some("how many users?".to_string()));

        log_history(&sink, &entry).await;

        assert_eq!(*sink.entries.lock().unwrap(), vec![entry]);
    }

    #[tokio::test]
    async fn sink_failure_is_swallowed() {
        log_history(&BrokenSink, &entry()).await;
    }

    #[tokio::test]
    async fn background_append_completes() {
        let sink = Arc::new(RecordingSink::default());
        let failed = entry().failed_with("syntax error at or near \"selec\"");

        spawn_log_history(sink.clone(), failed.clone())
            .await
            .expect("task");

        let recorded = sink.entries.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert!(!recorded[0].success);
        assert_eq!(
            recorded[0].error_message.as_deref(),
            Some("syntax error at or near \"selec\"")
        );
    }

    #[tokio::test]
    async fn background_failure_does_not_panic_the_task() {
        spawn_log_history(Arc::new(BrokenSink), entry())
            .await
            .expect("task completes");
    }
}
