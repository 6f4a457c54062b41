//! Postgres sink for query history.

use async_trait::async_trait;
use querydeck_instrumentation::{HistoryError, QueryHistoryEntry, QueryHistorySink};
use sqlx::PgPool;

/// Appends history entries to the `query_history` table.
#[derive(Clone)]
pub struct PgQueryHistory {
    pool: PgPool,
}

impl PgQueryHistory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueryHistorySink for PgQueryHistory {
    async fn append(&self, entry: &QueryHistoryEntry) -> Result<(), HistoryError> {
        sqlx::query(
            r#"
            INSERT INTO query_history (id, project_id, user_id, query_text, query_type,
                                       natural_language_input, execution_time_ms, success,
                                       error_message, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.project_id.to_string())
        .bind(entry.user_id.to_string())
        .bind(&entry.query_text)
        .bind(entry.query_type.as_str())
        .bind(&entry.natural_language_input)
        .bind(i64::try_from(entry.execution_time_ms).unwrap_or(i64::MAX))
        .bind(entry.success)
        .bind(&entry.error_message)
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError {
            details: e.to_string(),
        })?;

        Ok(())
    }
}
