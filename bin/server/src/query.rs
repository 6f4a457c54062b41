//! Running SQL against a project's own database.

use async_trait::async_trait;
use querydeck_instrumentation::QueryType;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Column, Row};
use std::fmt;

use crate::db::Project;

/// What a statement produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutcome {
    pub columns: Vec<String>,
    pub row_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
}

/// Query execution failures.
#[derive(Debug)]
pub enum QueryError {
    /// The project has no connection configured.
    NoConnection { project: String },
    /// The project's database could not be reached.
    Connect { details: String },
    /// The database rejected the statement.
    Execution { details: String },
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoConnection { project } => {
                write!(f, "project '{}' has no database connection", project)
            }
            Self::Connect { details } => write!(f, "failed to connect: {}", details),
            Self::Execution { details } => write!(f, "query failed: {}", details),
        }
    }
}

impl std::error::Error for QueryError {}

/// Executes statements against a project's database.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    async fn run(
        &self,
        project: &Project,
        query: &str,
        query_type: QueryType,
    ) -> Result<QueryOutcome, QueryError>;
}

/// Opens a fresh single-connection pool per statement.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgQueryRunner;

#[async_trait]
impl QueryRunner for PgQueryRunner {
    async fn run(
        &self,
        project: &Project,
        query: &str,
        query_type: QueryType,
    ) -> Result<QueryOutcome, QueryError> {
        let url = project
            .connection_url
            .as_deref()
            .ok_or_else(|| QueryError::NoConnection {
                project: project.id.to_string(),
            })?;

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(|e| QueryError::Connect {
                details: e.to_string(),
            })?;

        let outcome = if query_type.is_read() {
            sqlx::raw_sql(query)
                .fetch_all(&pool)
                .await
                .map(|rows| QueryOutcome {
                    columns: rows
                        .first()
                        .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
                        .unwrap_or_default(),
                    row_count: rows.len() as u64,
                    rows_affected: None,
                })
        } else {
            sqlx::raw_sql(query)
                .execute(&pool)
                .await
                .map(|result| QueryOutcome {
                    rows_affected: Some(result.rows_affected()),
                    ..QueryOutcome::default()
                })
        };

        pool.close().await;
        outcome.map_err(|e| QueryError::Execution {
            details: e.to_string(),
        })
    }
}
