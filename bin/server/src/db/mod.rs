//! Database repositories for projects and query history.

pub mod project;
pub mod query_history;

pub use project::{PgProjectRepository, Project};
pub use query_history::PgQueryHistory;

use querydeck_core::ParseIdError;
use querydeck_platform_access::StoreError;
use std::str::FromStr;

/// Maps a sqlx failure onto the storage error the access layer understands.
pub(crate) fn store_error(error: sqlx::Error) -> StoreError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict {
            details: db.message().to_string(),
        },
        sqlx::Error::Decode(_) | sqlx::Error::ColumnDecode { .. } => StoreError::Corrupt {
            details: error.to_string(),
        },
        _ => StoreError::Backend {
            details: error.to_string(),
        },
    }
}

/// Parses a stored id column.
pub(crate) fn parse_id<T>(raw: &str) -> Result<T, StoreError>
where
    T: FromStr<Err = ParseIdError>,
{
    T::from_str(raw).map_err(|e| StoreError::Corrupt {
        details: e.to_string(),
    })
}
