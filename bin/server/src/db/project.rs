//! Projects: a saved database connection owned by one account.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use querydeck_core::{ProjectId, UserId};
use querydeck_platform_access::StoreError;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

use super::{parse_id, store_error};
use crate::auth::{OwnedResources, ResourceKind};

/// A project as stored in the `projects` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub owner_id: UserId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Target database URL. Carries credentials, so it is never serialized.
    #[serde(skip_serializing)]
    pub connection_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub const KIND: ResourceKind = ResourceKind {
        param: "project_id",
        label: "Project",
    };

    pub fn new(owner_id: UserId, name: impl Into<String>) -> Self {
        Self {
            id: ProjectId::new(),
            owner_id,
            name: name.into(),
            description: None,
            connection_url: None,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_connection_url(mut self, url: impl Into<String>) -> Self {
        self.connection_url = Some(url.into());
        self
    }
}

#[derive(FromRow)]
struct ProjectRow {
    id: String,
    owner_id: String,
    name: String,
    description: Option<String>,
    connection_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl ProjectRow {
    fn try_into_project(self) -> Result<Project, StoreError> {
        Ok(Project {
            id: parse_id(&self.id)?,
            owner_id: parse_id(&self.owner_id)?,
            name: self.name,
            description: self.description,
            connection_url: self.connection_url,
            created_at: self.created_at,
        })
    }
}

/// Postgres-backed project lookup.
#[derive(Clone)]
pub struct PgProjectRepository {
    pool: PgPool,
}

impl PgProjectRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OwnedResources for PgProjectRepository {
    type Resource = Project;

    fn kind(&self) -> ResourceKind {
        Project::KIND
    }

    async fn find_owned(&self, id: &str, owner: UserId) -> Result<Option<Project>, StoreError> {
        let Ok(id) = ProjectId::from_str(id) else {
            return Ok(None);
        };

        let row: Option<ProjectRow> = sqlx::query_as(
            r#"
            SELECT id, owner_id, name, description, connection_url, created_at
            FROM projects
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(id.to_string())
        .bind(owner.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.map(ProjectRow::try_into_project).transpose()
    }
}
