//! Database repositories for accounts and sessions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use querydeck_core::UserId;
use querydeck_platform_access::{
    Account, AccountStore, Session, SessionStore, SessionToken, StoreError, normalize_email,
};
use sqlx::{FromRow, PgPool};

use crate::db::{parse_id, store_error};

const ACCOUNT_COLUMNS: &str = "id, email, name, avatar_url, password_hash, oauth_provider, \
     oauth_id, is_active, last_login, created_at";

/// Row type for account queries.
#[derive(FromRow)]
struct AccountRow {
    id: String,
    email: String,
    name: Option<String>,
    avatar_url: Option<String>,
    password_hash: Option<String>,
    oauth_provider: Option<String>,
    oauth_id: Option<String>,
    is_active: bool,
    last_login: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl AccountRow {
    fn try_into_account(self) -> Result<Account, StoreError> {
        Ok(Account {
            id: parse_id(&self.id)?,
            email: self.email,
            name: self.name,
            avatar_url: self.avatar_url,
            password_hash: self.password_hash,
            oauth_provider: self.oauth_provider,
            oauth_id: self.oauth_id,
            active: self.is_active,
            last_login: self.last_login,
            created_at: self.created_at,
        })
    }
}

/// Row type for session queries.
#[derive(FromRow)]
struct SessionRow {
    token: String,
    user_id: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl SessionRow {
    fn try_into_session(self) -> Result<Session, StoreError> {
        Ok(Session {
            token: SessionToken::from(self.token),
            user_id: parse_id(&self.user_id)?,
            created_at: self.created_at,
            expires_at: self.expires_at,
        })
    }
}

/// Postgres-backed account storage.
#[derive(Clone)]
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_where(
        &self,
        condition: &str,
        binds: &[&str],
    ) -> Result<Option<Account>, StoreError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE {condition}");
        let mut query = sqlx::query_as::<_, AccountRow>(&sql);
        for bind in binds {
            query = query.bind(*bind);
        }
        let row = query.fetch_optional(&self.pool).await.map_err(store_error)?;

        row.map(AccountRow::try_into_account).transpose()
    }
}

#[async_trait]
impl AccountStore for PgAccountRepository {
    async fn find_by_id(&self, id: UserId) -> Result<Option<Account>, StoreError> {
        let id = id.to_string();
        self.find_where("id = $1", &[id.as_str()]).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        self.find_where("lower(email) = lower($1)", &[email]).await
    }

    async fn find_by_oauth(
        &self,
        provider: &str,
        oauth_id: &str,
    ) -> Result<Option<Account>, StoreError> {
        self.find_where("oauth_provider = $1 AND oauth_id = $2", &[provider, oauth_id])
            .await
    }

    async fn create(&self, account: &Account) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, avatar_url, password_hash, oauth_provider,
                               oauth_id, is_active, last_login, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            "#,
        )
        .bind(account.id.to_string())
        .bind(normalize_email(&account.email))
        .bind(&account.name)
        .bind(&account.avatar_url)
        .bind(&account.password_hash)
        .bind(&account.oauth_provider)
        .bind(&account.oauth_id)
        .bind(account.active)
        .bind(account.last_login)
        .bind(account.created_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    async fn link_oauth(
        &self,
        id: UserId,
        provider: &str,
        oauth_id: &str,
        avatar_url: Option<&str>,
    ) -> Result<(), StoreError> {
        // The provider guard makes a concurrent link to a different provider
        // lose instead of overwrite.
        let result = sqlx::query(
            r#"
            UPDATE users
            SET oauth_provider = $2,
                oauth_id = $3,
                avatar_url = COALESCE($4, avatar_url),
                last_login = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND (oauth_provider IS NULL OR oauth_provider = $2)
            "#,
        )
        .bind(id.to_string())
        .bind(provider)
        .bind(oauth_id)
        .bind(avatar_url)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict {
                details: format!("account '{id}' is linked to another provider"),
            });
        }
        Ok(())
    }

    async fn touch_last_login(&self, id: UserId) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET last_login = NOW(), updated_at = NOW() WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<Account>, StoreError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM users ORDER BY created_at DESC");
        let rows: Vec<AccountRow> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        rows.into_iter().map(AccountRow::try_into_account).collect()
    }
}

/// Postgres-backed session storage.
#[derive(Clone)]
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionRepository {
    async fn find(&self, token: &SessionToken) -> Result<Option<Session>, StoreError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT token, user_id, created_at, expires_at
            FROM sessions
            WHERE token = $1
            "#,
        )
        .bind(token.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.map(SessionRow::try_into_session).transpose()
    }

    async fn create(&self, session: &Session) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (token, user_id, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(session.token.as_str())
        .bind(session.user_id.to_string())
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    async fn delete(&self, token: &SessionToken) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token.as_str())
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(result.rows_affected())
    }
}
