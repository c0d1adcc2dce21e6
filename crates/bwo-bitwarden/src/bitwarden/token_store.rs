//! Persistent access-token cache.
//!
//! Rows are inserted when a token request succeeds and never updated or
//! deleted; a newer row supersedes older ones for the same client id.

use crate::bitwarden::types::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tokio::sync::Mutex;

/// Storage backend for access tokens.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// The newest token for `client_id` that is still valid at `now`.
    async fn find_valid(
        &self,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AccessTokenRecord>, BitwardenError>;

    /// Persist a new token row.
    async fn insert(&self, token: NewAccessToken) -> Result<AccessTokenRecord, BitwardenError>;

    /// Every row for `client_id`, newest first.
    async fn list(&self, client_id: &str) -> Result<Vec<AccessTokenRecord>, BitwardenError>;
}

fn from_timestamp(secs: i64) -> Result<DateTime<Utc>, BitwardenError> {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| BitwardenError::storage(format!("Invalid stored timestamp: {}", secs)))
}

// ── SQLite ──────────────────────────────────────────────────────────

const SELECT_COLUMNS: &str = "SELECT id, client_id, access_token, expires_in, expires_at, \
     device_identifier, device_name, device_type, created_at, updated_at \
     FROM bitwarden_access_tokens";

/// Token store backed by SQLite.
#[derive(Debug, Clone)]
pub struct SqliteTokenStore {
    pool: SqlitePool,
}

impl SqliteTokenStore {
    /// Connect to `url` (e.g. `sqlite://tokens.db?mode=rwc`) and run migrations.
    pub async fn connect(url: &str) -> Result<Self, BitwardenError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1) // SQLite single-writer
            .connect(url)
            .await
            .map_err(|e| BitwardenError::storage(format!("SQLite connect {}: {}", url, e)))?;

        let store = Self { pool };
        store.migrate().await?;
        info!("Bitwarden token store ready at {}", url);
        Ok(store)
    }

    /// Wrap an existing pool. Call [`migrate`](Self::migrate) before use.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the token table and its lookup index if absent.
    pub async fn migrate(&self) -> Result<(), BitwardenError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bitwarden_access_tokens (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                client_id           TEXT    NOT NULL,
                access_token        TEXT    NOT NULL,
                expires_in          INTEGER NOT NULL,
                expires_at          INTEGER NOT NULL,
                device_identifier   TEXT    NOT NULL DEFAULT '',
                device_name         TEXT    NOT NULL DEFAULT '',
                device_type         INTEGER NOT NULL DEFAULT 14,
                created_at          INTEGER NOT NULL,
                updated_at          INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_bitwarden_access_tokens_client_expiry \
             ON bitwarden_access_tokens (client_id, expires_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn row_to_record(row: &SqliteRow) -> Result<AccessTokenRecord, BitwardenError> {
        Ok(AccessTokenRecord {
            id: row.try_get("id")?,
            client_id: row.try_get("client_id")?,
            access_token: row.try_get("access_token")?,
            expires_in: row.try_get("expires_in")?,
            expires_at: from_timestamp(row.try_get("expires_at")?)?,
            device_identifier: row.try_get("device_identifier")?,
            device_name: row.try_get("device_name")?,
            device_type: row.try_get("device_type")?,
            created_at: from_timestamp(row.try_get("created_at")?)?,
            updated_at: from_timestamp(row.try_get("updated_at")?)?,
        })
    }
}

#[async_trait]
impl TokenStore for SqliteTokenStore {
    async fn find_valid(
        &self,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AccessTokenRecord>, BitwardenError> {
        let sql = format!(
            "{} WHERE client_id = ? AND expires_at > ? ORDER BY created_at DESC, id DESC LIMIT 1",
            SELECT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(client_id)
            .bind(now.timestamp())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn insert(&self, token: NewAccessToken) -> Result<AccessTokenRecord, BitwardenError> {
        let created = token.created_at.timestamp();
        let result = sqlx::query(
            "INSERT INTO bitwarden_access_tokens \
             (client_id, access_token, expires_in, expires_at, device_identifier, device_name, \
              device_type, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&token.client_id)
        .bind(&token.access_token)
        .bind(token.expires_in)
        .bind(token.expires_at.timestamp())
        .bind(&token.device_identifier)
        .bind(&token.device_name)
        .bind(token.device_type)
        .bind(created)
        .bind(created)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!("Stored Bitwarden access token #{} for client {}", id, token.client_id);

        Ok(AccessTokenRecord {
            id,
            client_id: token.client_id,
            access_token: token.access_token,
            expires_in: token.expires_in,
            expires_at: from_timestamp(token.expires_at.timestamp())?,
            device_identifier: token.device_identifier,
            device_name: token.device_name,
            device_type: token.device_type,
            created_at: from_timestamp(created)?,
            updated_at: from_timestamp(created)?,
        })
    }

    async fn list(&self, client_id: &str) -> Result<Vec<AccessTokenRecord>, BitwardenError> {
        let sql = format!("{} WHERE client_id = ? ORDER BY created_at DESC, id DESC", SELECT_COLUMNS);
        let rows = sqlx::query(&sql).bind(client_id).fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_record).collect()
    }
}

// ── In-memory ───────────────────────────────────────────────────────

/// Process-local token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    rows: Mutex<Vec<AccessTokenRecord>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn find_valid(
        &self,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AccessTokenRecord>, BitwardenError> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .filter(|r| r.client_id == client_id && r.is_valid(now))
            .max_by_key(|r| (r.created_at, r.id))
            .cloned())
    }

    async fn insert(&self, token: NewAccessToken) -> Result<AccessTokenRecord, BitwardenError> {
        let mut rows = self.rows.lock().await;
        let record = AccessTokenRecord {
            id: rows.len() as i64 + 1,
            client_id: token.client_id,
            access_token: token.access_token,
            expires_in: token.expires_in,
            expires_at: token.expires_at,
            device_identifier: token.device_identifier,
            device_name: token.device_name,
            device_type: token.device_type,
            created_at: token.created_at,
            updated_at: token.created_at,
        };
        rows.push(record.clone());
        Ok(record)
    }

    async fn list(&self, client_id: &str) -> Result<Vec<AccessTokenRecord>, BitwardenError> {
        let rows = self.rows.lock().await;
        let mut out: Vec<AccessTokenRecord> =
            rows.iter().filter(|r| r.client_id == client_id).cloned().collect();
        out.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_token(client_id: &str, token: &str, created_at: DateTime<Utc>, ttl: i64) -> NewAccessToken {
        NewAccessToken {
            client_id: client_id.into(),
            access_token: token.into(),
            expires_in: ttl,
            expires_at: created_at + Duration::seconds(ttl),
            device_identifier: "device-1".into(),
            device_name: "Public API Client".into(),
            device_type: 14,
            created_at,
        }
    }

    async fn memory_sqlite() -> SqliteTokenStore {
        SqliteTokenStore::connect("sqlite::memory:").await.unwrap()
    }

    // ── SQLite ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn sqlite_insert_then_find_valid() {
        let store = memory_sqlite().await;
        let now = Utc::now();
        let stored = store.insert(new_token("org.a", "tok-a", now, 3600)).await.unwrap();
        assert!(stored.id > 0);

        let found = store.find_valid("org.a", now).await.unwrap().unwrap();
        assert_eq!(found.access_token, "tok-a");
        assert_eq!(found.expires_in, 3600);
        assert_eq!(found.expires_at.timestamp(), (now + Duration::seconds(3600)).timestamp());
        assert_eq!(found.device_type, 14);
    }

    #[tokio::test]
    async fn sqlite_ignores_expired_and_other_clients() {
        let store = memory_sqlite().await;
        let now = Utc::now();
        store.insert(new_token("org.a", "old", now - Duration::seconds(7200), 3600)).await.unwrap();
        store.insert(new_token("org.b", "other", now, 3600)).await.unwrap();

        assert!(store.find_valid("org.a", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sqlite_picks_most_recent_valid_row() {
        let store = memory_sqlite().await;
        let now = Utc::now();
        store.insert(new_token("org.a", "first", now - Duration::seconds(60), 3600)).await.unwrap();
        store.insert(new_token("org.a", "second", now, 3600)).await.unwrap();

        let found = store.find_valid("org.a", now).await.unwrap().unwrap();
        assert_eq!(found.access_token, "second");
        assert_eq!(store.list("org.a").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn sqlite_same_second_ties_break_on_insertion_order() {
        let store = memory_sqlite().await;
        let now = Utc::now();
        store.insert(new_token("org.a", "first", now, 3600)).await.unwrap();
        store.insert(new_token("org.a", "second", now, 3600)).await.unwrap();

        let found = store.find_valid("org.a", now).await.unwrap().unwrap();
        assert_eq!(found.access_token, "second");
    }

    #[tokio::test]
    async fn sqlite_rows_survive_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("tokens.db").display());
        let now = Utc::now();

        let store = SqliteTokenStore::connect(&url).await.unwrap();
        store.insert(new_token("org.a", "persisted", now, 3600)).await.unwrap();
        store.close().await;

        let reopened = SqliteTokenStore::connect(&url).await.unwrap();
        let found = reopened.find_valid("org.a", now).await.unwrap().unwrap();
        assert_eq!(found.access_token, "persisted");
    }

    #[tokio::test]
    async fn sqlite_migrate_is_idempotent() {
        let store = memory_sqlite().await;
        store.migrate().await.unwrap();
        store.migrate().await.unwrap();
    }

    // ── Memory ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn memory_store_selection_rules() {
        let store = MemoryTokenStore::new();
        let now = Utc::now();
        store.insert(new_token("org.a", "expired", now - Duration::seconds(7200), 3600)).await.unwrap();
        assert!(store.find_valid("org.a", now).await.unwrap().is_none());

        store.insert(new_token("org.a", "first", now - Duration::seconds(10), 3600)).await.unwrap();
        store.insert(new_token("org.a", "second", now, 3600)).await.unwrap();
        let found = store.find_valid("org.a", now).await.unwrap().unwrap();
        assert_eq!(found.access_token, "second");

        let listed = store.list("org.a").await.unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].access_token, "second");
    }
}
