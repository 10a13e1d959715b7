//! Owner registry — SQLite-backed records of who owns a session and where
//! their reports go.
//!
//! One row per owner: tracker token + selected repository. How the token got
//! here (OAuth exchange, manual paste) is not this daemon's concern; records
//! arrive through the settings route and are read at finalize time.

use anyhow::{Context as _, Result};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS owners (
    owner_id      TEXT PRIMARY KEY,
    tracker_token TEXT,
    repo          TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
)";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OwnerRow {
    pub owner_id: String,
    pub tracker_token: Option<String>,
    /// Target repository in `owner/name` form.
    pub repo: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone)]
pub struct OwnerStore {
    pool: SqlitePool,
}

impl std::fmt::Debug for OwnerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnerStore").finish_non_exhaustive()
    }
}

impl OwnerStore {
    /// Open (creating if missing) the database at `path` and apply the schema.
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
            .with_context(|| format!("invalid database path {}", path.display()))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("opening owner database")?;
        sqlx::query(SCHEMA).execute(&pool).await?;
        info!(path = %path.display(), "owner database ready");
        Ok(Self { pool })
    }

    /// In-memory database for tests.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("opening in-memory owner database")?;
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Insert or update an owner record. `None` fields keep their stored
    /// value, so token and repo can be set independently.
    pub async fn upsert(
        &self,
        owner_id: &str,
        tracker_token: Option<&str>,
        repo: Option<&str>,
    ) -> Result<OwnerRow> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO owners (owner_id, tracker_token, repo, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(owner_id) DO UPDATE SET
                 tracker_token = COALESCE(excluded.tracker_token, owners.tracker_token),
                 repo          = COALESCE(excluded.repo, owners.repo),
                 updated_at    = excluded.updated_at",
        )
        .bind(owner_id)
        .bind(tracker_token)
        .bind(repo)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.get(owner_id)
            .await?
            .context("owner row missing after upsert")
    }

    pub async fn get(&self, owner_id: &str) -> Result<Option<OwnerRow>> {
        let row = sqlx::query_as::<_, OwnerRow>("SELECT * FROM owners WHERE owner_id = ?1")
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// True when both a token and a target repository are on file.
    pub async fn is_setup_complete(&self, owner_id: &str) -> Result<bool> {
        Ok(self
            .get(owner_id)
            .await?
            .map(|r| r.tracker_token.is_some() && r.repo.is_some())
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let store = OwnerStore::in_memory().await.expect("open");
        store
            .upsert("u-1", Some("tok"), Some("acme/app"))
            .await
            .expect("upsert");

        let row = store.get("u-1").await.expect("get").expect("row");
        assert_eq!(row.tracker_token.as_deref(), Some("tok"));
        assert_eq!(row.repo.as_deref(), Some("acme/app"));
    }

    #[tokio::test]
    async fn partial_upsert_keeps_existing_fields() {
        let store = OwnerStore::in_memory().await.expect("open");
        store.upsert("u-1", Some("tok"), None).await.expect("first");
        store
            .upsert("u-1", None, Some("acme/app"))
            .await
            .expect("second");

        let row = store.get("u-1").await.expect("get").expect("row");
        assert_eq!(row.tracker_token.as_deref(), Some("tok"));
        assert_eq!(row.repo.as_deref(), Some("acme/app"));
    }

    #[tokio::test]
    async fn setup_is_complete_only_with_token_and_repo() {
        let store = OwnerStore::in_memory().await.expect("open");
        assert!(!store.is_setup_complete("u-1").await.expect("check"));

        store.upsert("u-1", Some("tok"), None).await.expect("upsert");
        assert!(!store.is_setup_complete("u-1").await.expect("check"));

        store.upsert("u-1", None, Some("a/b")).await.expect("upsert");
        assert!(store.is_setup_complete("u-1").await.expect("check"));
    }

    #[tokio::test]
    async fn unknown_owner_is_none() {
        let store = OwnerStore::in_memory().await.expect("open");
        assert!(store.get("nope").await.expect("get").is_none());
    }
}
