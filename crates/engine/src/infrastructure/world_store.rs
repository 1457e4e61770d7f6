//! SQLite-backed world record storage.

use async_trait::async_trait;
use buildsys_domain::{PrincipalId, WorldKind, WorldName, WorldRecord};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::infrastructure::ports::{RepoError, WorldStore};

/// SQLite implementation of the persisted world store.
///
/// One row per world. `name` is the primary key and compares without case,
/// matching registry identity.
pub struct SqliteWorldStore {
    pool: SqlitePool,
}

impl SqliteWorldStore {
    pub async fn new(db_path: &str) -> Result<Self, RepoError> {
        let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", db_path))
            .await
            .map_err(|e| map_sqlx("connect", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS world_data (
                name TEXT NOT NULL PRIMARY KEY COLLATE NOCASE,
                owner TEXT NOT NULL,
                world_kind TEXT NOT NULL,
                created_at TEXT NOT NULL,
                hidden INTEGER NOT NULL DEFAULT 0,
                locked INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| map_sqlx("create_table", e))?;

        Ok(Self { pool })
    }

    fn record_from_row(row: &SqliteRow) -> Result<WorldRecord, RepoError> {
        let name: String = row.try_get("name").map_err(RepoError::serialization)?;
        let owner: String = row.try_get("owner").map_err(RepoError::serialization)?;
        let kind: String = row.try_get("world_kind").map_err(RepoError::serialization)?;
        let created_at: String = row.try_get("created_at").map_err(RepoError::serialization)?;
        let hidden: bool = row.try_get("hidden").map_err(RepoError::serialization)?;
        let locked: bool = row.try_get("locked").map_err(RepoError::serialization)?;

        let name = WorldName::new(name).map_err(RepoError::serialization)?;
        let owner = PrincipalId::new(owner).map_err(RepoError::serialization)?;
        let kind: WorldKind = kind.parse().map_err(RepoError::serialization)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(RepoError::serialization)?
            .with_timezone(&Utc);

        Ok(WorldRecord::new(name, owner, kind, created_at)
            .with_hidden(hidden)
            .with_locked(locked))
    }
}

/// Connectivity problems are retryable; everything else is reported as is.
fn map_sqlx(operation: &'static str, e: sqlx::Error) -> RepoError {
    match &e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            RepoError::unavailable(&e)
        }
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepoError::constraint(db.message())
        }
        _ => RepoError::database(operation, &e),
    }
}

#[async_trait]
impl WorldStore for SqliteWorldStore {
    async fn load_all(&self) -> Result<Vec<WorldRecord>, RepoError> {
        let rows = sqlx::query(
            "SELECT name, owner, world_kind, created_at, hidden, locked FROM world_data ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx("load_all", e))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            match Self::record_from_row(row) {
                Ok(record) => records.push(record),
                Err(e) => {
                    let name: Option<String> = row.try_get("name").ok();
                    tracing::warn!(
                        world = name.as_deref().unwrap_or("?"),
                        error = %e,
                        "Skipping unreadable world record"
                    );
                }
            }
        }
        Ok(records)
    }

    async fn insert(&self, record: &WorldRecord) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO world_data (name, owner, world_kind, created_at, hidden, locked)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.name().as_str())
        .bind(record.owner().as_str())
        .bind(record.kind().as_str())
        .bind(record.created_at().to_rfc3339())
        .bind(record.is_hidden())
        .bind(record.is_locked())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx("insert", e))?;

        Ok(())
    }

    async fn update(&self, name: &WorldName, hidden: bool, locked: bool) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE world_data SET hidden = ?, locked = ? WHERE name = ?")
            .bind(hidden)
            .bind(locked)
            .bind(name.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx("update", e))?;

        if result.rows_affected() == 0 {
            return Err(RepoError::not_found("World", name));
        }
        Ok(())
    }

    async fn delete(&self, name: &WorldName) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM world_data WHERE name = ?")
            .bind(name.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx("delete", e))?;

        Ok(())
    }
}
