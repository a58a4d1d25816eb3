//! SQLite turn log.
//!
//! One `history` table, append-only. The embedding columns were added
//! after the table first shipped, so the migration checks `PRAGMA
//! table_info` and alters existing databases in place. Embeddings are
//! stored as JSON arrays; a row whose embedding fails to parse is still
//! recalled, just without its vector.

use async_trait::async_trait;
use quarry_core::error::HistoryError;
use quarry_core::message::Role;
use quarry_core::turn::{Turn, TurnStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// A SQLite-backed turn log.
pub struct SqliteTurnStore {
    pool: SqlitePool,
}

impl SqliteTurnStore {
    /// Open (or create) the turn log at the given SQLite path.
    ///
    /// Pass `":memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, HistoryError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| HistoryError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| HistoryError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite turn log initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, HistoryError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), HistoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS history (
                id       INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id  TEXT NOT NULL,
                ts       INTEGER NOT NULL,
                role     TEXT NOT NULL,
                content  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::MigrationFailed(format!("history table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_history_user_ts ON history(user_id, ts)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::MigrationFailed(format!("user/ts index: {e}")))?;

        // Embedding columns arrived later; bring old databases up to date.
        self.add_column_if_missing("embedding_model", "TEXT").await?;
        self.add_column_if_missing("embedding", "TEXT").await?;

        debug!("Turn log migrations complete");
        Ok(())
    }

    async fn add_column_if_missing(
        &self,
        column: &str,
        sql_type: &str,
    ) -> Result<(), HistoryError> {
        let rows = sqlx::query("PRAGMA table_info(history)")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| HistoryError::MigrationFailed(format!("table_info: {e}")))?;

        let exists = rows.iter().any(|row| {
            row.try_get::<String, _>("name")
                .map(|name| name == column)
                .unwrap_or(false)
        });

        if !exists {
            sqlx::query(&format!("ALTER TABLE history ADD COLUMN {column} {sql_type}"))
                .execute(&self.pool)
                .await
                .map_err(|e| HistoryError::MigrationFailed(format!("{column} column: {e}")))?;
            info!(column, "Added history column");
        }
        Ok(())
    }

    fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<Turn, HistoryError> {
        let user_id: String = row
            .try_get("user_id")
            .map_err(|e| HistoryError::QueryFailed(format!("user_id column: {e}")))?;
        let ts: i64 = row
            .try_get("ts")
            .map_err(|e| HistoryError::QueryFailed(format!("ts column: {e}")))?;
        let role_str: String = row
            .try_get("role")
            .map_err(|e| HistoryError::QueryFailed(format!("role column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| HistoryError::QueryFailed(format!("content column: {e}")))?;

        let role = Role::from_str(&role_str).unwrap_or(Role::User);

        let embedding_model: Option<String> = row.try_get("embedding_model").ok().flatten();
        let embedding_json: Option<String> = row.try_get("embedding").ok().flatten();
        let embedding = embedding_json.and_then(|json| {
            match serde_json::from_str::<Vec<f32>>(&json) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(user_id = %user_id, ts, error = %e, "Dropping unreadable turn embedding");
                    None
                }
            }
        });

        Ok(Turn { user_id, ts, role, content, embedding_model, embedding })
    }
}

#[async_trait]
impl TurnStore for SqliteTurnStore {
    async fn append(&self, turn: Turn) -> std::result::Result<(), HistoryError> {
        let embedding_json = turn
            .embedding
            .as_ref()
            .map(|v| serde_json::to_string(v))
            .transpose()
            .map_err(|e| HistoryError::Storage(format!("Embedding serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO history (user_id, ts, role, content, embedding_model, embedding)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&turn.user_id)
        .bind(turn.ts)
        .bind(turn.role.as_str())
        .bind(&turn.content)
        .bind(&turn.embedding_model)
        .bind(&embedding_json)
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::Storage(format!("Append failed: {e}")))?;

        Ok(())
    }

    async fn recall(
        &self,
        user_id: &str,
        turns: usize,
    ) -> std::result::Result<Vec<Turn>, HistoryError> {
        let limit = (turns * 2) as i64;
        let rows = sqlx::query(
            r#"
            SELECT user_id, ts, role, content, embedding_model, embedding
            FROM history
            WHERE user_id = ?1
            ORDER BY ts DESC, id DESC
            LIMIT ?2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| HistoryError::QueryFailed(format!("Recall failed: {e}")))?;

        let mut recalled = rows
            .iter()
            .map(Self::row_to_turn)
            .collect::<Result<Vec<_>, _>>()?;
        recalled.reverse();
        Ok(recalled)
    }
}
