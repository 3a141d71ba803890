use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::UserId;

/// Server-side session bindings: token -> user. Sessions are ephemeral;
/// clearing an unknown token is a no-op.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, user_id: UserId) -> Result<String>;
    async fn resolve(&self, token: &str) -> Result<Option<UserId>>;
    async fn clear(&self, token: &str) -> Result<()>;
}

/// Session store backed by the `sessions` table.
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create(&self, user_id: UserId) -> Result<String> {
        let token = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO sessions (token, user_id, created_at) VALUES (?, ?, ?)")
            .bind(&token)
            .bind(user_id.to_string())
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .context("Failed to create session")?;
        Ok(token)
    }

    async fn resolve(&self, token: &str) -> Result<Option<UserId>> {
        let row = sqlx::query("SELECT user_id FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to resolve session")?;

        match row {
            Some(row) => {
                let user_id_str: String = row.get("user_id");
                Ok(Some(
                    Uuid::parse_str(&user_id_str).context("Invalid user ID in session")?,
                ))
            }
            None => Ok(None),
        }
    }

    async fn clear(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await
            .context("Failed to clear session")?;
        Ok(())
    }
}
