// Operator accounts: user id -> password digest.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::instrument;

use super::TelemetryRepo;
use crate::auth::{CredentialStore, User, password_digest};
use crate::sinks::SinkError;

pub(super) async fn init_users_table(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            user_id TEXT PRIMARY KEY,
            password_sha256 TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

impl TelemetryRepo {
    /// Insert or replace a user. `password_sha256` is already digested (see `auth::password_digest`).
    #[instrument(skip(self, password_sha256), fields(repo = "telemetry", operation = "upsert_user"))]
    pub async fn upsert_user(&self, user_id: &str, password_sha256: &str) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO users (user_id, password_sha256) VALUES ($1, $2)
             ON CONFLICT(user_id) DO UPDATE SET password_sha256 = excluded.password_sha256",
        )
        .bind(user_id)
        .bind(password_sha256)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for TelemetryRepo {
    #[instrument(skip(self, password), fields(repo = "telemetry", operation = "authenticate"))]
    async fn authenticate(&self, user_id: &str, password: &str) -> Result<Option<User>, SinkError> {
        let row = sqlx::query("SELECT user_id FROM users WHERE user_id = $1 AND password_sha256 = $2")
            .bind(user_id)
            .bind(password_digest(user_id, password))
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(User {
                user_id: row.try_get("user_id")?,
            })),
            None => Ok(None),
        }
    }
}
