// Persisted audit log: action_logs (one row per attempted actuation) and health_events.
// action_logs rows are never updated or deleted. health_events are pruned with the retention window.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::instrument;

use super::TelemetryRepo;
use crate::audit::AuditStore;
use crate::models::{AuditRecord, HealthEvent};
use crate::sinks::SinkError;

pub(super) async fn init_log_tables(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS action_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at INTEGER NOT NULL,
            timestamp TEXT NOT NULL,
            actor TEXT NOT NULL,
            endpoint TEXT NOT NULL,
            method TEXT NOT NULL,
            status INTEGER NOT NULL,
            success INTEGER NOT NULL,
            payload TEXT NOT NULL,
            response TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_action_logs_created_at ON action_logs(created_at)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS health_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at INTEGER NOT NULL,
            snapshot_ms INTEGER NOT NULL,
            status TEXT NOT NULL,
            reasons TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_health_events_created_at ON health_events(created_at)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub(super) async fn delete_health_before(pool: &SqlitePool, cutoff: i64) -> anyhow::Result<u64> {
    let health = sqlx::query("DELETE FROM health_events WHERE created_at < $1")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(health.rows_affected())
}

/// Unix seconds of an RFC 3339 timestamp; now when it does not parse.
fn created_at_secs(timestamp: &str) -> i64 {
    chrono::DateTime::parse_from_rfc3339(timestamp)
        .map(|t| t.timestamp())
        .unwrap_or_else(|_| chrono::Utc::now().timestamp())
}

fn encode_json(value: &impl serde::Serialize) -> Result<String, SinkError> {
    serde_json::to_string(value).map_err(|e| SinkError::Encode(e.to_string()))
}

fn parse_action_row(row: &sqlx::sqlite::SqliteRow) -> Result<AuditRecord, SinkError> {
    let payload: String = row.try_get("payload")?;
    let response: String = row.try_get("response")?;
    Ok(AuditRecord {
        actor: row.try_get("actor")?,
        endpoint: row.try_get("endpoint")?,
        method: row.try_get("method")?,
        payload: serde_json::from_str(&payload).unwrap_or(serde_json::Value::String(payload)),
        response: serde_json::from_str(&response).unwrap_or(serde_json::Value::String(response)),
        status: row.try_get::<i64, _>("status")? as u16,
        success: row.try_get("success")?,
        timestamp: row.try_get("timestamp")?,
    })
}

#[async_trait]
impl AuditStore for TelemetryRepo {
    #[instrument(skip(self, record), fields(repo = "telemetry", operation = "append_action"))]
    async fn append_action(&self, record: &AuditRecord) -> Result<(), SinkError> {
        sqlx::query(
            "INSERT INTO action_logs (created_at, timestamp, actor, endpoint, method, status, success, payload, response) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(created_at_secs(&record.timestamp))
        .bind(&record.timestamp)
        .bind(&record.actor)
        .bind(&record.endpoint)
        .bind(&record.method)
        .bind(record.status as i64)
        .bind(record.success)
        .bind(encode_json(&record.payload)?)
        .bind(encode_json(&record.response)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self, event), fields(repo = "telemetry", operation = "append_health"))]
    async fn append_health(&self, event: &HealthEvent) -> Result<(), SinkError> {
        sqlx::query(
            "INSERT INTO health_events (created_at, snapshot_ms, status, reasons) VALUES ($1, $2, $3, $4)",
        )
        .bind((event.timestamp / 1000) as i64)
        .bind(event.timestamp as i64)
        .bind(event.status.as_str())
        .bind(encode_json(&event.reasons)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(repo = "telemetry", operation = "recent_actions"))]
    async fn recent_actions(
        &self,
        limit: u32,
        actor: Option<&str>,
    ) -> Result<Vec<AuditRecord>, SinkError> {
        let rows = sqlx::query(
            "SELECT timestamp, actor, endpoint, method, status, success, payload, response
             FROM action_logs WHERE ($1 IS NULL OR actor = $1) ORDER BY created_at DESC, id DESC LIMIT $2",
        )
        .bind(actor)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(parse_action_row).collect()
    }
}
