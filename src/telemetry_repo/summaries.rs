// telemetry_summaries table: one row per flushed batch, queried by time window.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::instrument;

use super::{TelemetryRepo, blob};
use crate::models::{BatchSummary, TimestampedReason};
use crate::sinks::{SinkError, SummarySink};

pub(super) async fn init_summaries_table(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS telemetry_summaries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            archive_path TEXT,
            start_time INTEGER NOT NULL,
            end_time INTEGER NOT NULL,
            total_records INTEGER NOT NULL,
            threat_count INTEGER NOT NULL,
            unhealthy_count INTEGER NOT NULL,
            healthy_count INTEGER NOT NULL,
            reasons BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_summaries_window ON telemetry_summaries(start_time, end_time)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub(super) async fn delete_ended_before(pool: &SqlitePool, cutoff: i64) -> anyhow::Result<u64> {
    let r = sqlx::query("DELETE FROM telemetry_summaries WHERE end_time < $1")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(r.rows_affected())
}

fn encode_reasons(summary: &BatchSummary) -> Result<Vec<u8>, SinkError> {
    let payload =
        wincode::serialize(&summary.reasons).map_err(|e| SinkError::Encode(e.to_string()))?;
    Ok(blob::with_version_prefix(blob::REASONS_BLOB_VERSION, payload))
}

/// Unknown or corrupt blobs decode to no reasons; the counts remain authoritative.
fn decode_reasons(bytes: &[u8]) -> Vec<TimestampedReason> {
    let Some(payload) = blob::blob_payload(bytes, blob::REASONS_BLOB_VERSION) else {
        tracing::debug!("reasons blob has unknown version, using empty");
        return vec![];
    };
    wincode::deserialize(payload).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "wincode deserialize reasons (corrupt), using empty");
        vec![]
    })
}

fn parse_summary_row(row: &sqlx::sqlite::SqliteRow) -> Result<BatchSummary, SinkError> {
    let reasons: Vec<u8> = row.try_get("reasons")?;
    Ok(BatchSummary {
        archive_path: row.try_get("archive_path")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        total_records: row.try_get::<i64, _>("total_records")? as u32,
        threat_count: row.try_get::<i64, _>("threat_count")? as u32,
        unhealthy_count: row.try_get::<i64, _>("unhealthy_count")? as u32,
        healthy_count: row.try_get::<i64, _>("healthy_count")? as u32,
        reasons: decode_reasons(&reasons),
    })
}

#[async_trait]
impl SummarySink for TelemetryRepo {
    #[instrument(skip(self, summary), fields(repo = "telemetry", operation = "write_summary", start_time = summary.start_time))]
    async fn write_summary(&self, summary: &BatchSummary) -> Result<(), SinkError> {
        let reasons = encode_reasons(summary)?;
        sqlx::query(
            "INSERT INTO telemetry_summaries (archive_path, start_time, end_time, total_records, threat_count, unhealthy_count, healthy_count, reasons) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&summary.archive_path)
        .bind(summary.start_time)
        .bind(summary.end_time)
        .bind(summary.total_records as i64)
        .bind(summary.threat_count as i64)
        .bind(summary.unhealthy_count as i64)
        .bind(summary.healthy_count as i64)
        .bind(&reasons)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(repo = "telemetry", operation = "summaries_between"))]
    async fn summaries_between(
        &self,
        start: i64,
        end: i64,
    ) -> Result<Vec<BatchSummary>, SinkError> {
        let rows = sqlx::query(
            "SELECT archive_path, start_time, end_time, total_records, threat_count, unhealthy_count, healthy_count, reasons
             FROM telemetry_summaries WHERE start_time >= $1 AND end_time <= $2 ORDER BY start_time ASC, id ASC",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(parse_summary_row).collect()
    }
}
