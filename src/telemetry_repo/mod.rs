// SQLite store for batch summaries (summary sink), the persisted audit log and operator accounts.
// Summary reason lists are stored as version-prefixed wincode blobs.

mod actions;
mod blob;
mod summaries;
mod users;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

pub struct TelemetryRepo {
    pool: SqlitePool,
    retention_secs: i64,
}

impl TelemetryRepo {
    pub async fn connect(path: &str, retention_days: u32) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new().connect_with(opts).await?;
        let retention_secs = (retention_days as i64) * 24 * 60 * 60;
        Ok(Self {
            pool,
            retention_secs,
        })
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        summaries::init_summaries_table(&self.pool).await?;
        actions::init_log_tables(&self.pool).await?;
        users::init_users_table(&self.pool).await?;
        Ok(())
    }

    fn retention_cutoff_secs(&self) -> anyhow::Result<i64> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)?
            .as_secs() as i64;
        Ok(now - self.retention_secs)
    }

    /// Drop summaries and health events older than the retention window. Action logs are kept.
    /// Returns rows removed.
    #[instrument(skip(self), fields(repo = "telemetry", operation = "prune_old_data"))]
    pub async fn prune_old_data(&self) -> anyhow::Result<u64> {
        let cutoff = self.retention_cutoff_secs()?;
        let summaries = summaries::delete_ended_before(&self.pool, cutoff).await?;
        let health = actions::delete_health_before(&self.pool, cutoff).await?;
        Ok(summaries + health)
    }

    /// Reclaim space after deletes (run periodically after pruning).
    #[instrument(skip(self), fields(repo = "telemetry", operation = "vacuum"))]
    pub async fn vacuum(&self) -> anyhow::Result<()> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }
}
