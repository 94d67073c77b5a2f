// Downstream sinks for flushed batches: archival (raw payload) and summary (queryable documents).

mod archive;

pub use archive::FsArchive;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::models::BatchSummary;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("archive io: {0}")]
    Io(#[from] std::io::Error),
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("encode: {0}")]
    Encode(String),
    #[error("invalid archive key '{0}'")]
    InvalidKey(String),
    #[error("archive object '{0}' already exists")]
    Exists(String),
}

/// Object store for raw batch payloads, addressed by relative key. Objects are write-once:
/// `put` on an existing key fails with `SinkError::Exists` and leaves the stored object alone.
#[async_trait]
pub trait ArchiveSink: Send + Sync {
    async fn put(&self, key: &str, payload: Bytes) -> Result<(), SinkError>;
    async fn get(&self, key: &str) -> Result<Bytes, SinkError>;
}

/// Summary documents, one per flushed batch.
#[async_trait]
pub trait SummarySink: Send + Sync {
    async fn write_summary(&self, summary: &BatchSummary) -> Result<(), SinkError>;
    /// Summaries with `start_time >= start` and `end_time <= end` (unix seconds), oldest first.
    async fn summaries_between(&self, start: i64, end: i64)
    -> Result<Vec<BatchSummary>, SinkError>;
}
