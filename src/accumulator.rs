// Batch accumulator: Empty -> Filling -> flush -> Empty.
// A flushed batch is frozen, written to the archive and summary sinks once, then dropped
// whether or not the writes succeeded (at-most-once delivery).

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, instrument, warn};

use crate::models::{
    BatchRecord, BatchSummary, HealthAssessment, HealthStatus, Snapshot, TimestampedReason,
};
use crate::sinks::{ArchiveSink, SummarySink};

struct Batch {
    start_time: u64,
    end_time: u64,
    records: Vec<BatchRecord>,
}

impl Batch {
    fn freeze(self) -> FrozenBatch {
        FrozenBatch {
            start_time: self.start_time,
            end_time: self.end_time,
            records: self.records,
        }
    }
}

/// A closed window. There is no way to append to it.
#[derive(Debug, Clone)]
pub struct FrozenBatch {
    start_time: u64,
    end_time: u64,
    records: Vec<BatchRecord>,
}

impl FrozenBatch {
    /// Unix milliseconds of the first record.
    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    /// Unix milliseconds of the last record.
    pub fn end_time(&self) -> u64 {
        self.end_time
    }

    pub fn records(&self) -> &[BatchRecord] {
        &self.records
    }
}

/// What happened to one flushed batch.
#[derive(Debug, Clone)]
pub struct FlushReport {
    pub summary: BatchSummary,
    pub archive_error: Option<String>,
    pub summary_error: Option<String>,
}

impl FlushReport {
    pub fn is_clean(&self) -> bool {
        self.archive_error.is_none() && self.summary_error.is_none()
    }
}

/// `telemetry/{startUnix}_to_{endUnix}.json`, seconds.
pub fn archive_key(start_ms: u64, end_ms: u64) -> String {
    format!("telemetry/{}_to_{}.json", start_ms / 1000, end_ms / 1000)
}

pub fn summarize(batch: &FrozenBatch, archive_path: Option<String>) -> BatchSummary {
    let mut threat_count = 0;
    let mut unhealthy_count = 0;
    let mut healthy_count = 0;
    let mut reasons = Vec::new();
    for record in &batch.records {
        match record.assessment.status {
            HealthStatus::Threat => threat_count += 1,
            HealthStatus::Unhealthy => unhealthy_count += 1,
            HealthStatus::Healthy => healthy_count += 1,
        }
        reasons.extend(
            record
                .assessment
                .reasons
                .iter()
                .map(|reason| TimestampedReason {
                    timestamp: record.snapshot.timestamp,
                    reason: reason.clone(),
                }),
        );
    }
    BatchSummary {
        archive_path,
        start_time: (batch.start_time / 1000) as i64,
        end_time: (batch.end_time / 1000) as i64,
        total_records: batch.records.len() as u32,
        threat_count,
        unhealthy_count,
        healthy_count,
        reasons,
    }
}

pub struct BatchAccumulator {
    batch_size: usize,
    current: Option<Batch>,
    archive: Arc<dyn ArchiveSink>,
    summaries: Arc<dyn SummarySink>,
}

impl BatchAccumulator {
    pub fn new(
        batch_size: usize,
        archive: Arc<dyn ArchiveSink>,
        summaries: Arc<dyn SummarySink>,
    ) -> Self {
        Self {
            batch_size: batch_size.max(1),
            current: None,
            archive,
            summaries,
        }
    }

    /// Opens a new window on the first append after a flush.
    pub fn append(&mut self, snapshot: Snapshot, assessment: HealthAssessment) {
        let ts = snapshot.timestamp;
        let capacity = self.batch_size;
        let batch = self.current.get_or_insert_with(|| Batch {
            start_time: ts,
            end_time: ts,
            records: Vec::with_capacity(capacity),
        });
        batch.end_time = ts;
        batch.records.push(BatchRecord {
            snapshot,
            assessment,
        });
    }

    pub fn len(&self) -> usize {
        self.current.as_ref().map_or(0, |b| b.records.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start of the open window, if any (unix ms).
    pub fn window_start(&self) -> Option<u64> {
        self.current.as_ref().map(|b| b.start_time)
    }

    pub fn should_flush(&self) -> bool {
        self.len() >= self.batch_size
    }

    /// Freeze the open window and write it to both sinks. Returns None when nothing was buffered.
    /// Sink failures are logged and reported, never returned as errors; the batch is gone either way.
    #[instrument(skip(self), fields(operation = "flush_batch", records = self.len()))]
    pub async fn flush(&mut self) -> Option<FlushReport> {
        let frozen = self.current.take()?.freeze();
        let key = archive_key(frozen.start_time, frozen.end_time);

        let archive_error = match self.write_archive(&key, &frozen).await {
            Ok(()) => None,
            Err(e) => {
                warn!(error = %e, archive_key = %key, "archive write failed; batch discarded");
                Some(e)
            }
        };

        let archive_path = archive_error.is_none().then_some(key);
        let summary = summarize(&frozen, archive_path);
        let summary_error = match self.summaries.write_summary(&summary).await {
            Ok(()) => None,
            Err(e) => {
                warn!(error = %e, "summary write failed; batch discarded");
                Some(e.to_string())
            }
        };

        if archive_error.is_none() && summary_error.is_none() {
            info!(
                start_time = summary.start_time,
                end_time = summary.end_time,
                total_records = summary.total_records,
                threat_count = summary.threat_count,
                unhealthy_count = summary.unhealthy_count,
                "batch flushed"
            );
        } else {
            debug!("batch flushed with sink errors");
        }

        Some(FlushReport {
            summary,
            archive_error,
            summary_error,
        })
    }

    async fn write_archive(&self, key: &str, batch: &FrozenBatch) -> Result<(), String> {
        let payload = serde_json::to_vec(batch.records()).map_err(|e| e.to_string())?;
        self.archive
            .put(key, Bytes::from(payload))
            .await
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_key_uses_unix_seconds() {
        assert_eq!(
            archive_key(1_700_000_000_123, 1_700_000_050_999),
            "telemetry/1700000000_to_1700000050.json"
        );
    }
}
