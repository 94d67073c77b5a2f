// Batch records and the summary derived from a flushed batch

use serde::{Deserialize, Serialize};
use wincode::{SchemaRead, SchemaWrite};

use super::{HealthAssessment, Snapshot};

/// One archived (snapshot, assessment) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub snapshot: Snapshot,
    pub assessment: HealthAssessment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SchemaRead, SchemaWrite)]
pub struct TimestampedReason {
    /// Unix milliseconds of the snapshot the reason came from.
    pub timestamp: u64,
    pub reason: String,
}

/// Written once per flushed batch. Times are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Archive key of the raw batch; None when the archive write failed.
    pub archive_path: Option<String>,
    pub start_time: i64,
    pub end_time: i64,
    pub total_records: u32,
    pub threat_count: u32,
    pub unhealthy_count: u32,
    pub healthy_count: u32,
    pub reasons: Vec<TimestampedReason>,
}
