// Audit records and live-feed log entries

use serde::{Deserialize, Serialize};

use super::{HealthAssessment, HealthStatus};

/// One attempted mutating call, success or failure. Never edited after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub actor: String,
    pub endpoint: String,
    pub method: String,
    pub payload: serde_json::Value,
    pub response: serde_json::Value,
    /// HTTP status of the upstream reply; a synthetic 502/504 when none arrived.
    pub status: u16,
    pub success: bool,
    /// RFC 3339, UTC.
    pub timestamp: String,
}

/// A non-healthy classification, published so operators see threats as they happen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthEvent {
    /// Unix milliseconds of the classified snapshot.
    pub timestamp: u64,
    pub status: HealthStatus,
    pub reasons: Vec<String>,
}

impl HealthEvent {
    pub fn from_assessment(timestamp: u64, assessment: &HealthAssessment) -> Self {
        Self {
            timestamp,
            status: assessment.status,
            reasons: assessment.reasons.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LogEntry {
    Action(AuditRecord),
    Health(HealthEvent),
}
