// Classified health of one snapshot

use serde::{Deserialize, Serialize};

/// Ordered by severity: `Healthy < Unhealthy < Threat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Threat,
}

impl HealthStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Threat => "threat",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthAssessment {
    pub status: HealthStatus,
    pub reasons: Vec<String>,
}

impl HealthAssessment {
    pub fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            reasons: vec![],
        }
    }
}
