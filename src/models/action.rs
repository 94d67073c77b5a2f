// Actuation requests: a sum type keyed by `type`, validated before dispatch

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ChassisId;

pub const DEFAULT_CHASSIS_ID: &str = "Chassis-1";
pub const POWER_LIMIT_MIN: i64 = 50;
pub const POWER_LIMIT_MAX: i64 = 1000;
const FAN_PERCENT_MAX: i64 = 100;
const KNOWN_TYPES: [&str; 3] = ["fan", "voltage", "power"];

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("unknown action type '{0}', expected one of fan, voltage, power")]
    UnknownType(String),
    #[error("malformed action request: {0}")]
    Malformed(String),
    #[error("invalid chassis id '{0}'")]
    InvalidChassisId(String),
    #[error("fan action must name at least one fan")]
    NoFans,
    #[error("fan speed for '{fan}' must be 0-100, got {speed}")]
    FanSpeedOutOfRange { fan: String, speed: i64 },
    #[error("voltage action requires a rail name")]
    EmptyRailName,
    #[error("voltage thresholds invalid: upper {upper} must be finite and above lower {lower}")]
    InvalidThresholds { upper: f64, lower: f64 },
    #[error("power limit must be 50-1000 W, got {0}")]
    PowerLimitOutOfRange(i64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanParams {
    /// Fan name -> speed percent.
    pub fans: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoltageParams {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "Upper")]
    pub upper: f64,
    #[serde(alias = "Lower")]
    pub lower: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerParams {
    #[serde(alias = "Limit")]
    pub limit: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ActionKind {
    Fan(FanParams),
    Voltage(VoltageParams),
    Power(PowerParams),
}

impl ActionKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ActionKind::Fan(_) => "fan",
            ActionKind::Voltage(_) => "voltage",
            ActionKind::Power(_) => "power",
        }
    }
}

fn default_chassis_id() -> ChassisId {
    DEFAULT_CHASSIS_ID.to_string()
}

/// Wire shape: `{"type": "power", "data": {"limit": 450}, "chassis_id": "...", "action_summary": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    #[serde(flatten)]
    pub action: ActionKind,
    #[serde(default = "default_chassis_id")]
    pub chassis_id: ChassisId,
    #[serde(rename = "action_summary", alias = "summary", default)]
    pub summary: String,
}

impl ActionRequest {
    pub fn new(
        action: ActionKind,
        chassis_id: impl Into<ChassisId>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            action,
            chassis_id: chassis_id.into(),
            summary: summary.into(),
        }
    }

    /// Decode an untyped decision and validate it. An unknown `type` is reported as such
    /// rather than as a generic decode failure.
    pub fn from_json(value: serde_json::Value) -> Result<Self, ValidationError> {
        match value.get("type") {
            Some(serde_json::Value::String(t)) if !KNOWN_TYPES.contains(&t.as_str()) => {
                return Err(ValidationError::UnknownType(t.clone()));
            }
            Some(serde_json::Value::String(_)) => {}
            Some(other) => return Err(ValidationError::UnknownType(other.to_string())),
            None => return Err(ValidationError::Malformed("missing field `type`".into())),
        }
        let request: ActionRequest = serde_json::from_value(value)
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.chassis_id.trim().is_empty()
            || self
                .chassis_id
                .chars()
                .any(|c| matches!(c, '/' | '?' | '#') || c.is_whitespace())
        {
            return Err(ValidationError::InvalidChassisId(self.chassis_id.clone()));
        }
        match &self.action {
            ActionKind::Fan(p) => {
                if p.fans.is_empty() {
                    return Err(ValidationError::NoFans);
                }
                if let Some((fan, speed)) = p
                    .fans
                    .iter()
                    .find(|(_, speed)| !(0..=FAN_PERCENT_MAX).contains(*speed))
                {
                    return Err(ValidationError::FanSpeedOutOfRange {
                        fan: fan.clone(),
                        speed: *speed,
                    });
                }
            }
            ActionKind::Voltage(p) => {
                if p.name.trim().is_empty() {
                    return Err(ValidationError::EmptyRailName);
                }
                if !p.upper.is_finite() || !p.lower.is_finite() || p.upper <= p.lower {
                    return Err(ValidationError::InvalidThresholds {
                        upper: p.upper,
                        lower: p.lower,
                    });
                }
            }
            ActionKind::Power(p) => {
                if !(POWER_LIMIT_MIN..=POWER_LIMIT_MAX).contains(&p.limit) {
                    return Err(ValidationError::PowerLimitOutOfRange(p.limit));
                }
            }
        }
        Ok(())
    }
}
