// Sensor readings decoded from the management API

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Temperature,
    Voltage,
    Power,
}

impl SensorKind {
    pub fn unit(self) -> &'static str {
        match self {
            SensorKind::Temperature => "°C",
            SensorKind::Voltage => "V",
            SensorKind::Power => "W",
        }
    }
}

/// One immutable sensor value. Thresholds are whatever the chassis reported, if anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub kind: SensorKind,
    pub warning_threshold: Option<f64>,
    pub critical_threshold: Option<f64>,
}

impl SensorReading {
    pub fn new(kind: SensorKind, name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            unit: kind.unit().to_string(),
            kind,
            warning_threshold: None,
            critical_threshold: None,
        }
    }

    pub fn with_thresholds(mut self, warning: Option<f64>, critical: Option<f64>) -> Self {
        self.warning_threshold = warning;
        self.critical_threshold = critical;
        self
    }
}

/// Fan speed as reported by the Thermal resource. Carried for display, never classified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FanReading {
    pub name: String,
    pub reading: f64,
    pub units: String,
}
