// Point-in-time chassis readings

use serde::{Deserialize, Serialize};

use super::{FanReading, SensorReading};

pub type ChassisId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChassisSnapshot {
    pub chassis_id: ChassisId,
    pub temperatures: Vec<SensorReading>,
    pub voltages: Vec<SensorReading>,
    pub fans: Vec<FanReading>,
    /// Total consumption from PowerControl[0]; None when the chassis did not report it.
    pub power_total: Option<f64>,
    pub power_limit: Option<f64>,
    pub power_supplies: Vec<SensorReading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_error: Option<String>,
}

impl ChassisSnapshot {
    pub fn empty(chassis_id: impl Into<ChassisId>) -> Self {
        Self {
            chassis_id: chassis_id.into(),
            temperatures: vec![],
            voltages: vec![],
            fans: vec![],
            power_total: None,
            power_limit: None,
            power_supplies: vec![],
            fetch_error: None,
        }
    }

    /// A chassis whose fetch failed: no readings, only the error.
    pub fn failed(chassis_id: impl Into<ChassisId>, error: impl Into<String>) -> Self {
        Self {
            fetch_error: Some(error.into()),
            ..Self::empty(chassis_id)
        }
    }

    pub fn reading_count(&self) -> usize {
        self.temperatures.len()
            + self.voltages.len()
            + self.power_supplies.len()
            + usize::from(self.power_total.is_some())
    }
}

/// One tick's aggregate. `timestamp` is unix milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub timestamp: u64,
    pub chassis: Vec<ChassisSnapshot>,
}

impl Snapshot {
    pub fn failed_chassis(&self) -> impl Iterator<Item = &ChassisSnapshot> {
        self.chassis.iter().filter(|c| c.fetch_error.is_some())
    }
}
