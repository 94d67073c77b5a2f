// Typed Redfish resources. Only the fields the monitor reads are modelled; unknown fields are ignored.

use serde::Deserialize;

use crate::models::{FanReading, SensorKind, SensorReading};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChassisCollection {
    #[serde(default)]
    pub members: Vec<ChassisMember>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChassisMember {
    #[serde(rename = "Id")]
    pub id: Option<String>,
    #[serde(rename = "@odata.id")]
    pub odata_id: Option<String>,
}

impl ChassisMember {
    /// `Id`, else the last segment of `@odata.id`.
    pub fn chassis_id(&self) -> Option<String> {
        if let Some(id) = self.id.as_deref().filter(|id| !id.is_empty()) {
            return Some(id.to_string());
        }
        self.odata_id
            .as_deref()
            .and_then(|p| p.trim_end_matches('/').rsplit('/').next())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

impl ChassisCollection {
    pub fn chassis_ids(&self) -> Vec<String> {
        self.members
            .iter()
            .filter_map(ChassisMember::chassis_id)
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ThermalResource {
    #[serde(default)]
    pub temperatures: Vec<TemperatureSensor>,
    #[serde(default)]
    pub fans: Vec<Fan>,
    pub thermal_policy: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemperatureSensor {
    pub name: String,
    pub reading_celsius: Option<f64>,
    pub upper_threshold_non_critical: Option<f64>,
    pub upper_threshold_critical: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Fan {
    pub name: String,
    pub reading: Option<f64>,
    pub units: Option<String>,
}

impl ThermalResource {
    pub fn temperature_readings(&self) -> Vec<SensorReading> {
        self.temperatures
            .iter()
            .filter_map(|t| {
                let value = t.reading_celsius?;
                Some(
                    SensorReading::new(SensorKind::Temperature, &t.name, value).with_thresholds(
                        t.upper_threshold_non_critical,
                        t.upper_threshold_critical,
                    ),
                )
            })
            .collect()
    }

    pub fn fan_readings(&self) -> Vec<FanReading> {
        self.fans
            .iter()
            .filter_map(|f| {
                Some(FanReading {
                    name: f.name.clone(),
                    reading: f.reading?,
                    units: f.units.clone().unwrap_or_else(|| "Percent".to_string()),
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PowerResource {
    #[serde(default)]
    pub power_control: Vec<PowerControl>,
    #[serde(default)]
    pub power_supplies: Vec<PowerSupply>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PowerControl {
    pub power_consumed_watts: Option<f64>,
    pub power_limit: Option<PowerLimit>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PowerLimit {
    pub limit_in_watts: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PowerSupply {
    pub name: String,
    pub power_output_watts: Option<f64>,
    pub last_power_output_watts: Option<f64>,
}

impl PowerResource {
    pub fn total_watts(&self) -> Option<f64> {
        self.power_control.first()?.power_consumed_watts
    }

    pub fn limit_watts(&self) -> Option<f64> {
        self.power_control
            .first()?
            .power_limit
            .as_ref()?
            .limit_in_watts
    }

    /// Supplies that report an output wattage; the rest carry no power reading.
    pub fn supply_readings(&self) -> Vec<SensorReading> {
        self.power_supplies
            .iter()
            .filter_map(|s| {
                let watts = s.power_output_watts.or(s.last_power_output_watts)?;
                Some(SensorReading::new(SensorKind::Power, &s.name, watts))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VoltagesResource {
    #[serde(default)]
    pub voltages: Vec<VoltageRail>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VoltageRail {
    pub name: String,
    pub reading_volts: Option<f64>,
    pub upper_threshold_critical: Option<f64>,
    pub lower_threshold_critical: Option<f64>,
}

impl VoltagesResource {
    pub fn readings(&self) -> Vec<SensorReading> {
        self.voltages
            .iter()
            .filter_map(|v| {
                let value = v.reading_volts?;
                Some(
                    SensorReading::new(SensorKind::Voltage, &v.name, value)
                        .with_thresholds(None, v.upper_threshold_critical),
                )
            })
            .collect()
    }
}
