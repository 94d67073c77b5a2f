// Rule-based health classifier. Pure: the same snapshot and thresholds always give the same result.

use serde::Deserialize;

use crate::models::{ChassisSnapshot, HealthAssessment, HealthStatus, SensorReading, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub temperature_elevated: f64,
    pub temperature_too_high: f64,
    pub voltage_too_high: f64,
    pub power_elevated: f64,
    pub power_critical: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            temperature_elevated: 80.0,
            temperature_too_high: 90.0,
            voltage_too_high: 1.6,
            power_elevated: 50.0,
            power_critical: 80.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Severity {
    Lesser,
    Critical,
}

struct Finding {
    severity: Severity,
    message: String,
}

/// Reasons are ordered chassis, then sensor, then metric (temperatures, voltages, total power,
/// supplies). Any critical finding makes the snapshot a threat.
pub fn classify(snapshot: &Snapshot, thresholds: &Thresholds) -> HealthAssessment {
    let findings: Vec<Finding> = snapshot
        .chassis
        .iter()
        .flat_map(|c| chassis_findings(c, thresholds))
        .collect();

    let status = match findings.iter().map(|f| f.severity).max() {
        Some(Severity::Critical) => HealthStatus::Threat,
        Some(Severity::Lesser) => HealthStatus::Unhealthy,
        None => HealthStatus::Healthy,
    };
    HealthAssessment {
        status,
        reasons: findings.into_iter().map(|f| f.message).collect(),
    }
}

fn chassis_findings(chassis: &ChassisSnapshot, t: &Thresholds) -> Vec<Finding> {
    let id = chassis.chassis_id.as_str();
    let mut out = Vec::new();

    for reading in &chassis.temperatures {
        let label = qualified(id, &reading.name);
        if reading.value > t.temperature_too_high {
            out.push(critical(format!(
                "Temperature too high on '{}' ({}°C > {}°C)",
                label, reading.value, t.temperature_too_high
            )));
        } else if reading.value > t.temperature_elevated {
            out.push(lesser(format!(
                "Temperature elevated on '{}' ({}°C > {}°C)",
                label, reading.value, t.temperature_elevated
            )));
        }
    }

    for reading in &chassis.voltages {
        if reading.value > t.voltage_too_high {
            out.push(critical(format!(
                "Voltage too high on '{}' ({}V > {}V)",
                qualified(id, &reading.name),
                reading.value,
                t.voltage_too_high
            )));
        }
    }

    if let Some(total) = chassis.power_total {
        out.extend(power_finding(id, total, t));
    }
    out.extend(
        chassis
            .power_supplies
            .iter()
            .filter_map(|s: &SensorReading| power_finding(&qualified(id, &s.name), s.value, t)),
    );
    out
}

fn power_finding(label: &str, watts: f64, t: &Thresholds) -> Option<Finding> {
    if watts > t.power_critical {
        Some(critical(format!(
            "Power draw is critical on '{}' ({}W > {}W)",
            label, watts, t.power_critical
        )))
    } else if watts > t.power_elevated {
        Some(lesser(format!(
            "Power draw is elevated on '{}' ({}W > {}W)",
            label, watts, t.power_elevated
        )))
    } else {
        None
    }
}

fn qualified(chassis_id: &str, sensor: &str) -> String {
    format!("{}:{}", chassis_id, sensor)
}

fn critical(message: String) -> Finding {
    Finding {
        severity: Severity::Critical,
        message,
    }
}

fn lesser(message: String) -> Finding {
    Finding {
        severity: Severity::Lesser,
        message,
    }
}
