// Gauge registry for the pull-model metrics endpoint: current/min/max per (chassis, sensor) for
// temperature, voltage and power, plus chassis_up. Min/max are tracked since process start.
// While a chassis fails to fetch, its current-value series are withdrawn; min/max stay.

use std::collections::HashSet;
use std::sync::Mutex;

use prometheus::{GaugeVec, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::models::Snapshot;

/// Name used for the chassis-wide power total.
pub const TOTAL_POWER_SENSOR: &str = "total";

const LABELS: [&str; 2] = ["chassis", "sensor"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Metric {
    Temperature,
    Voltage,
    Power,
}

/// current, _min and _max series for one metric.
struct GaugeSet {
    current: GaugeVec,
    min: GaugeVec,
    max: GaugeVec,
}

impl GaugeSet {
    fn register(registry: &Registry, name: &str, help: &str) -> prometheus::Result<Self> {
        let make = |suffix: &str, what: &str| -> prometheus::Result<GaugeVec> {
            let g = GaugeVec::new(
                Opts::new(format!("{}{}", name, suffix), format!("{}{}", help, what)),
                &LABELS,
            )?;
            registry.register(Box::new(g.clone()))?;
            Ok(g)
        };
        Ok(Self {
            current: make("", "")?,
            min: make("_min", " (minimum seen)")?,
            max: make("_max", " (maximum seen)")?,
        })
    }

    fn withdraw(&self, chassis: &str, sensor: &str) {
        // Already withdrawn on an earlier failed fetch when this errors.
        self.current.remove_label_values(&[chassis, sensor]).ok();
    }

    fn set(&self, chassis: &str, sensor: &str, value: f64, first: bool) {
        let labels = [chassis, sensor];
        self.current.with_label_values(&labels).set(value);
        let min = self.min.with_label_values(&labels);
        let max = self.max.with_label_values(&labels);
        if first {
            min.set(value);
            max.set(value);
        } else {
            min.set(min.get().min(value));
            max.set(max.get().max(value));
        }
    }
}

pub struct MetricsRegistry {
    registry: Registry,
    temperature: GaugeSet,
    voltage: GaugeSet,
    power: GaugeSet,
    up: IntGaugeVec,
    seen: Mutex<HashSet<(Metric, String, String)>>,
}

impl MetricsRegistry {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let temperature = GaugeSet::register(
            &registry,
            "chassis_temperature_celsius",
            "Chassis temperature sensor reading",
        )?;
        let voltage =
            GaugeSet::register(&registry, "chassis_voltage_volts", "Chassis voltage rail reading")?;
        let power = GaugeSet::register(
            &registry,
            "chassis_power_watts",
            "Chassis power consumption (total and per supply)",
        )?;
        let up = IntGaugeVec::new(
            Opts::new("chassis_up", "Whether the last fetch of the chassis succeeded"),
            &["chassis"],
        )?;
        registry.register(Box::new(up.clone()))?;
        Ok(Self {
            registry,
            temperature,
            voltage,
            power,
            up,
            seen: Mutex::new(HashSet::new()),
        })
    }

    fn gauges(&self, metric: Metric) -> &GaugeSet {
        match metric {
            Metric::Temperature => &self.temperature,
            Metric::Voltage => &self.voltage,
            Metric::Power => &self.power,
        }
    }

    /// Fold a fresh snapshot into the gauges.
    pub fn observe(&self, snapshot: &Snapshot) {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        for chassis in &snapshot.chassis {
            let id = chassis.chassis_id.as_str();
            self.up
                .with_label_values(&[id])
                .set(i64::from(chassis.fetch_error.is_none()));
            if chassis.fetch_error.is_some() {
                for (metric, _, sensor) in seen.iter().filter(|(_, c, _)| c == id) {
                    self.gauges(*metric).withdraw(id, sensor);
                }
                continue;
            }

            let readings = chassis
                .temperatures
                .iter()
                .map(|r| (Metric::Temperature, r.name.as_str(), r.value))
                .chain(
                    chassis
                        .voltages
                        .iter()
                        .map(|r| (Metric::Voltage, r.name.as_str(), r.value)),
                )
                .chain(
                    chassis
                        .power_total
                        .map(|w| (Metric::Power, TOTAL_POWER_SENSOR, w)),
                )
                .chain(
                    chassis
                        .power_supplies
                        .iter()
                        .map(|r| (Metric::Power, r.name.as_str(), r.value)),
                );
            for (metric, sensor, value) in readings {
                let first = seen.insert((metric, id.to_string(), sensor.to_string()));
                self.gauges(metric).set(id, sensor, value, first);
            }
        }
    }

    /// Prometheus text exposition of every registered series.
    pub fn render(&self) -> prometheus::Result<String> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChassisSnapshot, SensorKind, SensorReading};

    fn snapshot(cpu: f64) -> Snapshot {
        let mut c = ChassisSnapshot::empty("Chassis-1");
        c.temperatures
            .push(SensorReading::new(SensorKind::Temperature, "CPU Temp", cpu));
        c.power_total = Some(120.0);
        Snapshot {
            timestamp: 0,
            chassis: vec![c, ChassisSnapshot::failed("Chassis-2", "timeout")],
        }
    }

    #[test]
    fn tracks_current_min_max() {
        let registry = MetricsRegistry::new().unwrap();
        registry.observe(&snapshot(70.0));
        registry.observe(&snapshot(50.0));
        registry.observe(&snapshot(60.0));
        let text = registry.render().unwrap();
        assert!(text.contains("chassis_temperature_celsius{chassis=\"Chassis-1\",sensor=\"CPU Temp\"} 60"));
        assert!(text.contains("chassis_temperature_celsius_min{chassis=\"Chassis-1\",sensor=\"CPU Temp\"} 50"));
        assert!(text.contains("chassis_temperature_celsius_max{chassis=\"Chassis-1\",sensor=\"CPU Temp\"} 70"));
        assert!(text.contains("chassis_power_watts{chassis=\"Chassis-1\",sensor=\"total\"} 120"));
        assert!(text.contains("chassis_up{chassis=\"Chassis-2\"} 0"));
        assert!(!text.contains("chassis_voltage_volts{"));
    }

    #[test]
    fn failed_fetch_withdraws_current_values_until_recovery() {
        let registry = MetricsRegistry::new().unwrap();
        registry.observe(&snapshot(70.0));
        let failed = Snapshot {
            timestamp: 1,
            chassis: vec![ChassisSnapshot::failed("Chassis-1", "power: timeout")],
        };
        registry.observe(&failed);
        registry.observe(&failed);

        let text = registry.render().unwrap();
        assert!(!text.contains("chassis_temperature_celsius{chassis=\"Chassis-1\""));
        assert!(!text.contains("chassis_power_watts{chassis=\"Chassis-1\""));
        assert!(text.contains("chassis_temperature_celsius_max{chassis=\"Chassis-1\",sensor=\"CPU Temp\"} 70"));
        assert!(text.contains("chassis_up{chassis=\"Chassis-1\"} 0"));

        registry.observe(&snapshot(65.0));
        let text = registry.render().unwrap();
        assert!(text.contains("chassis_temperature_celsius{chassis=\"Chassis-1\",sensor=\"CPU Temp\"} 65"));
        assert!(text.contains("chassis_temperature_celsius_min{chassis=\"Chassis-1\",sensor=\"CPU Temp\"} 65"));
        assert!(text.contains("chassis_up{chassis=\"Chassis-1\"} 1"));
    }
}
