// Resource aggregator: list chassis, fan out thermal/power/voltage per chassis, fan in one Snapshot.
// Per-call failures are isolated to their chassis; collect_snapshot never fails.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{StreamExt, stream};
use tracing::{debug, instrument, warn};

use crate::models::{ChassisSnapshot, Snapshot};
use crate::redfish::schema::{ChassisCollection, PowerResource, ThermalResource, VoltagesResource};
use crate::redfish::{Endpoints, Transport, TransportError, fetch_typed};

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// How many chassis are fetched concurrently.
    pub max_concurrent_chassis: usize,
    /// How many of the three subsystem calls run concurrently per chassis.
    pub max_concurrent_subsystems: usize,
    pub list_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_chassis: 5,
            max_concurrent_subsystems: 3,
            list_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Subsystem {
    Thermal,
    Power,
    Voltages,
}

impl Subsystem {
    const ALL: [Subsystem; 3] = [Subsystem::Thermal, Subsystem::Power, Subsystem::Voltages];

    fn label(self) -> &'static str {
        match self {
            Subsystem::Thermal => "thermal",
            Subsystem::Power => "power",
            Subsystem::Voltages => "voltages",
        }
    }
}

enum SubsystemData {
    Thermal(ThermalResource),
    Power(PowerResource),
    Voltages(VoltagesResource),
}

pub struct Aggregator {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
    config: AggregatorConfig,
}

impl Aggregator {
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoints: Endpoints,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            transport,
            endpoints,
            config,
        }
    }

    /// One point-in-time reading across every listed chassis. An empty or failed listing
    /// yields a snapshot with no chassis.
    #[instrument(skip(self), fields(operation = "collect_snapshot"))]
    pub async fn collect_snapshot(&self) -> Snapshot {
        let timestamp = now_ms();
        let ids = match self.list_chassis().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, operation = "list_chassis", "chassis listing failed");
                Vec::new()
            }
        };

        let chassis: Vec<ChassisSnapshot> = stream::iter(ids)
            .map(|id| self.collect_chassis(id))
            .buffered(self.config.max_concurrent_chassis.max(1))
            .collect()
            .await;

        let failed = chassis.iter().filter(|c| c.fetch_error.is_some()).count();
        debug!(
            chassis_count = chassis.len(),
            failed_count = failed,
            "snapshot collected"
        );
        Snapshot { timestamp, chassis }
    }

    async fn list_chassis(&self) -> Result<Vec<String>, TransportError> {
        let collection: ChassisCollection = fetch_typed(
            self.transport.as_ref(),
            &self.endpoints.chassis_collection(),
            self.config.list_timeout,
        )
        .await?;
        Ok(collection.chassis_ids())
    }

    /// Runs all three subsystem calls to completion; any failure blanks this chassis only.
    async fn collect_chassis(&self, chassis_id: String) -> ChassisSnapshot {
        let id = chassis_id.as_str();
        let results: Vec<(Subsystem, Result<SubsystemData, TransportError>)> =
            stream::iter(Subsystem::ALL)
                .map(|s| async move { (s, self.fetch_subsystem(id, s).await) })
                .buffered(self.config.max_concurrent_subsystems.max(1))
                .collect()
                .await;

        let mut out = ChassisSnapshot::empty(chassis_id.as_str());
        let mut errors = Vec::new();
        for (subsystem, result) in results {
            match result {
                Ok(SubsystemData::Thermal(t)) => {
                    out.temperatures = t.temperature_readings();
                    out.fans = t.fan_readings();
                }
                Ok(SubsystemData::Power(p)) => {
                    out.power_total = p.total_watts();
                    out.power_limit = p.limit_watts();
                    out.power_supplies = p.supply_readings();
                }
                Ok(SubsystemData::Voltages(v)) => {
                    out.voltages = v.readings();
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        chassis_id = %chassis_id,
                        subsystem = subsystem.label(),
                        "subsystem fetch failed"
                    );
                    errors.push(format!("{}: {}", subsystem.label(), e));
                }
            }
        }

        if errors.is_empty() {
            out
        } else {
            ChassisSnapshot::failed(chassis_id, errors.join("; "))
        }
    }

    async fn fetch_subsystem(
        &self,
        chassis_id: &str,
        subsystem: Subsystem,
    ) -> Result<SubsystemData, TransportError> {
        let transport = self.transport.as_ref();
        let timeout = self.config.request_timeout;
        match subsystem {
            Subsystem::Thermal => {
                fetch_typed(transport, &self.endpoints.thermal(chassis_id), timeout)
                    .await
                    .map(SubsystemData::Thermal)
            }
            Subsystem::Power => fetch_typed(transport, &self.endpoints.power(chassis_id), timeout)
                .await
                .map(SubsystemData::Power),
            Subsystem::Voltages => {
                fetch_typed(transport, &self.endpoints.voltages(chassis_id), timeout)
                    .await
                    .map(SubsystemData::Voltages)
            }
        }
    }
}

pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_else(|e| {
            warn!(error = %e, operation = "get_timestamp", "system time error");
            0
        })
}
