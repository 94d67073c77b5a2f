// Domain models: readings, snapshots, health, batches, actions, audit

mod action;
mod audit;
mod batch;
mod health;
mod sensor;
mod snapshot;

pub use action::{
    ActionKind, ActionRequest, DEFAULT_CHASSIS_ID, FanParams, POWER_LIMIT_MAX, POWER_LIMIT_MIN,
    PowerParams, ValidationError, VoltageParams,
};
pub use audit::{AuditRecord, HealthEvent, LogEntry};
pub use batch::{BatchRecord, BatchSummary, TimestampedReason};
pub use health::{HealthAssessment, HealthStatus};
pub use sensor::{FanReading, SensorKind, SensorReading};
pub use snapshot::{ChassisId, ChassisSnapshot, Snapshot};
