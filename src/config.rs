use std::str::FromStr;

use serde::Deserialize;

use crate::classifier::Thresholds;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub redfish: RedfishConfig,
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub thresholds: Thresholds,
    pub storage: StorageConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedfishConfig {
    /// e.g. "http://localhost:8001/redfish/v1"
    pub base_url: String,
    /// Per-call timeout for subsystem fetches and actuation.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Timeout for the chassis listing call.
    #[serde(default = "default_list_timeout_ms")]
    pub list_timeout_ms: u64,
    #[serde(default = "default_max_concurrent_chassis")]
    pub max_concurrent_chassis: usize,
    #[serde(default = "default_max_concurrent_subsystems")]
    pub max_concurrent_subsystems: usize,
    /// Recorded as the actor on every audit record.
    #[serde(default = "default_actor")]
    pub actor: String,
}

fn default_request_timeout_ms() -> u64 {
    3000
}

fn default_list_timeout_ms() -> u64 {
    2000
}

fn default_max_concurrent_chassis() -> usize {
    5
}

fn default_max_concurrent_subsystems() -> usize {
    3
}

fn default_actor() -> String {
    "agent".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub probe_interval_ms: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// How often the scheduler logs app stats at INFO level.
    pub stats_log_interval_secs: u64,
}

fn default_batch_size() -> usize {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub database_path: String,
    /// Root directory of the telemetry archive.
    pub archive_dir: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
    /// Cron expression (sec min hour dom mon dow) for VACUUM; overrides vacuum_interval_secs.
    pub vacuum_schedule: Option<String>,
    #[serde(default = "default_vacuum_interval_secs")]
    pub vacuum_interval_secs: u64,
}

fn default_retention_days() -> u32 {
    30
}

fn default_prune_interval_secs() -> u64 {
    3600
}

fn default_vacuum_interval_secs() -> u64 {
    86_400
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Entries kept for the live feed; oldest evicted first.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// How often each live-feed subscriber is polled (and sent a keep-alive when idle).
    #[serde(default = "default_feed_poll_interval_ms")]
    pub feed_poll_interval_ms: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            feed_poll_interval_ms: default_feed_poll_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Seeded into the users table at startup.
    #[serde(default)]
    pub users: Vec<UserEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserEntry {
    pub user_id: String,
    /// Lowercase hex SHA-256 of "<user_id>:<password>".
    pub password_sha256: String,
}

fn default_buffer_capacity() -> usize {
    1000
}

fn default_feed_poll_interval_ms() -> u64 {
    500
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            self.redfish.base_url.starts_with("http://")
                || self.redfish.base_url.starts_with("https://"),
            "redfish.base_url must be an http(s) URL, got {:?}",
            self.redfish.base_url
        );
        anyhow::ensure!(
            self.redfish.request_timeout_ms > 0,
            "redfish.request_timeout_ms must be > 0, got {}",
            self.redfish.request_timeout_ms
        );
        anyhow::ensure!(
            self.redfish.list_timeout_ms > 0,
            "redfish.list_timeout_ms must be > 0, got {}",
            self.redfish.list_timeout_ms
        );
        anyhow::ensure!(
            self.redfish.max_concurrent_chassis > 0,
            "redfish.max_concurrent_chassis must be > 0, got {}",
            self.redfish.max_concurrent_chassis
        );
        anyhow::ensure!(
            (1..=3).contains(&self.redfish.max_concurrent_subsystems),
            "redfish.max_concurrent_subsystems must be 1-3, got {}",
            self.redfish.max_concurrent_subsystems
        );
        anyhow::ensure!(
            self.monitoring.probe_interval_ms > 0,
            "monitoring.probe_interval_ms must be > 0, got {}",
            self.monitoring.probe_interval_ms
        );
        anyhow::ensure!(
            self.monitoring.batch_size > 0,
            "monitoring.batch_size must be > 0, got {}",
            self.monitoring.batch_size
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        let t = &self.thresholds;
        anyhow::ensure!(
            t.temperature_elevated < t.temperature_too_high,
            "thresholds.temperature_elevated ({}) must be below thresholds.temperature_too_high ({})",
            t.temperature_elevated,
            t.temperature_too_high
        );
        anyhow::ensure!(
            t.power_elevated < t.power_critical,
            "thresholds.power_elevated ({}) must be below thresholds.power_critical ({})",
            t.power_elevated,
            t.power_critical
        );
        anyhow::ensure!(
            !self.storage.database_path.is_empty(),
            "storage.database_path must be non-empty"
        );
        anyhow::ensure!(
            !self.storage.archive_dir.is_empty(),
            "storage.archive_dir must be non-empty"
        );
        anyhow::ensure!(
            self.storage.retention_days > 0,
            "storage.retention_days must be > 0, got {}",
            self.storage.retention_days
        );
        anyhow::ensure!(
            self.storage.prune_interval_secs > 0,
            "storage.prune_interval_secs must be > 0, got {}",
            self.storage.prune_interval_secs
        );
        if let Some(expr) = &self.storage.vacuum_schedule {
            cron::Schedule::from_str(expr).map_err(|e| {
                anyhow::anyhow!("storage.vacuum_schedule {:?} is not a valid cron expression: {}", expr, e)
            })?;
        }
        anyhow::ensure!(
            self.storage.vacuum_interval_secs > 0,
            "storage.vacuum_interval_secs must be > 0, got {}",
            self.storage.vacuum_interval_secs
        );
        anyhow::ensure!(
            self.audit.buffer_capacity > 0,
            "audit.buffer_capacity must be > 0, got {}",
            self.audit.buffer_capacity
        );
        anyhow::ensure!(
            self.audit.feed_poll_interval_ms > 0,
            "audit.feed_poll_interval_ms must be > 0, got {}",
            self.audit.feed_poll_interval_ms
        );
        for user in &self.auth.users {
            anyhow::ensure!(
                !user.user_id.trim().is_empty(),
                "auth.users user_id must be non-empty"
            );
            anyhow::ensure!(
                crate::auth::is_digest(&user.password_sha256),
                "auth.users password_sha256 for {:?} must be 64 lowercase hex characters",
                user.user_id
            );
        }
        Ok(())
    }
}
