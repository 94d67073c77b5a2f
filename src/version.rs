// Build-time identity, reported by GET /version and the Redfish client's User-Agent

/// Package version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name (from Cargo.toml).
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// "chassiswatch/0.3.0"
pub fn user_agent() -> String {
    format!("{}/{}", NAME, VERSION)
}
