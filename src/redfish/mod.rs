// Management API transport: bounded-timeout GET/POST with typed decode at the boundary.
// No retries here; retry policy belongs to callers.

pub mod schema;

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("network error calling {url}: {message}")]
    Network { url: String, message: String },
    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: Value,
    },
    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl TransportError {
    /// Status recorded in the audit trail. Calls that never got a reply map to gateway codes.
    pub fn audit_status(&self) -> u16 {
        match self {
            TransportError::Timeout { .. } => 504,
            TransportError::Network { .. } | TransportError::Decode { .. } => 502,
            TransportError::Status { status, .. } => *status,
        }
    }

    /// Body to record as the upstream response.
    pub fn audit_response(&self) -> Value {
        match self {
            TransportError::Status { body, .. } => body.clone(),
            other => serde_json::json!({ "error": other.to_string() }),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> Result<Value, TransportError>;
    async fn post(
        &self,
        url: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<Value, TransportError>;
}

/// GET `url` and decode it into `T`; aggregator code never sees untyped JSON.
pub async fn fetch_typed<T: DeserializeOwned>(
    transport: &dyn Transport,
    url: &str,
    timeout: Duration,
) -> Result<T, TransportError> {
    let value = transport.get(url, timeout).await?;
    serde_json::from_value(value).map_err(|e| TransportError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}

/// reqwest-backed transport. Every request carries its own timeout.
pub struct RedfishClient {
    client: reqwest::Client,
}

impl RedfishClient {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(crate::version::user_agent())
            .build()?;
        Ok(Self { client })
    }

    async fn finish(
        &self,
        url: &str,
        sent: reqwest::Result<reqwest::Response>,
    ) -> Result<Value, TransportError> {
        let response = sent.map_err(|e| classify_reqwest_error(url, e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(url, e))?;
        if !status.is_success() {
            let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&text).map_err(|e| TransportError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

fn classify_reqwest_error(url: &str, e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else if e.is_decode() {
        TransportError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        }
    } else {
        TransportError::Network {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl Transport for RedfishClient {
    #[tracing::instrument(skip(self), fields(transport = "redfish", method = "GET"))]
    async fn get(&self, url: &str, timeout: Duration) -> Result<Value, TransportError> {
        let sent = self.client.get(url).timeout(timeout).send().await;
        self.finish(url, sent).await
    }

    #[tracing::instrument(skip(self, body), fields(transport = "redfish", method = "POST"))]
    async fn post(
        &self,
        url: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<Value, TransportError> {
        let sent = self
            .client
            .post(url)
            .json(body)
            .timeout(timeout)
            .send()
            .await;
        self.finish(url, sent).await
    }
}

/// URL builder for the Redfish chassis tree under `base_url` (e.g. `http://host/redfish/v1`).
#[derive(Debug, Clone)]
pub struct Endpoints {
    base_url: String,
}

impl Endpoints {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn chassis_collection(&self) -> String {
        format!("{}/Chassis", self.base_url)
    }

    pub fn thermal(&self, chassis_id: &str) -> String {
        format!("{}/Chassis/{}/Thermal", self.base_url, chassis_id)
    }

    pub fn power(&self, chassis_id: &str) -> String {
        format!("{}/Chassis/{}/Power", self.base_url, chassis_id)
    }

    pub fn voltages(&self, chassis_id: &str) -> String {
        format!("{}/Chassis/{}/Power/Voltages", self.base_url, chassis_id)
    }

    pub fn fans(&self, chassis_id: &str) -> String {
        format!("{}/Chassis/{}/Thermal/Fans", self.base_url, chassis_id)
    }

    pub fn voltage_thresholds(&self, chassis_id: &str) -> String {
        format!(
            "{}/Chassis/{}/Power/Voltages/Actions/Voltage.SetThresholds",
            self.base_url, chassis_id
        )
    }

    pub fn power_limit(&self, chassis_id: &str) -> String {
        format!(
            "{}/Chassis/{}/Power/Actions/Power.SetPowerLimit",
            self.base_url, chassis_id
        )
    }
}
