// Actuation dispatcher: validate, make exactly one mutating call, audit the outcome.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::audit::AuditSink;
use crate::models::{ActionKind, ActionRequest, AuditRecord, ValidationError};
use crate::redfish::{Endpoints, Transport, TransportError};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid action: {0}")]
    InvalidAction(#[from] ValidationError),
    #[error("upstream actuation failed: {0}")]
    Upstream(#[source] TransportError),
}

/// The single POST a validated request maps to.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCall {
    pub endpoint: String,
    pub body: Value,
}

impl PlannedCall {
    pub fn for_request(endpoints: &Endpoints, request: &ActionRequest) -> Self {
        let id = request.chassis_id.as_str();
        match &request.action {
            ActionKind::Fan(p) => PlannedCall {
                endpoint: endpoints.fans(id),
                body: json!(p.fans),
            },
            ActionKind::Voltage(p) => PlannedCall {
                endpoint: endpoints.voltage_thresholds(id),
                body: json!({
                    "Name": p.name,
                    "UpperThresholdCritical": p.upper,
                    "LowerThresholdCritical": p.lower,
                }),
            },
            ActionKind::Power(p) => PlannedCall {
                endpoint: endpoints.power_limit(id),
                body: json!({ "LimitInWatts": p.limit }),
            },
        }
    }
}

pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
    audit: Arc<AuditSink>,
    actor: String,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoints: Endpoints,
        audit: Arc<AuditSink>,
        actor: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            endpoints,
            audit,
            actor: actor.into(),
            timeout,
        }
    }

    /// Rejected requests never reach the transport and leave no audit record. Every attempted
    /// call is audited (feed, then persisted log) before this returns.
    #[instrument(
        skip(self, request),
        fields(operation = "dispatch", action = request.action.type_name(), chassis_id = %request.chassis_id)
    )]
    pub async fn dispatch(&self, request: ActionRequest) -> Result<Value, DispatchError> {
        request.validate()?;
        let call = PlannedCall::for_request(&self.endpoints, &request);

        let result = self
            .transport
            .post(&call.endpoint, &call.body, self.timeout)
            .await;

        let (status, success, response) = match &result {
            Ok(body) => (200, true, body.clone()),
            Err(e) => (e.audit_status(), false, e.audit_response()),
        };
        self.audit
            .record_action(AuditRecord {
                actor: self.actor.clone(),
                endpoint: call.endpoint.clone(),
                method: "POST".to_string(),
                payload: call.body,
                response,
                status,
                success,
                timestamp: chrono::Utc::now().to_rfc3339(),
            })
            .await;

        match result {
            Ok(body) => {
                info!(endpoint = %call.endpoint, "actuation applied");
                Ok(with_summary(body, &request.summary))
            }
            Err(e) => {
                warn!(error = %e, endpoint = %call.endpoint, "actuation failed");
                Err(DispatchError::Upstream(e))
            }
        }
    }
}

/// Upstream response plus the request's human-readable summary.
fn with_summary(body: Value, summary: &str) -> Value {
    match body {
        Value::Object(mut map) => {
            map.insert("action_summary".to_string(), Value::String(summary.to_string()));
            Value::Object(map)
        }
        other => json!({ "response": other, "action_summary": summary }),
    }
}
