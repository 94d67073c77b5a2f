// Shared test helpers: snapshot builders, scripted transport, in-memory sinks, mock BMC server

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use bytes::Bytes;
use chassiswatch::audit::AuditStore;
use chassiswatch::auth::{CredentialStore, User, password_digest};
use chassiswatch::models::*;
use chassiswatch::redfish::{Transport, TransportError};
use chassiswatch::sinks::{ArchiveSink, SinkError, SummarySink};
use serde_json::{Value, json};

pub const BASE_URL: &str = "http://bmc.test/redfish/v1";

// ---- snapshot builders ----

pub fn temp(name: &str, value: f64) -> SensorReading {
    SensorReading::new(SensorKind::Temperature, name, value)
}

pub fn volt(name: &str, value: f64) -> SensorReading {
    SensorReading::new(SensorKind::Voltage, name, value)
}

pub fn chassis(id: &str, temperatures: Vec<SensorReading>, power_total: Option<f64>) -> ChassisSnapshot {
    ChassisSnapshot {
        temperatures,
        power_total,
        ..ChassisSnapshot::empty(id)
    }
}

pub fn snapshot(timestamp: u64, chassis: Vec<ChassisSnapshot>) -> Snapshot {
    Snapshot { timestamp, chassis }
}

/// One chassis, 40°C CPU, 30 W draw.
pub fn healthy_snapshot(timestamp: u64) -> Snapshot {
    snapshot(
        timestamp,
        vec![chassis("Chassis-1", vec![temp("CPU", 40.0)], Some(30.0))],
    )
}

// ---- Redfish payloads ----

pub fn collection(ids: &[&str]) -> Value {
    let members: Vec<Value> = ids
        .iter()
        .map(|id| json!({ "@odata.id": format!("/redfish/v1/Chassis/{}", id), "Id": id }))
        .collect();
    json!({ "Members": members, "Members@odata.count": ids.len() })
}

pub fn thermal(cpu_celsius: f64) -> Value {
    json!({
        "Temperatures": [
            { "Name": "CPU", "ReadingCelsius": cpu_celsius, "UpperThresholdNonCritical": 80, "UpperThresholdCritical": 90 }
        ],
        "Fans": [ { "Name": "Fan1", "Reading": 40, "Units": "Percent" } ],
        "ThermalPolicy": "Balanced"
    })
}

pub fn power(consumed_watts: f64) -> Value {
    json!({
        "PowerControl": [ { "PowerConsumedWatts": consumed_watts, "PowerLimit": { "LimitInWatts": 500 } } ],
        "PowerSupplies": [ { "Name": "PSU1", "LastPowerOutputWatts": 20 } ]
    })
}

pub fn voltages(volts: f64) -> Value {
    json!({
        "Voltages": [ { "Name": "VRM1", "ReadingVolts": volts, "UpperThresholdCritical": 1.5, "LowerThresholdCritical": 0.9 } ]
    })
}

// ---- scripted transport ----

#[derive(Debug, Clone)]
pub enum Scripted {
    Ok(Value),
    Status(u16, Value),
    Timeout,
    Network,
}

impl Scripted {
    fn into_result(self, url: &str) -> Result<Value, TransportError> {
        match self {
            Scripted::Ok(v) => Ok(v),
            Scripted::Status(status, body) => Err(TransportError::Status {
                url: url.to_string(),
                status,
                body,
            }),
            Scripted::Timeout => Err(TransportError::Timeout {
                url: url.to_string(),
            }),
            Scripted::Network => Err(TransportError::Network {
                url: url.to_string(),
                message: "connection refused".into(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: &'static str,
    pub url: String,
    pub body: Option<Value>,
}

/// In-memory transport: canned reply per URL, every call recorded. Unscripted URLs fail with 404.
/// Optional delays (global or per URL) hold calls open so in-flight concurrency can be measured.
#[derive(Default)]
pub struct FakeTransport {
    replies: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<Call>>,
    delay: Mutex<Duration>,
    url_delays: Mutex<HashMap<String, Duration>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    completed: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, url: impl Into<String>, reply: Scripted) {
        self.replies.lock().unwrap().insert(url.into(), reply);
    }

    /// Scripts the listing plus healthy thermal/power/voltage replies for each chassis.
    pub fn with_chassis(ids: &[&str]) -> Self {
        let t = Self::new();
        t.reply(format!("{}/Chassis", BASE_URL), Scripted::Ok(collection(ids)));
        for id in ids {
            t.script_chassis(id, 40.0, 30.0, 1.2);
        }
        t
    }

    pub fn script_chassis(&self, id: &str, cpu_celsius: f64, watts: f64, volts: f64) {
        let root = format!("{}/Chassis/{}", BASE_URL, id);
        self.reply(format!("{}/Thermal", root), Scripted::Ok(thermal(cpu_celsius)));
        self.reply(format!("{}/Power", root), Scripted::Ok(power(watts)));
        self.reply(format!("{}/Power/Voltages", root), Scripted::Ok(voltages(volts)));
    }

    /// Every call sleeps this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Overrides the delay for one URL.
    pub fn delay_url(&self, url: impl Into<String>, delay: Duration) {
        self.url_delays.lock().unwrap().insert(url.into(), delay);
    }

    /// Highest number of calls that were open at the same moment.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// URLs in the order their replies were returned.
    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn posts(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == "POST")
            .collect()
    }

    async fn answer(&self, method: &'static str, url: &str, body: Option<Value>) -> Result<Value, TransportError> {
        self.calls.lock().unwrap().push(Call {
            method,
            url: url.to_string(),
            body,
        });
        let open = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(open, Ordering::SeqCst);
        let delay = self
            .url_delays
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or_else(|| *self.delay.lock().unwrap());
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.lock().unwrap().push(url.to_string());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| Scripted::Status(404, json!({ "detail": "Not Found" })));
        reply.into_result(url)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, url: &str, _timeout: Duration) -> Result<Value, TransportError> {
        self.answer("GET", url, None).await
    }

    async fn post(&self, url: &str, body: &Value, _timeout: Duration) -> Result<Value, TransportError> {
        self.answer("POST", url, Some(body.clone())).await
    }
}

// ---- in-memory sinks ----

#[derive(Default)]
pub struct MemoryArchive {
    pub objects: Mutex<BTreeMap<String, Bytes>>,
    pub fail: AtomicBool,
}

impl MemoryArchive {
    pub fn failing() -> Self {
        let a = Self::default();
        a.fail.store(true, Ordering::SeqCst);
        a
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl ArchiveSink for MemoryArchive {
    async fn put(&self, key: &str, payload: Bytes) -> Result<(), SinkError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SinkError::Io(std::io::Error::other("archive unavailable")));
        }
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(key) {
            return Err(SinkError::Exists(key.to_string()));
        }
        objects.insert(key.to_string(), payload);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, SinkError> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| SinkError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, key.to_string())))
    }
}

#[derive(Default)]
pub struct MemorySummaries {
    pub written: Mutex<Vec<BatchSummary>>,
    pub fail: AtomicBool,
}

impl MemorySummaries {
    pub fn failing() -> Self {
        let s = Self::default();
        s.fail.store(true, Ordering::SeqCst);
        s
    }

    pub fn all(&self) -> Vec<BatchSummary> {
        self.written.lock().unwrap().clone()
    }
}

#[async_trait]
impl SummarySink for MemorySummaries {
    async fn write_summary(&self, summary: &BatchSummary) -> Result<(), SinkError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SinkError::Encode("summary store unavailable".into()));
        }
        self.written.lock().unwrap().push(summary.clone());
        Ok(())
    }

    async fn summaries_between(&self, start: i64, end: i64) -> Result<Vec<BatchSummary>, SinkError> {
        Ok(self
            .all()
            .into_iter()
            .filter(|s| s.start_time >= start && s.end_time <= end)
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryAuditStore {
    pub actions: Mutex<Vec<AuditRecord>>,
    pub health: Mutex<Vec<HealthEvent>>,
    pub fail: AtomicBool,
}

impl MemoryAuditStore {
    pub fn failing() -> Self {
        let s = Self::default();
        s.fail.store(true, Ordering::SeqCst);
        s
    }

    pub fn actions(&self) -> Vec<AuditRecord> {
        self.actions.lock().unwrap().clone()
    }

    pub fn health(&self) -> Vec<HealthEvent> {
        self.health.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append_action(&self, record: &AuditRecord) -> Result<(), SinkError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SinkError::Encode("log store unavailable".into()));
        }
        self.actions.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn append_health(&self, event: &HealthEvent) -> Result<(), SinkError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SinkError::Encode("log store unavailable".into()));
        }
        self.health.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn recent_actions(&self, limit: u32, actor: Option<&str>) -> Result<Vec<AuditRecord>, SinkError> {
        Ok(self
            .actions()
            .into_iter()
            .rev()
            .filter(|r| actor.is_none_or(|a| r.actor == a))
            .take(limit as usize)
            .collect())
    }
}

/// user id -> password digest
#[derive(Default)]
pub struct MemoryCredentials {
    pub users: Mutex<HashMap<String, String>>,
}

impl MemoryCredentials {
    pub fn with_user(user_id: &str, password: &str) -> Self {
        let c = Self::default();
        c.users
            .lock()
            .unwrap()
            .insert(user_id.to_string(), password_digest(user_id, password));
        c
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentials {
    async fn authenticate(&self, user_id: &str, password: &str) -> Result<Option<User>, SinkError> {
        let users = self.users.lock().unwrap();
        Ok(users
            .get(user_id)
            .filter(|d| **d == password_digest(user_id, password))
            .map(|_| User {
                user_id: user_id.to_string(),
            }))
    }
}

// ---- mock BMC over real HTTP ----

#[derive(Default)]
pub struct MockBmc {
    /// chassis id -> (cpu °C, watts)
    pub chassis: Mutex<BTreeMap<String, (f64, f64)>>,
    /// Chassis whose Power resource answers 500.
    pub broken: Mutex<Option<String>>,
    pub posts: Mutex<Vec<(String, Value)>>,
    /// Delay applied to every Thermal reply.
    pub thermal_delay: Mutex<Duration>,
}

type Bmc = Arc<MockBmc>;

async fn list_chassis(State(bmc): State<Bmc>) -> Json<Value> {
    let ids: Vec<String> = bmc.chassis.lock().unwrap().keys().cloned().collect();
    let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    Json(collection(&refs))
}

async fn get_thermal(State(bmc): State<Bmc>, Path(id): Path<String>) -> impl IntoResponse {
    let delay = *bmc.thermal_delay.lock().unwrap();
    tokio::time::sleep(delay).await;
    let reading = bmc.chassis.lock().unwrap().get(&id).copied();
    match reading {
        Some((cpu, _)) => (StatusCode::OK, Json(thermal(cpu))),
        None => (StatusCode::NOT_FOUND, Json(json!({ "detail": "Chassis not found" }))),
    }
}

async fn get_power(State(bmc): State<Bmc>, Path(id): Path<String>) -> impl IntoResponse {
    if bmc.broken.lock().unwrap().as_deref() == Some(id.as_str()) {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "detail": "sensor bus fault" })));
    }
    let reading = bmc.chassis.lock().unwrap().get(&id).copied();
    match reading {
        Some((_, watts)) => (StatusCode::OK, Json(power(watts))),
        None => (StatusCode::NOT_FOUND, Json(json!({ "detail": "Chassis not found" }))),
    }
}

async fn get_voltages(State(bmc): State<Bmc>, Path(id): Path<String>) -> impl IntoResponse {
    if bmc.chassis.lock().unwrap().contains_key(&id) {
        (StatusCode::OK, Json(voltages(1.2)))
    } else {
        (StatusCode::NOT_FOUND, Json(json!({ "detail": "Chassis not found" })))
    }
}

async fn set_power_limit(
    State(bmc): State<Bmc>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    bmc.posts
        .lock()
        .unwrap()
        .push((format!("{}/Power.SetPowerLimit", id), body.clone()));
    if !bmc.chassis.lock().unwrap().contains_key(&id) {
        return (StatusCode::NOT_FOUND, Json(json!({ "detail": "Chassis not found" })));
    }
    (
        StatusCode::OK,
        Json(json!({ "message": "Power limit updated", "LimitInWatts": body["LimitInWatts"] })),
    )
}

async fn set_fans(
    State(bmc): State<Bmc>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    bmc.posts
        .lock()
        .unwrap()
        .push((format!("{}/Thermal/Fans", id), body));
    (StatusCode::OK, Json(json!({ "message": "Fan speeds updated" })))
}

/// Serves a Redfish-shaped API on an ephemeral port; returns the `/redfish/v1` base URL.
pub async fn spawn_mock_bmc(bmc: Bmc) -> String {
    let app = Router::new()
        .route("/redfish/v1/Chassis", get(list_chassis))
        .route("/redfish/v1/Chassis/{id}/Thermal", get(get_thermal))
        .route("/redfish/v1/Chassis/{id}/Thermal/Fans", post(set_fans))
        .route("/redfish/v1/Chassis/{id}/Power", get(get_power))
        .route("/redfish/v1/Chassis/{id}/Power/Voltages", get(get_voltages))
        .route(
            "/redfish/v1/Chassis/{id}/Power/Actions/Power.SetPowerLimit",
            post(set_power_limit),
        )
        .with_state(bmc);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/redfish/v1", addr)
}

pub fn mock_bmc(chassis: &[(&str, f64, f64)]) -> Bmc {
    let bmc = MockBmc::default();
    {
        let mut map = bmc.chassis.lock().unwrap();
        for (id, cpu, watts) in chassis {
            map.insert(id.to_string(), (*cpu, *watts));
        }
    }
    Arc::new(bmc)
}
