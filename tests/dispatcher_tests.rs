// Dispatcher tests: validation before transport, one call per action, audit of every attempt

mod common;

use std::sync::Arc;
use std::time::Duration;

use chassiswatch::audit::AuditSink;
use chassiswatch::dispatcher::{DispatchError, Dispatcher, PlannedCall};
use chassiswatch::models::*;
use chassiswatch::redfish::Endpoints;
use common::*;
use serde_json::json;

struct Fixture {
    transport: Arc<FakeTransport>,
    store: Arc<MemoryAuditStore>,
    audit: Arc<AuditSink>,
    dispatcher: Dispatcher,
}

fn fixture_with_store(store: MemoryAuditStore) -> Fixture {
    let transport = Arc::new(FakeTransport::new());
    let store = Arc::new(store);
    let audit = Arc::new(AuditSink::new(100, store.clone()));
    let dispatcher = Dispatcher::new(
        transport.clone(),
        Endpoints::new(BASE_URL),
        audit.clone(),
        "agent",
        Duration::from_secs(3),
    );
    Fixture {
        transport,
        store,
        audit,
        dispatcher,
    }
}

fn fixture() -> Fixture {
    fixture_with_store(MemoryAuditStore::default())
}

fn power_limit_url(chassis: &str) -> String {
    format!("{}/Chassis/{}/Power/Actions/Power.SetPowerLimit", BASE_URL, chassis)
}

fn power_request(limit: i64) -> ActionRequest {
    ActionRequest::new(
        ActionKind::Power(PowerParams { limit }),
        "Chassis-1",
        format!("cap power at {limit} W"),
    )
}

#[tokio::test]
async fn out_of_range_power_limit_never_reaches_transport() {
    let f = fixture();
    let err = f.dispatcher.dispatch(power_request(40)).await.unwrap_err();
    assert!(matches!(
        err,
        DispatchError::InvalidAction(ValidationError::PowerLimitOutOfRange(40))
    ));
    assert!(f.transport.calls().is_empty());
    assert!(f.store.actions().is_empty());
    assert!(f.audit.feed().is_empty());
}

#[tokio::test]
async fn valid_power_limit_posts_once_and_audits_success() {
    let f = fixture();
    f.transport.reply(
        power_limit_url("Chassis-1"),
        Scripted::Ok(json!({ "message": "Power limit updated" })),
    );

    let result = f.dispatcher.dispatch(power_request(450)).await.unwrap();
    assert_eq!(result["message"], "Power limit updated");
    assert_eq!(result["action_summary"], "cap power at 450 W");

    let posts = f.transport.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].url, power_limit_url("Chassis-1"));
    assert_eq!(posts[0].body, Some(json!({ "LimitInWatts": 450 })));

    let records = f.store.actions();
    assert_eq!(records.len(), 1);
    let r = &records[0];
    assert_eq!(r.actor, "agent");
    assert_eq!(r.method, "POST");
    assert_eq!(r.endpoint, power_limit_url("Chassis-1"));
    assert_eq!(r.payload, json!({ "LimitInWatts": 450 }));
    assert_eq!(r.status, 200);
    assert!(r.success);
    assert!(chrono::DateTime::parse_from_rfc3339(&r.timestamp).is_ok());

    let poll = f.audit.feed().poll(0);
    assert_eq!(poll.entries, vec![LogEntry::Action(r.clone())]);
}

#[tokio::test]
async fn upstream_failure_is_audited_then_returned() {
    let f = fixture();
    f.transport.reply(
        power_limit_url("Chassis-9"),
        Scripted::Status(404, json!({ "detail": "Chassis not found" })),
    );
    let request = ActionRequest::new(ActionKind::Power(PowerParams { limit: 300 }), "Chassis-9", "");

    let err = f.dispatcher.dispatch(request).await.unwrap_err();
    assert!(matches!(err, DispatchError::Upstream(_)));

    let records = f.store.actions();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, 404);
    assert!(!records[0].success);
    assert_eq!(records[0].response, json!({ "detail": "Chassis not found" }));
}

#[tokio::test]
async fn timeout_is_audited_as_gateway_timeout() {
    let f = fixture();
    f.transport.reply(power_limit_url("Chassis-1"), Scripted::Timeout);

    assert!(f.dispatcher.dispatch(power_request(200)).await.is_err());
    let records = f.store.actions();
    assert_eq!(records[0].status, 504);
    assert!(!records[0].success);
    assert_eq!(f.transport.posts().len(), 1);
}

#[tokio::test]
async fn fan_and_voltage_map_to_their_action_endpoints() {
    let endpoints = Endpoints::new(BASE_URL);

    let fans = ActionRequest::new(
        ActionKind::Fan(FanParams {
            fans: [("Fan1".to_string(), 70), ("Fan2".to_string(), 65)].into(),
        }),
        "Chassis-1",
        "",
    );
    assert_eq!(
        PlannedCall::for_request(&endpoints, &fans),
        PlannedCall {
            endpoint: format!("{}/Chassis/Chassis-1/Thermal/Fans", BASE_URL),
            body: json!({ "Fan1": 70, "Fan2": 65 }),
        }
    );

    let rail = ActionRequest::new(
        ActionKind::Voltage(VoltageParams {
            name: "VRM1".into(),
            upper: 1.5,
            lower: 0.9,
        }),
        "Chassis-2",
        "",
    );
    assert_eq!(
        PlannedCall::for_request(&endpoints, &rail),
        PlannedCall {
            endpoint: format!(
                "{}/Chassis/Chassis-2/Power/Voltages/Actions/Voltage.SetThresholds",
                BASE_URL
            ),
            body: json!({ "Name": "VRM1", "UpperThresholdCritical": 1.5, "LowerThresholdCritical": 0.9 }),
        }
    );
}

#[tokio::test]
async fn failed_log_persist_keeps_feed_entry_and_result() {
    let f = fixture_with_store(MemoryAuditStore::failing());
    f.transport
        .reply(power_limit_url("Chassis-1"), Scripted::Ok(json!({ "ok": true })));

    let result = f.dispatcher.dispatch(power_request(100)).await.unwrap();
    assert_eq!(result["ok"], true);
    assert_eq!(f.audit.feed().len(), 1);
    assert!(f.store.actions().is_empty());
}

#[test]
fn decisions_decode_with_defaults_and_reject_bad_input() {
    let r = ActionRequest::from_json(json!({ "type": "power", "data": { "limit": 450 } })).unwrap();
    assert_eq!(r.chassis_id, DEFAULT_CHASSIS_ID);
    assert_eq!(r.action, ActionKind::Power(PowerParams { limit: 450 }));

    let r = ActionRequest::from_json(json!({
        "type": "voltage",
        "data": { "Name": "VRM1", "Upper": 1.4, "Lower": 1.0 },
        "chassis_id": "Chassis-2",
        "action_summary": "tighten VRM1"
    }))
    .unwrap();
    assert_eq!(r.chassis_id, "Chassis-2");
    assert_eq!(r.summary, "tighten VRM1");

    assert_eq!(
        ActionRequest::from_json(json!({ "type": "reboot", "data": {} })).unwrap_err(),
        ValidationError::UnknownType("reboot".into())
    );
    assert!(matches!(
        ActionRequest::from_json(json!({ "type": "fan", "data": { "fans": { "Fan1": 140 } } })),
        Err(ValidationError::FanSpeedOutOfRange { speed: 140, .. })
    ));
    assert_eq!(
        ActionRequest::from_json(json!({ "type": "fan", "data": { "fans": {} } })).unwrap_err(),
        ValidationError::NoFans
    );
    assert!(matches!(
        ActionRequest::from_json(json!({ "type": "voltage", "data": { "name": "VRM1", "upper": 0.8, "lower": 1.0 } })),
        Err(ValidationError::InvalidThresholds { .. })
    ));
    assert!(matches!(
        ActionRequest::from_json(json!({ "type": "power", "data": { "limit": 300 }, "chassis_id": "../etc" })),
        Err(ValidationError::InvalidChassisId(_))
    ));
    assert!(matches!(
        ActionRequest::from_json(json!({ "type": "power", "data": { "watts": 300 } })),
        Err(ValidationError::Malformed(_))
    ));
    assert_eq!(
        ActionRequest::from_json(json!({ "type": "power", "data": { "limit": 1000 } }))
            .unwrap()
            .action,
        ActionKind::Power(PowerParams { limit: 1000 })
    );
}
