#![allow(clippy::unwrap_used)]
// Platform sync passes routed through the hub against wiremock stand-ins
// for both the backend and the vendor.

use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use homeboard_core::{
    AuthCredentials, Command, CommandDispatch, CommandResult, Fidelity, Hub, HubConfig,
};

const USER_ID: &str = "550e8400-e29b-41d4-a716-446655440000";
const PLATFORM_ID: &str = "9b2f3c1e-5a4d-4e7b-8c6a-1d2e3f4a5b6c";

fn platform(kind: &str, credentials: Value) -> Value {
    json!({
        "id": PLATFORM_ID,
        "user_id": USER_ID,
        "platform_name": "Home",
        "platform_type": kind,
        "credentials": credentials,
        "is_connected": true,
        "last_sync": null,
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": "2026-01-01T00:00:00Z"
    })
}

/// Backend with one platform and a sink for every sync write.
async fn backend(server: &MockServer, platform: Value) {
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": USER_ID, "email": "me@example.com" })),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/smart_home_platforms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([platform])))
        .mount(server)
        .await;
    for table in ["smart_home_devices", "device_activity_logs", "energy_usage"] {
        Mock::given(method("GET"))
            .and(path(format!("/rest/v1/{table}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(server)
            .await;
    }
    for table in ["smart_home_devices", "device_activity_logs", "energy_usage"] {
        Mock::given(method("POST"))
            .and(path(format!("/rest/v1/{table}")))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
            .mount(server)
            .await;
    }
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/smart_home_devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/smart_home_platforms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

fn config(server: &MockServer) -> HubConfig {
    let mut config = HubConfig::new(
        Url::parse(&server.uri()).unwrap(),
        SecretString::from("anon-key"),
        AuthCredentials::AccessToken(SecretString::from("user-token")),
    );
    config.realtime_enabled = false;
    config
}

async fn sync(config: HubConfig) -> CommandResult {
    let hub = Hub::new(config).unwrap();
    hub.connect().await.unwrap();
    let result = hub
        .execute(Command::SyncPlatform {
            platform_id: PLATFORM_ID.parse::<Uuid>().unwrap(),
        })
        .await
        .unwrap();
    hub.disconnect().await;
    result
}

async fn posted_rows(server: &MockServer, route: &str) -> Vec<Value> {
    let requests: Vec<Request> = server.received_requests().await.unwrap();
    requests
        .iter()
        .filter(|r| r.method.as_str() == "POST" && r.url.path() == route)
        .flat_map(|r| {
            let body: Value = serde_json::from_slice(&r.body).unwrap();
            body.as_array().cloned().unwrap_or_default()
        })
        .collect()
}

// ── SmartThings ─────────────────────────────────────────────────────

async fn smartthings_vendor(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                { "locationId": "loc-1", "name": "House" },
                { "locationId": "loc-2", "name": "Garage" }
            ]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/locations/loc-1/rooms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                { "roomId": "r1", "locationId": "loc-1", "name": "Kitchen" },
                { "roomId": "r2", "locationId": "loc-1", "name": "Bedroom" }
            ]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/locations/loc-2/rooms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "roomId": "r3", "locationId": "loc-2", "name": "Workshop" }]
        })))
        .mount(server)
        .await;

    let rooms = [Some("r1"), Some("r1"), Some("r2"), Some("r3"), Some("r-gone")];
    let devices: Vec<Value> = (0..10)
        .map(|i| {
            json!({
                "deviceId": format!("st-{i}"),
                "label": format!("Device {i}"),
                "roomId": rooms.get(i).copied().flatten(),
                "components": [{ "id": "main", "capabilities": [{ "id": "switch" }] }]
            })
        })
        .collect();
    Mock::given(method("GET"))
        .and(path("/v1/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": devices })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/v1/devices/[^/]+/status$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "components": { "main": { "switch": { "switch": { "value": "on" } } } }
        })))
        .expect(10)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_smartthings_local_sync_resolves_rooms() {
    let server = MockServer::start().await;
    backend(
        &server,
        platform("smartthings", json!({ "access_token": "st-token" })),
    )
    .await;
    smartthings_vendor(&server).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/smart_home_devices"))
        .and(query_param("on_conflict", "user_id,device_id"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config(&server);
    config.command_dispatch = CommandDispatch::Local;
    config.smartthings_base_url = format!("{}/v1/", server.uri());

    let CommandResult::Synced(report) = sync(config).await else {
        panic!("unexpected result");
    };
    assert_eq!(report.devices_upserted, 10);
    assert_eq!(report.fidelity, Fidelity::Live);
    assert!(report.reachable);
    assert!(!report.remote);

    let rows = posted_rows(&server, "/rest/v1/smart_home_devices").await;
    assert_eq!(rows.len(), 10);
    let with_room: Vec<&str> = rows
        .iter()
        .filter_map(|r| r["room"].as_str())
        .collect();
    assert_eq!(with_room, ["Kitchen", "Kitchen", "Bedroom", "Workshop"]);
    assert!(rows.iter().all(|r| r["platform_id"] == PLATFORM_ID));
    assert!(rows.iter().all(|r| r["status"]["state"] == "on"));
}

#[tokio::test]
async fn test_smartthings_remote_sync_uses_server_handler() {
    let server = MockServer::start().await;
    backend(
        &server,
        platform("smartthings", json!({ "access_token": "st-token" })),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/functions/v1/smartthings-sync"))
        .and(body_partial_json(json!({ "platformId": PLATFORM_ID })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "devicesSynced": 7, "roomsFound": 3, "locationsFound": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let CommandResult::Synced(report) = sync(config(&server)).await else {
        panic!("unexpected result");
    };
    assert!(report.remote);
    assert_eq!(report.devices_upserted, 7);
    assert!(posted_rows(&server, "/rest/v1/smart_home_devices").await.is_empty());
}

// ── ReoLink ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_unreachable_camera_stores_placeholders() {
    let server = MockServer::start().await;
    let host = server.address().to_string();
    backend(
        &server,
        platform(
            "reolink",
            json!({ "ip_address": host, "username": "admin", "password": "pw" }),
        ),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/cgi-bin/api.cgi"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/smart_home_platforms"))
        .and(body_partial_json(json!({ "is_connected": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    let CommandResult::Synced(report) = sync(config(&server)).await else {
        panic!("unexpected result");
    };
    assert!(!report.reachable);
    assert_eq!(report.devices_upserted, 4);

    let rows = posted_rows(&server, "/rest/v1/smart_home_devices").await;
    let types: Vec<&str> = rows
        .iter()
        .filter_map(|r| r["device_type"].as_str())
        .collect();
    assert_eq!(types, ["camera", "motion_sensor", "ptz_control", "night_vision"]);
    assert_eq!(rows[0]["status"]["online"], false);
    assert!(rows[0]["status"]["message"].as_str().unwrap().contains("To connect"));

    let logs = posted_rows(&server, "/rest/v1/device_activity_logs").await;
    assert!(logs.iter().any(|l| l["action"] == "platform_sync"));
}

#[tokio::test]
async fn test_refused_camera_never_leaks_password() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let camera = listener.local_addr().unwrap().to_string();
    drop(listener);

    let server = MockServer::start().await;
    backend(
        &server,
        platform(
            "reolink",
            json!({ "ip_address": camera, "username": "admin", "password": "hunter2" }),
        ),
    )
    .await;

    let CommandResult::Synced(report) = sync(config(&server)).await else {
        panic!("unexpected result");
    };
    assert!(!report.reachable);
    assert!(!report.note.unwrap_or_default().contains("hunter2"));

    let rows = posted_rows(&server, "/rest/v1/smart_home_devices").await;
    assert_eq!(rows.len(), 4);
    let message = rows[0]["status"]["message"].as_str().unwrap();
    assert!(message.contains(&camera));
    assert!(!message.contains("hunter2"));

    let requests: Vec<Request> = server.received_requests().await.unwrap();
    for request in requests.iter().filter(|r| r.method.as_str() != "GET") {
        let body = String::from_utf8_lossy(&request.body);
        assert!(
            !body.contains("hunter2"),
            "password sent to {}: {body}",
            request.url.path()
        );
    }
}

// ── Enlighten ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_simulated_solar_sync_writes_energy() {
    let server = MockServer::start().await;
    backend(&server, platform("enlighten", json!({ "system_id": "42" }))).await;

    let CommandResult::Synced(report) = sync(config(&server)).await else {
        panic!("unexpected result");
    };
    assert_eq!(report.fidelity, Fidelity::Simulated);
    assert_eq!(report.devices_upserted, 13);
    assert_eq!(report.energy_samples, 24);
    assert!(report.summary().contains("simulated"));

    let samples = posted_rows(&server, "/rest/v1/energy_usage").await;
    assert_eq!(samples.len(), 24);
    assert!(samples.iter().all(|s| s["user_id"] == USER_ID));

    let devices = posted_rows(&server, "/rest/v1/smart_home_devices").await;
    assert!(devices.iter().all(|d| d["status"]["simulated"] == true));
}

#[tokio::test]
async fn test_unknown_platform_type_is_unsupported() {
    let server = MockServer::start().await;
    backend(&server, platform("hue", json!({}))).await;

    let hub = Hub::new(config(&server)).unwrap();
    hub.connect().await.unwrap();
    let err = hub
        .execute(Command::SyncPlatform {
            platform_id: PLATFORM_ID.parse::<Uuid>().unwrap(),
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("hue"));
}
