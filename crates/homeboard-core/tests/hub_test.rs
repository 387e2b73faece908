#![allow(clippy::unwrap_used)]
// Hub flows against a wiremock backend: refresh, device commands,
// all-lights-off, platform disconnect and duplicate cleanup.

use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;
use uuid::Uuid;
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use homeboard_core::{
    AuthCredentials, Command, CommandResult, ConnectionState, CoreError, Hub, HubConfig,
    NoticeLevel, PowerState,
};

const USER_ID: &str = "550e8400-e29b-41d4-a716-446655440000";
const HOME_ID: &str = "7c9e6679-7425-40de-944b-e07fc1f90ae7";
const ST_ID: &str = "3f2504e0-4f89-11d3-9a0c-0305e82c3301";

// ── Fixtures ────────────────────────────────────────────────────────

fn platform(id: &str, name: &str, kind: &str, created_at: &str) -> Value {
    json!({
        "id": id,
        "user_id": USER_ID,
        "platform_name": name,
        "platform_type": kind,
        "credentials": { "access_token": "st-token" },
        "is_connected": true,
        "last_sync": null,
        "created_at": created_at,
        "updated_at": created_at
    })
}

fn device(id: &str, name: &str, kind: &str, platform_id: Option<&str>, status: Value) -> Value {
    json!({
        "id": id,
        "user_id": USER_ID,
        "platform_id": platform_id,
        "device_id": format!("ext-{name}"),
        "device_name": name,
        "device_type": kind,
        "room": "Living Room",
        "status": status,
        "capabilities": {},
        "last_updated": "2026-05-01T10:00:00Z",
        "smart_home_platforms": platform_id.map(|_| json!({ "platform_name": "Home" }))
    })
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

async fn mount_auth(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": USER_ID, "email": "me@example.com" })),
        )
        .mount(server)
        .await;
}

/// Mount the four refresh reads. `times` limits how often this set answers
/// so a later mount can describe the state after a mutation.
async fn mount_refresh(server: &MockServer, platforms: Value, devices: Value, times: Option<u64>) {
    let reads = [
        ("/rest/v1/smart_home_platforms", platforms),
        ("/rest/v1/smart_home_devices", devices),
        ("/rest/v1/device_activity_logs", json!([])),
        (
            "/rest/v1/energy_usage",
            json!([
                { "recorded_at": "2026-05-01T11:00:00Z", "usage_kwh": 1.5, "solar_generation_kwh": 0.5 },
                { "recorded_at": "2026-05-01T10:00:00Z", "usage_kwh": 1.0, "solar_generation_kwh": 0.0 }
            ]),
        ),
    ];
    for (route, body) in reads {
        let mock = Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body));
        let mock = match times {
            Some(n) => mock.up_to_n_times(n),
            None => mock,
        };
        mock.mount(server).await;
    }
}

async fn mount_log_sink(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/rest/v1/device_activity_logs"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .mount(server)
        .await;
}

async fn connected(server: &MockServer) -> Hub {
    let hub = Hub::new(config(server)).unwrap();
    hub.connect().await.unwrap();
    hub
}

fn id(raw: &str) -> Uuid {
    raw.parse().unwrap()
}

// ── Refresh ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_connect_loads_every_slice() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_refresh(
        &server,
        json!([platform(HOME_ID, "Home", "reolink", "2026-01-01T00:00:00Z")]),
        json!([
            device("11111111-1111-1111-1111-111111111111", "Lamp", "light", Some(HOME_ID), json!({ "state": "on" })),
            device("22222222-2222-2222-2222-222222222222", "Door", "lock", None, json!({ "locked": true }))
        ]),
        None,
    )
    .await;

    let hub = connected(&server).await;
    assert_eq!(*hub.connection_state().borrow(), ConnectionState::Connected);
    assert_eq!(hub.platforms_snapshot().len(), 1);
    assert_eq!(hub.devices_snapshot().len(), 2);
    assert!(hub.store().last_full_refresh().is_some());

    let lamp = hub.store().find_device("lamp").unwrap();
    assert_eq!(lamp.platform_name.as_deref(), Some("Home"));
    assert_eq!(lamp.power(), Some(PowerState::On));

    let energy = hub.energy_snapshot();
    assert_eq!(energy.len(), 2);
    assert!(energy[0].recorded_at < energy[1].recorded_at);

    let cleanup = hub
        .execute(Command::CleanupDuplicates { name: "Home".into() })
        .await;
    assert!(cleanup.is_ok(), "command after connect failed: {cleanup:?}");
    hub.disconnect().await;
}

#[tokio::test]
async fn test_failed_slice_fails_connect_but_keeps_others() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/energy_usage"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "boom" })))
        .with_priority(1)
        .mount(&server)
        .await;
    mount_refresh(
        &server,
        json!([]),
        json!([device("11111111-1111-1111-1111-111111111111", "Lamp", "light", None, json!({}))]),
        None,
    )
    .await;

    let hub = Hub::new(config(&server)).unwrap();
    let err = hub.connect().await.unwrap_err();
    assert!(matches!(err, CoreError::Store { .. }), "got {err:?}");
    assert_eq!(*hub.connection_state().borrow(), ConnectionState::Failed);
    assert_eq!(hub.devices_snapshot().len(), 1);
    assert!(hub.store().last_full_refresh().is_none());
}

#[tokio::test]
async fn test_execute_requires_connection_and_still_notifies() {
    let server = MockServer::start().await;
    let hub = Hub::new(config(&server)).unwrap();
    let mut notices = hub.notices();

    let err = hub.execute(Command::TurnOffAllLights).await.unwrap_err();
    assert!(matches!(err, CoreError::Disconnected));
    let notice = notices.try_recv().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.title, "All lights off");
}

// ── Device commands ─────────────────────────────────────────────────

const LAMP: &str = "11111111-1111-1111-1111-111111111111";

#[tokio::test]
async fn test_toggle_updates_row_and_mirror() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_refresh(
        &server,
        json!([]),
        json!([device(LAMP, "Lamp", "light", None, json!({ "state": "on", "brightness": 70 }))]),
        None,
    )
    .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/smart_home_devices"))
        .and(query_param("id", format!("eq.{LAMP}")))
        .and(body_partial_json(json!({ "status": { "state": "off", "brightness": 70 } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([device(
            LAMP,
            "Lamp",
            "light",
            None,
            json!({ "state": "off", "brightness": 70 })
        )])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/device_activity_logs"))
        .and(body_partial_json(json!([{ "action": "device_toggle", "device_id": LAMP }])))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let hub = connected(&server).await;
    let mut notices = hub.notices();
    let result = hub
        .execute(Command::Toggle { device_id: id(LAMP) })
        .await
        .unwrap();

    let CommandResult::Device {
        device,
        status_confirmed,
    } = result
    else {
        panic!("unexpected result");
    };
    assert!(status_confirmed);
    assert_eq!(device.power(), Some(PowerState::Off));
    assert_eq!(
        hub.store().device_by_id(&id(LAMP)).unwrap().power(),
        Some(PowerState::Off)
    );
    assert_eq!(notices.try_recv().unwrap().level, NoticeLevel::Success);
    assert!(notices.try_recv().is_err());
}

#[tokio::test]
async fn test_failed_toggle_leaves_mirror_unchanged() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_refresh(
        &server,
        json!([]),
        json!([device(LAMP, "Lamp", "light", None, json!({ "state": "on" }))]),
        None,
    )
    .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/smart_home_devices"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "db down" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/device_activity_logs"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let hub = connected(&server).await;
    let mut notices = hub.notices();
    let err = hub
        .execute(Command::Toggle { device_id: id(LAMP) })
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Store { .. }));
    assert_eq!(
        hub.store().device_by_id(&id(LAMP)).unwrap().power(),
        Some(PowerState::On)
    );
    let notice = notices.try_recv().unwrap();
    assert!(notice.is_error());
    assert!(notice.message.contains("db down"));
}

#[tokio::test]
async fn test_smartthings_device_goes_through_command_handler() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_refresh(
        &server,
        json!([platform(ST_ID, "Home", "smartthings", "2026-01-01T00:00:00Z")]),
        json!([device(LAMP, "Lamp", "light", Some(ST_ID), json!({ "state": "off" }))]),
        None,
    )
    .await;
    mount_log_sink(&server).await;
    Mock::given(method("POST"))
        .and(path("/functions/v1/smartthings-device-command"))
        .and(body_json(json!({ "deviceId": LAMP, "command": "switch", "value": "on" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": true, "status": { "state": "on" } })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/smart_home_devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let hub = connected(&server).await;
    hub.execute(Command::Toggle { device_id: id(LAMP) })
        .await
        .unwrap();
    assert_eq!(
        hub.store().device_by_id(&id(LAMP)).unwrap().power(),
        Some(PowerState::On)
    );
}

#[tokio::test]
async fn test_handler_rejection_is_function_error() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_refresh(
        &server,
        json!([platform(ST_ID, "Home", "smartthings", "2026-01-01T00:00:00Z")]),
        json!([device(LAMP, "Lamp", "light", Some(ST_ID), json!({ "state": "off" }))]),
        None,
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/functions/v1/smartthings-device-command"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "error": "device offline" })),
        )
        .mount(&server)
        .await;

    let hub = connected(&server).await;
    let err = hub
        .execute(Command::Toggle { device_id: id(LAMP) })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Function { ref message, .. } if message == "device offline"));
    assert_eq!(
        hub.store().device_by_id(&id(LAMP)).unwrap().power(),
        Some(PowerState::Off)
    );
}

// ── All lights off ──────────────────────────────────────────────────

#[tokio::test]
async fn test_all_lights_off_toggles_each_lit_light_once() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_refresh(
        &server,
        json!([]),
        json!([
            device("a0000000-0000-0000-0000-000000000001", "Kitchen", "light", None, json!({ "state": "on" })),
            device("a0000000-0000-0000-0000-000000000002", "Hall", "light", None, json!({ "state": "on" })),
            device("a0000000-0000-0000-0000-000000000003", "Porch", "light", None, json!({ "state": "on" })),
            device("a0000000-0000-0000-0000-000000000004", "Desk", "light", None, json!({ "state": "off" })),
            device("a0000000-0000-0000-0000-000000000005", "Fan", "switch", None, json!({ "state": "on" }))
        ]),
        None,
    )
    .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/smart_home_devices"))
        .and(body_partial_json(json!({ "status": { "state": "off" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([device(
            "a0000000-0000-0000-0000-000000000001",
            "Kitchen",
            "light",
            None,
            json!({ "state": "off" })
        )])))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/device_activity_logs"))
        .and(body_partial_json(json!([{ "action": "all_lights_off", "details": { "count": 3 } }])))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/device_activity_logs"))
        .and(body_partial_json(json!([{ "action": "device_toggle" }])))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let hub = connected(&server).await;
    let result = hub.execute(Command::TurnOffAllLights).await.unwrap();
    assert!(matches!(result, CommandResult::LightsOff { count: 3 }));

    let still_on: Vec<String> = hub
        .devices_snapshot()
        .iter()
        .filter(|d| d.power() == Some(PowerState::On))
        .map(|d| d.name.clone())
        .collect();
    assert_eq!(still_on, ["Fan"]);
}

#[tokio::test]
async fn test_all_lights_off_counts_lights_whose_toggle_failed() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_refresh(
        &server,
        json!([]),
        json!([
            device("b0000000-0000-0000-0000-000000000001", "Kitchen", "light", None, json!({ "state": "on" })),
            device("b0000000-0000-0000-0000-000000000002", "Hall", "light", None, json!({ "state": "on" })),
            device("b0000000-0000-0000-0000-000000000003", "Porch", "light", None, json!({ "state": "on" }))
        ]),
        None,
    )
    .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/smart_home_devices"))
        .and(query_param("id", "eq.b0000000-0000-0000-0000-000000000002"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "db down" })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/smart_home_devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([device(
            "b0000000-0000-0000-0000-000000000001",
            "Kitchen",
            "light",
            None,
            json!({ "state": "off" })
        )])))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/device_activity_logs"))
        .and(body_partial_json(json!([{ "action": "all_lights_off", "details": { "count": 3 } }])))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let hub = connected(&server).await;
    let result = hub.execute(Command::TurnOffAllLights).await.unwrap();
    assert!(matches!(result, CommandResult::LightsOff { count: 3 }));
    assert_eq!(
        hub.store()
            .device_by_id(&id("b0000000-0000-0000-0000-000000000002"))
            .unwrap()
            .power(),
        Some(PowerState::On)
    );
}

// ── Platforms ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_disconnect_removes_rows_and_reloads() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_log_sink(&server).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/smart_home_platforms"))
        .and(query_param("platform_name", "eq.Home"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([platform(
            HOME_ID,
            "Home",
            "reolink",
            "2026-01-01T00:00:00Z"
        )])))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/smart_home_platforms"))
        .and(query_param("platform_name", "eq.Home"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([platform(
            HOME_ID,
            "Home",
            "reolink",
            "2026-01-01T00:00:00Z"
        )])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/smart_home_devices"))
        .and(query_param("user_id", format!("eq.{USER_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            device(LAMP, "Lamp", "light", Some(HOME_ID), json!({})),
            device("22222222-2222-2222-2222-222222222222", "Door", "lock", None, json!({}))
        ])))
        .expect(1)
        .mount(&server)
        .await;

    mount_refresh(
        &server,
        json!([platform(HOME_ID, "Home", "reolink", "2026-01-01T00:00:00Z")]),
        json!([
            device(LAMP, "Lamp", "light", Some(HOME_ID), json!({})),
            device("22222222-2222-2222-2222-222222222222", "Door", "lock", None, json!({}))
        ]),
        Some(1),
    )
    .await;
    mount_refresh(&server, json!([]), json!([]), None).await;

    let hub = connected(&server).await;
    assert_eq!(hub.devices_snapshot().len(), 2);

    let result = hub
        .execute(Command::DisconnectPlatform {
            name: "Home".into(),
        })
        .await
        .unwrap();
    assert!(matches!(
        result,
        CommandResult::Disconnected {
            platforms: 1,
            devices: 2
        }
    ));
    assert!(hub.devices_snapshot().is_empty());
    assert!(hub.platforms_snapshot().is_empty());
}

#[tokio::test]
async fn test_disconnect_unknown_platform() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_refresh(&server, json!([]), json!([]), None).await;

    let hub = connected(&server).await;
    let err = hub
        .execute(Command::DisconnectPlatform {
            name: "Nope".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::PlatformNotFound { ref name } if name == "Nope"));
}

#[tokio::test]
async fn test_cleanup_keeps_newest_row() {
    let server = MockServer::start().await;
    mount_auth(&server).await;

    let newest = "c0000000-0000-0000-0000-000000000003";
    let older = [
        "c0000000-0000-0000-0000-000000000002",
        "c0000000-0000-0000-0000-000000000001",
    ];
    Mock::given(method("GET"))
        .and(path("/rest/v1/smart_home_platforms"))
        .and(query_param("platform_name", "eq.Home"))
        .and(query_param("order", "created_at.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            platform(newest, "Home", "smartthings", "2026-03-01T00:00:00Z"),
            platform(older[0], "Home", "smartthings", "2026-02-01T00:00:00Z"),
            platform(older[1], "Home", "smartthings", "2026-01-01T00:00:00Z")
        ])))
        .with_priority(1)
        .mount(&server)
        .await;
    for old in older {
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/smart_home_platforms"))
            .and(query_param("id", format!("eq.{old}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/smart_home_platforms"))
        .and(query_param("id", format!("eq.{newest}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;
    mount_refresh(&server, json!([]), json!([]), None).await;

    let hub = connected(&server).await;
    let result = hub
        .execute(Command::CleanupDuplicates {
            name: "Home".into(),
        })
        .await
        .unwrap();
    let CommandResult::Cleanup { kept, removed } = result else {
        panic!("unexpected result");
    };
    assert_eq!(kept, Some(id(newest)));
    assert_eq!(removed, 2);
}

#[tokio::test]
async fn test_cleanup_with_single_row_is_noop() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/smart_home_platforms"))
        .and(query_param("platform_name", "eq.Home"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([platform(
            HOME_ID,
            "Home",
            "smartthings",
            "2026-01-01T00:00:00Z"
        )])))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;
    mount_refresh(&server, json!([]), json!([]), None).await;

    let hub = connected(&server).await;
    let mut notices = hub.notices();
    let result = hub
        .execute(Command::CleanupDuplicates {
            name: "Home".into(),
        })
        .await
        .unwrap();
    assert_eq!(result.summary(), "No duplicates found");
    assert_eq!(notices.try_recv().unwrap().message, "No duplicates found");
}
