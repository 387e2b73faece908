#![allow(clippy::unwrap_used)]
// Integration tests for `StoreClient` using wiremock.

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use wiremock::matchers::{body_json, header, headers, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use homeboard_api::store::rows::{DEVICE_CONFLICT_KEY, DeviceRow, NewActivityLog, PlatformRow};
use homeboard_api::store::tables;
use homeboard_api::{Error, Order, Query, StoreClient};

const USER_ID: &str = "550e8400-e29b-41d4-a716-446655440000";

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, StoreClient) {
    let server = MockServer::start().await;
    let client = StoreClient::from_reqwest(
        &server.uri(),
        reqwest::Client::new(),
        SecretString::from("anon-key"),
    )
    .unwrap();
    (server, client)
}

async fn sign_in(server: &MockServer, client: &StoreClient) {
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "user-token",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "r",
            "user": { "id": USER_ID, "email": "me@example.com" }
        })))
        .mount(server)
        .await;

    client
        .sign_in_with_password("me@example.com", &SecretString::from("pw"))
        .await
        .unwrap();
}

fn platform_json(id: &str, name: &str, created_at: &str) -> serde_json::Value {
    json!({
        "id": id,
        "user_id": USER_ID,
        "platform_name": name,
        "platform_type": "smartthings",
        "credentials": { "token": "x" },
        "is_connected": true,
        "last_sync": null,
        "created_at": created_at,
        "updated_at": created_at
    })
}

// ── Auth ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_password_sign_in_stores_session() {
    let (server, client) = setup().await;
    sign_in(&server, &client).await;

    assert_eq!(client.user_id().unwrap().to_string(), USER_ID);
}

#[tokio::test]
async fn test_sign_in_failure_is_authentication_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid login credentials"
        })))
        .mount(&server)
        .await;

    let result = client
        .sign_in_with_password("me@example.com", &SecretString::from("nope"))
        .await;
    match result {
        Err(Error::Authentication { message }) => {
            assert_eq!(message, "Invalid login credentials");
        }
        other => panic!("expected Authentication error, got: {other:?}"),
    }
    assert!(client.session().is_none());
}

#[tokio::test]
async fn test_token_sign_in_validates_user() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header("authorization", "Bearer existing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": USER_ID })))
        .mount(&server)
        .await;

    let session = client
        .sign_in_with_token(&SecretString::from("existing"))
        .await
        .unwrap();
    assert_eq!(session.user_id.to_string(), USER_ID);
}

#[tokio::test]
async fn test_expired_token_is_refreshed_before_use() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "stale-token",
            "expires_in": -60,
            "refresh_token": "refresh-1",
            "user": { "id": USER_ID }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(body_json(json!({ "refresh_token": "refresh-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-token",
            "expires_in": 3600,
            "refresh_token": "refresh-2",
            "user": { "id": USER_ID }
        })))
        .expect(1)
        .mount(&server)
        .await;

    client
        .sign_in_with_password("me@example.com", &SecretString::from("pw"))
        .await
        .unwrap();
    let token = client.current_access_token().await.unwrap();
    assert_eq!(token.expose_secret(), "fresh-token");

    let again = client.current_access_token().await.unwrap();
    assert_eq!(again.expose_secret(), "fresh-token");
}

#[tokio::test]
async fn test_refresh_without_refresh_token_is_session_expired() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": USER_ID })))
        .mount(&server)
        .await;
    client
        .sign_in_with_token(&SecretString::from("existing"))
        .await
        .unwrap();

    assert!(matches!(
        client.refresh_session().await,
        Err(Error::SessionExpired)
    ));
}

// ── Rows ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_select_sends_filters_and_bearer() {
    let (server, client) = setup().await;
    sign_in(&server, &client).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/smart_home_platforms"))
        .and(header("apikey", "anon-key"))
        .and(header("authorization", "Bearer user-token"))
        .and(query_param("user_id", format!("eq.{USER_ID}")))
        .and(query_param("order", "created_at.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            platform_json("7c9e6679-7425-40de-944b-e07fc1f90ae7", "Home", "2026-01-02T00:00:00Z"),
            platform_json("6f9619ff-8b86-d011-b42d-00c04fc964ff", "Home", "2026-01-01T00:00:00Z")
        ])))
        .mount(&server)
        .await;

    let query = Query::new()
        .eq("user_id", USER_ID)
        .order("created_at", Order::Desc);
    let rows: Vec<PlatformRow> = client.select(tables::PLATFORMS, &query).await.unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].platform_name, "Home");
    assert!(rows[0].is_connected);
}

#[tokio::test]
async fn test_insert_requests_representation() {
    let (server, client) = setup().await;
    sign_in(&server, &client).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/device_activity_logs"))
        .and(header("prefer", "return=representation"))
        .and(body_json(json!({
            "user_id": USER_ID,
            "device_id": null,
            "action": "bulk_lights_off",
            "details": { "count": 3 }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": "6f9619ff-8b86-d011-b42d-00c04fc964ff",
            "user_id": USER_ID,
            "device_id": null,
            "action": "bulk_lights_off",
            "details": { "count": 3 },
            "timestamp": "2026-01-01T00:00:00Z"
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let log = NewActivityLog {
        user_id: client.user_id().unwrap(),
        device_id: None,
        action: "bulk_lights_off".into(),
        details: json!({ "count": 3 }),
    };
    let rows: Vec<serde_json::Value> = client.insert(tables::ACTIVITY_LOGS, &log).await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn test_upsert_sets_conflict_target() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/smart_home_devices"))
        .and(query_param("on_conflict", "user_id,device_id"))
        .and(headers(
            "prefer",
            vec!["resolution=merge-duplicates", "return=representation"],
        ))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let rows: Vec<DeviceRow> = client
        .upsert(
            tables::DEVICES,
            &Vec::<serde_json::Value>::new(),
            DEVICE_CONFLICT_KEY,
        )
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_store_error_is_structured() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/smart_home_devices"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23503",
            "message": "update or delete violates foreign key constraint",
            "details": "Key is still referenced",
            "hint": null
        })))
        .mount(&server)
        .await;

    let result: Result<Vec<DeviceRow>, _> = client
        .delete(tables::DEVICES, &Query::new().eq("user_id", USER_ID))
        .await;
    let err = result.unwrap_err();
    assert_eq!(err.api_error_code(), Some("23503"));
    assert!(matches!(err, Error::Store { status: 409, .. }));
}

#[tokio::test]
async fn test_unauthorized_maps_to_session_expired() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/smart_home_devices"))
        .respond_with(ResponseTemplate::new(401).set_body_string("JWT expired"))
        .mount(&server)
        .await;

    let result: Result<Vec<DeviceRow>, _> =
        client.select(tables::DEVICES, &Query::new()).await;
    assert!(matches!(result, Err(Error::SessionExpired)));
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/smart_home_platforms"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let result: Result<Vec<PlatformRow>, _> =
        client.select(tables::PLATFORMS, &Query::new()).await;
    match result {
        Err(Error::Deserialization { body, .. }) => assert!(body.contains("oops")),
        other => panic!("expected Deserialization error, got: {other:?}"),
    }
}

// ── Functions ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_invoke_posts_to_function_path() {
    let (server, client) = setup().await;
    sign_in(&server, &client).await;

    Mock::given(method("POST"))
        .and(path("/functions/v1/smartthings-device-command"))
        .and(header("authorization", "Bearer user-token"))
        .and(body_json(json!({
            "deviceId": "6f9619ff-8b86-d011-b42d-00c04fc964ff",
            "command": "switch",
            "value": "off"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": true, "status": { "state": "off" } })),
        )
        .mount(&server)
        .await;

    let req = homeboard_api::store::functions::DeviceCommandRequest {
        device_id: "6f9619ff-8b86-d011-b42d-00c04fc964ff".parse().unwrap(),
        command: "switch".into(),
        value: json!("off"),
    };
    let resp: homeboard_api::store::functions::DeviceCommandResponse = client
        .invoke(homeboard_api::store::functions::DEVICE_COMMAND, &req)
        .await
        .unwrap();
    assert_eq!(resp.status.unwrap()["state"], "off");
}

#[tokio::test]
async fn test_function_failure_carries_name() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/functions/v1/smartthings-sync"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "error": "vendor token rejected" })),
        )
        .mount(&server)
        .await;

    let result: Result<serde_json::Value, _> =
        client.invoke("smartthings-sync", &json!({})).await;
    match result {
        Err(Error::Function { name, message, status }) => {
            assert_eq!(name, "smartthings-sync");
            assert_eq!(message, "vendor token rejected");
            assert_eq!(status, 500);
        }
        other => panic!("expected Function error, got: {other:?}"),
    }
}
