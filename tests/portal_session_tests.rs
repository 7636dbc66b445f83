use axum::http::StatusCode;
use axum_test::TestServer;
use customk9_gateway::session::decode_component;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

mod common;
use common::*;

fn test_server() -> TestServer {
    // The portal endpoint never talks to the ERP.
    let config = create_test_config("http://127.0.0.1:9");
    TestServer::new(create_test_app(config)).unwrap()
}

#[tokio::test]
async fn test_create_portal_session() {
    let server = test_server();
    let user = json!({"id": 12, "name": "Jane Doe", "email": "jane@example.com"});

    let response = server
        .post("/api/auth/session")
        .json(&json!({ "user": user }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let cookie = response.header("set-cookie").to_str().unwrap().to_string();
    assert!(cookie.starts_with("customk9_session="));
    assert!(cookie.contains("Max-Age=2592000"));
    assert!(cookie.contains("Path=/; SameSite=Lax"));
    assert!(!cookie.contains("HttpOnly"));

    let value = cookie
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(_, value)| value)
        .unwrap();
    let decoded: Value = serde_json::from_str(&decode_component(value)).unwrap();
    assert_eq!(decoded, user);

    let body: Value = response.json();
    assert_eq!(body, json!({"message": "Session created successfully"}));
}

#[tokio::test]
async fn test_create_portal_session_requires_user() {
    let server = test_server();

    for payload in [json!({}), json!({"user": null})] {
        let response = server.post("/api/auth/session").json(&payload).await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["error"]["message"], "User data is required");
        assert!(response.headers().get("set-cookie").is_none());
    }
}

#[tokio::test]
async fn test_create_portal_session_rejects_garbage() {
    let server = test_server();

    let response = server.post("/api/auth/session").text("not json").await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_portal_session() {
    let server = test_server();

    let response = server.delete("/api/auth/session").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let cookie = response.header("set-cookie").to_str().unwrap().to_string();
    assert!(cookie.starts_with("customk9_session=;"));
    assert!(cookie.contains("Max-Age=0"));
    let body: Value = response.json();
    assert_eq!(body, json!({"message": "Session deleted successfully"}));
}

#[tokio::test]
async fn test_portal_cookie_honours_config() {
    let mut config = create_test_config("http://127.0.0.1:9");
    config.portal.cookie_name = "k9_portal".to_string();
    config.portal.max_age_days = 1;
    config.portal.secure = true;
    let server = TestServer::new(create_test_app(config)).unwrap();

    let response = server
        .post("/api/auth/session")
        .json(&json!({"user": {"id": 1}}))
        .await;

    let cookie = response.header("set-cookie").to_str().unwrap().to_string();
    assert!(cookie.starts_with("k9_portal="));
    assert!(cookie.contains("Max-Age=86400"));
    assert!(cookie.ends_with("; Secure"));
}
