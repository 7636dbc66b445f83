use axum::{
    Router,
    body::{Body, Bytes},
    http::{Request, Response},
};
use customk9_gateway::{
    config::{AdminCredentials, Config},
    erp::{ErpTransport, HttpErpTransport},
    server::{AppState, router},
};
use serde_json::Value;
use std::sync::Arc;

pub const MOUNT: &str = "/api/odoo";
pub const DATABASE: &str = "customk9";
pub const ADMIN_LOGIN: &str = "admin@customk9.test";

/// Create a test configuration pointing at `base_url`
pub fn create_test_config(base_url: &str) -> Config {
    let mut config = Config::default();
    config.erp.base_url = base_url.to_string();
    config.erp.database = DATABASE.to_string();
    config.server.host = "127.0.0.1".to_string();
    config.server.logs.level = "debug".to_string();
    config
}

/// Same as [`create_test_config`] with admin credentials set
pub fn create_admin_config(base_url: &str) -> Config {
    let mut config = create_test_config(base_url);
    config.erp.admin = Some(AdminCredentials {
        username: ADMIN_LOGIN.to_string(),
        password: "admin-secret".to_string(),
    });
    config
}

/// Router wired to the real HTTP transport
pub fn create_test_app(config: Config) -> Router {
    let transport: Arc<dyn ErpTransport> =
        Arc::new(HttpErpTransport::new(&config.erp, &config.session).unwrap());
    router(AppState::new(config, transport))
}

/// Router wired to any transport, typically a mock
pub fn create_app_with_transport(config: Config, transport: Arc<dyn ErpTransport>) -> Router {
    router(AppState::new(config, transport))
}

/// Serves `app` on an ephemeral port and returns its base URL
pub async fn spawn_app(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A local URL nothing is listening on
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// JSON-RPC `call` envelope
pub fn rpc(params: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": "call",
        "id": 1,
        "params": params
    })
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn post_json_with_cookie(uri: &str, body: &Value, cookie: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("cookie", cookie)
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn read_body(response: Response<Body>) -> Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}

pub async fn read_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&read_body(response).await).unwrap()
}

/// Every `Set-Cookie` value on a response
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

/// Sample configuration YAML for testing
pub const SAMPLE_CONFIG_YAML: &str = r#"
server:
  host: "127.0.0.1"
  port: 9090
  mount_path: "/api/erp"
  logs:
    level: "debug"

erp:
  base_url: "https://erp.customk9.test"
  database: "customk9"
  timeout_secs: 20

session:
  cookie_name: "session_id"
  secure: true

portal:
  cookie_name: "customk9_session"
  max_age_days: 14

proxy:
  denied_paths:
    - "/web/database"
    - "/web/session/change_password"
    - "/web/binary/upload"
"#;

/// Configuration without the mandatory ERP settings
pub const INCOMPLETE_CONFIG_YAML: &str = r#"
server:
  port: 8080
erp:
  login_path: "/web/session/authenticate"
"#;
