use axum::{
    body::Bytes,
    http::{HeaderMap, Method, StatusCode, header},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC request envelope. Only `params` is ever inspected; any other
/// field the caller sent is carried through `extra` untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcRequest {
    #[serde(default = "default_jsonrpc")]
    pub jsonrpc: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RpcRequest {
    pub fn call(params: Value, id: Option<Value>) -> Self {
        Self {
            jsonrpc: default_jsonrpc(),
            method: default_method(),
            params,
            id,
            extra: Map::new(),
        }
    }

    pub fn params_object_mut(&mut self) -> Option<&mut Map<String, Value>> {
        self.params.as_object_mut()
    }
}

/// JSON-RPC response envelope as returned by the ERP and by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcResponse {
    #[serde(default = "default_jsonrpc")]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

impl RpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: default_jsonrpc(),
            id,
            result: Some(result),
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcErrorObject {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcErrorObject {
    /// Fully qualified exception name reported by the ERP, e.g.
    /// `odoo.http.SessionExpiredException`.
    pub fn exception_name(&self) -> Option<&str> {
        self.data.as_ref()?.get("name")?.as_str()
    }

    /// Most specific human readable message available.
    pub fn display_message(&self) -> String {
        let detailed = self
            .data
            .as_ref()
            .and_then(|d| d.get("message"))
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty());
        match detailed {
            Some(message) => message.to_string(),
            None if !self.message.is_empty() => self.message.clone(),
            None => "ERP call failed".to_string(),
        }
    }

    /// Error details safe to hand to the browser: the server traceback is dropped.
    pub fn public_data(&self) -> Option<Value> {
        let mut data = self.data.clone()?;
        if let Some(fields) = data.as_object_mut() {
            fields.remove("debug");
        }
        Some(data)
    }

    pub fn is_session_expired(&self) -> bool {
        self.code == 100
            || self
                .exception_name()
                .is_some_and(|name| name.contains("SessionExpired"))
    }

    /// HTTP status for an error the ERP embedded in an otherwise successful reply.
    pub fn http_status(&self) -> StatusCode {
        if self.is_session_expired() {
            return StatusCode::UNAUTHORIZED;
        }
        let name = self.exception_name().unwrap_or_default();
        if name.ends_with("AccessDenied") {
            StatusCode::UNAUTHORIZED
        } else if name.ends_with("AccessError") {
            StatusCode::FORBIDDEN
        } else if name.ends_with("MissingError") {
            StatusCode::NOT_FOUND
        } else if name.ends_with("ValidationError") || name.ends_with("UserError") {
            StatusCode::UNPROCESSABLE_ENTITY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Best-effort message from an arbitrary ERP error body.
pub fn error_message_from_body(body: &Value) -> Option<String> {
    if let Some(error) = body.get("error") {
        if error.is_object() {
            if let Ok(rpc) = serde_json::from_value::<RpcErrorObject>(error.clone()) {
                return Some(rpc.display_message());
            }
        }
        if let Some(message) = error.as_str().filter(|m| !m.is_empty()) {
            return Some(message.to_string());
        }
    }
    body.get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

/// What came back from the ERP, before any interpretation.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn set_cookies(&self) -> impl Iterator<Item = &str> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
    }

    pub fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// A request forwarded verbatim by the generic pass-through variant.
#[derive(Debug, Clone)]
pub struct RawRequest {
    pub method: Method,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

fn default_jsonrpc() -> String {
    JSONRPC_VERSION.to_string()
}

fn default_method() -> String {
    "call".to_string()
}
