//! Session-mediated relay between the browser and the ERP.
//!
//! Every inbound request produces at most one outbound request. Nothing is
//! remembered between calls: the session token arrives with the request and
//! leaves with it. If the browser hangs up, dropping the handler future is the
//! only cancellation the upstream call gets.

mod policy;

pub use policy::{ErpPath, PathPolicy};

use crate::{
    Error, Result,
    config::Config,
    erp::{
        ErpTransport, RawRequest, RpcErrorObject, RpcRequest, RpcResponse, UpstreamResponse,
        error_message_from_body, strip_hop_by_hop,
    },
    session::{cookie_name_of, normalize_set_cookie, session_cookie, session_from_headers},
};
use axum::{
    body::{Body, Bytes},
    http::{
        HeaderMap, HeaderValue, Method, StatusCode,
        header::{CONTENT_LENGTH, SET_COOKIE},
    },
    response::{IntoResponse, Json, Response},
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An inbound call, with `path` being everything after the mount point.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub struct Proxy {
    transport: Arc<dyn ErpTransport>,
    policy: PathPolicy,
    login_path: String,
    database: String,
    session_header: String,
    cookie_name: String,
    secure_cookies: bool,
}

impl Proxy {
    pub fn new(config: &Config, transport: Arc<dyn ErpTransport>) -> Self {
        let login_path = config.erp.login_path.trim_end_matches('/').to_string();
        Self {
            transport,
            policy: PathPolicy::new(&config.proxy.denied_paths),
            login_path,
            database: config.erp.database.clone(),
            session_header: config.erp.session_header.clone(),
            cookie_name: config.session.cookie_name.clone(),
            secure_cookies: config.session.secure,
        }
    }

    /// Relays one call. Never fails: every error becomes a JSON error response.
    pub async fn handle(&self, request: ProxyRequest) -> Response {
        let method = request.method.clone();
        let path = request.path.clone();

        match self.dispatch(request).await {
            Ok(response) => response,
            Err(e) => {
                if !e.status().is_server_error() {
                    warn!("{} {} rejected: {}", method, path, e);
                }
                e.into_response()
            }
        }
    }

    async fn dispatch(&self, request: ProxyRequest) -> Result<Response> {
        if request.method == Method::OPTIONS {
            return Ok(StatusCode::NO_CONTENT.into_response());
        }

        let path = self.policy.check(&request.path)?;

        if request.method != Method::POST {
            return self.forward(&path, request).await;
        }

        let envelope = parse_envelope(&request.body)?;
        let target = upstream_target(&path, request.query.as_deref());

        if path.route == self.login_path {
            self.authenticate(&target, envelope).await
        } else {
            let session =
                session_from_headers(&request.headers, &self.session_header, &self.cookie_name);
            self.relay(&target, envelope, session).await
        }
    }

    async fn authenticate(&self, target: &str, mut envelope: RpcRequest) -> Result<Response> {
        let params = envelope
            .params_object_mut()
            .ok_or_else(|| Error::bad_request("Authentication params must be an object"))?;

        for field in ["login", "password"] {
            let present = params
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|value| !value.is_empty());
            if !present {
                return Err(Error::bad_request(format!(
                    "Missing required field: params.{}",
                    field
                )));
            }
        }

        let db_supplied = match params.get("db") {
            None | Some(Value::Null) => false,
            Some(Value::String(db)) => !db.trim().is_empty(),
            Some(_) => true,
        };
        if !db_supplied {
            params.insert("db".to_string(), Value::String(self.database.clone()));
        }

        let login = params
            .get("login")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        info!("Authenticating '{}' through {}", login, target);

        let upstream = self.transport.call(target, &envelope, None).await?;
        let body = interpret(&upstream)?;

        let mut result = body
            .get("result")
            .cloned()
            .filter(|result| !result.is_null())
            .ok_or_else(|| Error::invalid_upstream("Authentication response carried no result"))?;

        if matches!(result.get("uid"), Some(Value::Null | Value::Bool(false))) {
            return Err(Error::unauthorized("Invalid login or password"));
        }

        let mut cookies = self.session_cookies(&upstream);
        if cookies.is_empty() {
            // The token moves from the body into the cookie it becomes.
            let body_token = result
                .as_object_mut()
                .and_then(|fields| fields.remove("session_id"))
                .and_then(|token| token.as_str().map(str::to_string))
                .filter(|token| !token.is_empty());
            if let Some(token) = body_token {
                cookies.push(session_cookie(&self.cookie_name, &token, self.secure_cookies));
            }
        }

        if cookies.is_empty() {
            warn!("ERP authenticated '{}' without issuing a session", login);
        } else {
            info!("Authenticated '{}', issuing {} cookie(s)", login, cookies.len());
        }

        let mut response = Json(RpcResponse::success(envelope.id, result)).into_response();
        append_cookies(response.headers_mut(), cookies);
        Ok(response)
    }

    async fn relay(
        &self,
        target: &str,
        envelope: RpcRequest,
        session: Option<String>,
    ) -> Result<Response> {
        debug!(
            "Relaying call to {} (session: {})",
            target,
            if session.is_some() { "present" } else { "absent" }
        );

        let upstream = self.transport.call(target, &envelope, session.as_deref()).await?;
        let body = interpret(&upstream)?;

        let already_enveloped = body
            .as_object()
            .is_some_and(|fields| fields.contains_key("result"));
        let mut response = if already_enveloped {
            (upstream.status, Json(body)).into_response()
        } else {
            (upstream.status, Json(RpcResponse::success(envelope.id, body))).into_response()
        };

        append_cookies(response.headers_mut(), self.session_cookies(&upstream));
        Ok(response)
    }

    async fn forward(&self, path: &ErpPath, request: ProxyRequest) -> Result<Response> {
        let raw = RawRequest {
            method: request.method,
            path_and_query: upstream_target(path, request.query.as_deref()),
            headers: request.headers,
            body: request.body,
        };

        let upstream = self.transport.forward(raw).await?;

        let mut headers = upstream.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(CONTENT_LENGTH);

        let mut response = Response::new(Body::from(upstream.body));
        *response.status_mut() = upstream.status;
        *response.headers_mut() = headers;
        Ok(response)
    }

    /// ERP session cookies, rewritten for the browser.
    fn session_cookies(&self, upstream: &UpstreamResponse) -> Vec<String> {
        upstream
            .set_cookies()
            .filter(|raw| cookie_name_of(raw) == Some(self.cookie_name.as_str()))
            .filter_map(|raw| normalize_set_cookie(raw, self.secure_cookies))
            .collect()
    }
}

fn parse_envelope(body: &Bytes) -> Result<RpcRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(Error::bad_request("Request body is required"));
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| Error::bad_request(format!("Request body is not valid JSON: {}", e)))?;
    if !value.is_object() {
        return Err(Error::bad_request("Request body must be a JSON-RPC object"));
    }
    serde_json::from_value(value)
        .map_err(|e| Error::bad_request(format!("Malformed JSON-RPC envelope: {}", e)))
}

fn upstream_target(path: &ErpPath, query: Option<&str>) -> String {
    match query.filter(|q| !q.is_empty()) {
        Some(query) => format!("{}?{}", path.upstream, query),
        None => path.upstream.clone(),
    }
}

/// Turns an ERP reply into its JSON body, or the error it stands for.
pub(crate) fn interpret(upstream: &UpstreamResponse) -> Result<Value> {
    let status = upstream.status;
    let body = upstream.json();

    if !status.is_success() {
        let message = body
            .as_ref()
            .and_then(error_message_from_body)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Upstream error")
                    .to_string()
            });
        return Err(Error::UpstreamRejected {
            status,
            message,
            data: body.and_then(|body| public_error_data(&body)),
        });
    }

    let body = body.ok_or_else(|| {
        Error::invalid_upstream(format!("ERP returned a non-JSON body with status {}", status))
    })?;

    if let Some(error) = body.get("error").filter(|error| !error.is_null()) {
        let rpc = serde_json::from_value::<RpcErrorObject>(error.clone())
            .ok()
            .filter(|_| error.is_object())
            .unwrap_or_else(|| RpcErrorObject {
                code: 0,
                message: error.as_str().unwrap_or_default().to_string(),
                data: None,
            });
        return Err(Error::UpstreamRejected {
            status: rpc.http_status(),
            message: rpc.display_message(),
            data: rpc.public_data(),
        });
    }

    Ok(body)
}

/// Error data of a failed ERP reply, in the same shape as an embedded error.
fn public_error_data(body: &Value) -> Option<Value> {
    if let Some(error) = body.get("error").filter(|error| error.is_object()) {
        return serde_json::from_value::<RpcErrorObject>(error.clone())
            .ok()
            .and_then(|rpc| rpc.public_data());
    }
    let mut data = body.clone();
    if let Some(fields) = data.as_object_mut() {
        fields.remove("debug");
    }
    Some(data)
}

fn append_cookies(headers: &mut HeaderMap, cookies: Vec<String>) {
    for cookie in cookies {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                headers.append(SET_COOKIE, value);
            }
            Err(_) => warn!("Dropping session cookie with invalid characters"),
        }
    }
}
