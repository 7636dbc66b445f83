//! Client for the gateway, speaking the same JSON-RPC dialect as the portal
//! front-end. It keeps a single session token, much like a browser cookie jar
//! restricted to one cookie, and leaves session validity to the ERP.

use crate::{
    Error, Result,
    erp::{RpcErrorObject, RpcRequest},
    session::{cookie_name_of, cookie_value_of},
};
use axum::http::{
    HeaderMap, StatusCode,
    header::{COOKIE, SET_COOKIE},
};
use serde_json::{Value, json};
use std::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

const AUTHENTICATE_PATH: &str = "/web/session/authenticate";
const CALL_KW_PATH: &str = "/web/dataset/call_kw";
const SESSION_INFO_PATH: &str = "/web/session/get_session_info";
const DESTROY_PATH: &str = "/web/session/destroy";

/// Paging for [`RpcClient::search_read`]. Zero and empty values are omitted.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub limit: u32,
    pub offset: u32,
    pub order: String,
}

impl SearchOptions {
    fn to_kwargs(&self) -> Value {
        let mut kwargs = serde_json::Map::new();
        if self.limit > 0 {
            kwargs.insert("limit".to_string(), json!(self.limit));
        }
        if self.offset > 0 {
            kwargs.insert("offset".to_string(), json!(self.offset));
        }
        if !self.order.is_empty() {
            kwargs.insert("order".to_string(), json!(self.order));
        }
        Value::Object(kwargs)
    }
}

pub struct RpcClient {
    http: reqwest::Client,
    base_url: String,
    cookie_name: String,
    session: RwLock<Option<String>>,
}

impl RpcClient {
    /// `base_url` is the gateway mount, e.g. `http://localhost:8080/api/odoo`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::config(format!(
                "Gateway URL must be http(s), got '{}'",
                base_url
            )));
        }
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            cookie_name: "session_id".to_string(),
            session: RwLock::new(None),
        })
    }

    pub fn with_cookie_name(mut self, cookie_name: impl Into<String>) -> Self {
        self.cookie_name = cookie_name.into();
        self
    }

    pub fn session_token(&self) -> Option<String> {
        self.session.read().ok().and_then(|token| token.clone())
    }

    pub fn set_session_token(&self, token: Option<String>) {
        if let Ok(mut slot) = self.session.write() {
            *slot = token;
        }
    }

    /// Sends one JSON-RPC call to `path` and returns its `result`.
    pub async fn call(&self, path: &str, params: Value) -> Result<Value> {
        let envelope = RpcRequest::call(params, Some(Value::String(Uuid::new_v4().to_string())));
        let url = format!("{}{}", self.base_url, path);

        let mut request = self.http.post(&url).json(&envelope);
        if let Some(token) = self.session_token() {
            request = request.header(COOKIE, format!("{}={}", self.cookie_name, token));
        }

        debug!("RPC call to {}", url);
        let response = request.send().await?;
        let status = response.status();
        self.absorb_cookies(response.headers());

        let body: Value = response
            .json()
            .await
            .map_err(|e| {
                Error::invalid_upstream(format!("Gateway returned non-JSON body: {}", e))
            })?;

        if let Some(error) = body.get("error").filter(|error| !error.is_null()) {
            return Err(self.rejection(status, error));
        }
        if !status.is_success() {
            return Err(Error::UpstreamRejected {
                status,
                message: status.canonical_reason().unwrap_or("Gateway error").to_string(),
                data: Some(body),
            });
        }

        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    pub async fn authenticate(
        &self,
        db: Option<&str>,
        login: &str,
        password: &str,
    ) -> Result<Value> {
        let mut params = json!({ "login": login, "password": password });
        if let Some(db) = db {
            params["db"] = json!(db);
        }
        let result = self.call(AUTHENTICATE_PATH, params).await?;
        if self.session_token().is_none() {
            warn!("Authenticated as {} but no session cookie was issued", login);
        }
        Ok(result)
    }

    pub async fn call_kw(
        &self,
        model: &str,
        method: &str,
        args: Value,
        kwargs: Value,
    ) -> Result<Value> {
        self.call(
            CALL_KW_PATH,
            json!({ "model": model, "method": method, "args": args, "kwargs": kwargs }),
        )
        .await
    }

    pub async fn search_read(
        &self,
        model: &str,
        domain: Value,
        fields: &[&str],
        options: &SearchOptions,
    ) -> Result<Vec<Value>> {
        let result = self
            .call_kw(model, "search_read", json!([domain, fields]), options.to_kwargs())
            .await?;
        match result {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            other => Err(Error::invalid_upstream(format!(
                "search_read returned {} instead of a list",
                other
            ))),
        }
    }

    /// `None` when there is no session or the ERP no longer recognises it.
    pub async fn session_info(&self) -> Result<Option<Value>> {
        if self.session_token().is_none() {
            return Ok(None);
        }
        match self.call(SESSION_INFO_PATH, json!({})).await {
            Ok(info) => {
                let has_user = info
                    .get("uid")
                    .is_some_and(|uid| !uid.is_null() && uid != &Value::Bool(false));
                Ok(has_user.then_some(info))
            }
            Err(Error::SessionExpired(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Ends the session on the ERP; the local token is dropped either way.
    pub async fn destroy_session(&self) -> Result<()> {
        if let Err(e) = self.call(DESTROY_PATH, json!({})).await {
            warn!("Could not destroy session, it may have already expired: {}", e);
        }
        self.set_session_token(None);
        Ok(())
    }

    fn absorb_cookies(&self, headers: &HeaderMap) {
        for raw in headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
        {
            if cookie_name_of(raw) != Some(self.cookie_name.as_str()) {
                continue;
            }
            let expired = raw
                .split(';')
                .any(|attr| attr.trim().eq_ignore_ascii_case("max-age=0"));
            match cookie_value_of(raw) {
                Some(token) if !token.is_empty() && !expired => {
                    self.set_session_token(Some(token.to_string()))
                }
                _ => self.set_session_token(None),
            }
        }
    }

    fn rejection(&self, status: StatusCode, error: &Value) -> Error {
        let rpc = serde_json::from_value::<RpcErrorObject>(error.clone())
            .ok()
            .filter(|_| error.is_object())
            .unwrap_or_else(|| RpcErrorObject {
                code: i64::from(status.as_u16()),
                message: error.as_str().unwrap_or_default().to_string(),
                data: None,
            });

        if rpc.is_session_expired() {
            self.set_session_token(None);
            return Error::SessionExpired(rpc.display_message());
        }

        let status = if status.is_success() {
            rpc.http_status()
        } else {
            status
        };
        Error::UpstreamRejected {
            status,
            message: rpc.display_message(),
            data: rpc.data,
        }
    }
}
