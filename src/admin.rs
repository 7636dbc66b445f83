//! Privileged calls made with the configured admin account.
//!
//! The caller's own session is checked with the ERP first; the admin session
//! is created per operation and never kept.

use crate::{
    Error, Result,
    config::{AdminCredentials, Config},
    erp::{ErpTransport, RpcRequest},
    proxy::interpret,
    session::{cookie_name_of, cookie_value_of},
};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const CALL_KW_PATH: &str = "/web/dataset/call_kw";
pub const SESSION_INFO_PATH: &str = "/web/session/get_session_info";

const PARTNER_MODEL: &str = "res.partner";
const CATEGORY_MODEL: &str = "res.partner.category";
const DOG_CATEGORY: &str = "Dog";

/// Token of a freshly authenticated admin session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSession(String);

impl AdminSession {
    pub fn token(&self) -> &str {
        &self.0
    }
}

/// The parts of the ERP's session info the gateway cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInfo {
    pub uid: Option<i64>,
    pub partner_id: Option<i64>,
    pub username: Option<String>,
}

impl SessionInfo {
    pub fn from_result(result: &Value) -> Self {
        Self {
            uid: result.get("uid").and_then(record_id),
            partner_id: result.get("partner_id").and_then(record_id),
            username: result
                .get("username")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.uid.is_some()
    }
}

/// ERP ids arrive as `7`, `[7, "Name"]` or `false`.
fn record_id(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_array()?.first()?.as_i64())
}

pub struct AdminRelay {
    transport: Arc<dyn ErpTransport>,
    credentials: AdminCredentials,
    database: String,
    login_path: String,
    cookie_name: String,
}

impl AdminRelay {
    /// `None` when no admin credentials are configured.
    pub fn new(config: &Config, transport: Arc<dyn ErpTransport>) -> Option<Self> {
        let credentials = config.erp.admin.clone()?;
        Some(Self {
            transport,
            credentials,
            database: config.erp.database.clone(),
            login_path: config.erp.login_path.clone(),
            cookie_name: config.session.cookie_name.clone(),
        })
    }

    pub async fn login(&self) -> Result<AdminSession> {
        let envelope = envelope(json!({
            "db": self.database,
            "login": self.credentials.username,
            "password": self.credentials.password,
        }));

        let upstream = self.transport.call(&self.login_path, &envelope, None).await?;
        let body = interpret(&upstream).map_err(|e| match e {
            Error::UpstreamRejected { message, .. } => {
                Error::internal(format!("Admin authentication failed: {}", message))
            }
            other => other,
        })?;

        let result = body.get("result").cloned().unwrap_or(Value::Null);
        if !SessionInfo::from_result(&result).is_authenticated() {
            return Err(Error::internal("Admin authentication was refused"));
        }

        let from_cookie = upstream
            .set_cookies()
            .find(|raw| cookie_name_of(raw) == Some(self.cookie_name.as_str()))
            .and_then(cookie_value_of)
            .filter(|token| !token.is_empty())
            .map(str::to_string);
        let from_body = || {
            result
                .get("session_id")
                .and_then(Value::as_str)
                .filter(|token| !token.is_empty())
                .map(str::to_string)
        };

        let token = from_cookie
            .or_else(from_body)
            .ok_or_else(|| Error::internal("Admin session cookie not found after authentication"))?;

        debug!("Admin session established for {}", self.credentials.username);
        Ok(AdminSession(token))
    }

    pub async fn call_kw(
        &self,
        session: &AdminSession,
        model: &str,
        method: &str,
        args: Value,
        kwargs: Value,
    ) -> Result<Value> {
        let envelope = envelope(json!({
            "model": model,
            "method": method,
            "args": args,
            "kwargs": kwargs,
        }));

        debug!("Admin call {}.{}", model, method);
        let upstream = self
            .transport
            .call(CALL_KW_PATH, &envelope, Some(session.token()))
            .await?;
        let body = interpret(&upstream)?;
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Asks the ERP who owns `caller_session`.
    pub async fn session_info(&self, caller_session: &str) -> Result<SessionInfo> {
        let upstream = self
            .transport
            .call(SESSION_INFO_PATH, &envelope(json!({})), Some(caller_session))
            .await?;

        let body = interpret(&upstream).map_err(|e| match e {
            Error::UpstreamRejected { status, .. } if status.as_u16() == 401 => {
                Error::unauthorized("Session is not valid")
            }
            other => other,
        })?;

        let info = body
            .get("result")
            .map(SessionInfo::from_result)
            .unwrap_or_default();
        if !info.is_authenticated() {
            return Err(Error::unauthorized("Session is not valid"));
        }
        Ok(info)
    }

    /// Creates a dog as a child contact of `partner_id`, returning the new id.
    pub async fn create_dog_profile(
        &self,
        caller_session: Option<&str>,
        partner_id: i64,
        dog: Map<String, Value>,
    ) -> Result<i64> {
        let caller_session =
            caller_session.ok_or_else(|| Error::unauthorized("A portal session is required"))?;

        let caller = self.session_info(caller_session).await?;
        if caller.partner_id != Some(partner_id) {
            warn!(
                "User {:?} tried to create a dog for partner {}",
                caller.username, partner_id
            );
            return Err(Error::Forbidden {
                path: format!("partner {}", partner_id),
            });
        }

        let admin = self.login().await?;

        let categories = self
            .call_kw(
                &admin,
                CATEGORY_MODEL,
                "search_read",
                json!([[["name", "=", DOG_CATEGORY]], ["id"]]),
                json!({ "limit": 1 }),
            )
            .await?;
        let category_id = categories
            .as_array()
            .and_then(|rows| rows.first())
            .and_then(|row| row.get("id"))
            .and_then(Value::as_i64);

        let mut record = dog;
        record.insert("parent_id".to_string(), json!(partner_id));
        record.insert(
            "category_id".to_string(),
            match category_id {
                Some(id) => json!([[6, 0, [id]]]),
                None => json!([]),
            },
        );

        let created = self
            .call_kw(&admin, PARTNER_MODEL, "create", json!([record]), json!({}))
            .await?;
        let dog_id = record_id(&created)
            .ok_or_else(|| Error::invalid_upstream("ERP did not return the new record id"))?;

        info!("Created dog profile {} for partner {}", dog_id, partner_id);
        Ok(dog_id)
    }
}

fn envelope(params: Value) -> RpcRequest {
    RpcRequest::call(params, Some(Value::String(Uuid::new_v4().to_string())))
}
