use super::types::{
    CreateDogProfileRequest, DogProfileCreated, MessageResponse, PortalSessionRequest,
};
use crate::{
    Error,
    admin::AdminRelay,
    config::Config,
    erp::ErpTransport,
    proxy::{Proxy, ProxyRequest},
    session::{clear_portal_cookie, portal_cookie, session_from_headers},
};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri, header::SET_COOKIE},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub proxy: Arc<Proxy>,
    pub admin: Option<Arc<AdminRelay>>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, transport: Arc<dyn ErpTransport>) -> Self {
        let proxy = Proxy::new(&config, transport.clone());
        let admin = AdminRelay::new(&config, transport).map(Arc::new);
        Self {
            proxy: Arc::new(proxy),
            admin,
            config: Arc::new(config),
        }
    }
}

/// Any verb under the mount point.
pub async fn proxy(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mount = state.config.server.mount_path.trim_end_matches('/');
    let path = uri.path().strip_prefix(mount).unwrap_or_default().to_string();

    let request = ProxyRequest {
        method,
        path,
        query: uri.query().map(str::to_string),
        headers,
        body,
    };
    state.proxy.handle(request).await
}

pub async fn create_portal_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, Error> {
    let request: PortalSessionRequest = serde_json::from_slice(&body)
        .map_err(|_| Error::bad_request("Request body must be a JSON object"))?;
    let user = request
        .user
        .filter(|user| !user.is_null())
        .ok_or_else(|| Error::bad_request("User data is required"))?;

    let portal = &state.config.portal;
    let cookie = portal_cookie(
        &portal.cookie_name,
        &user.to_string(),
        portal.max_age_days,
        portal.secure,
        Utc::now(),
    );

    info!("Portal session created");
    Ok((
        [(SET_COOKIE, cookie)],
        Json(MessageResponse::new("Session created successfully")),
    )
        .into_response())
}

pub async fn delete_portal_session(State(state): State<AppState>) -> Response {
    let portal = &state.config.portal;
    let cookie = clear_portal_cookie(&portal.cookie_name, portal.secure);

    info!("Portal session cleared");
    (
        [(SET_COOKIE, cookie)],
        Json(MessageResponse::new("Session deleted successfully")),
    )
        .into_response()
}

pub async fn create_dog_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, Error> {
    let admin = state
        .admin
        .as_ref()
        .ok_or_else(|| Error::NotConfigured("Admin relay is not configured".to_string()))?;

    let request: CreateDogProfileRequest = serde_json::from_slice(&body)
        .map_err(|e| Error::bad_request(format!("Missing partner_id or dogData: {}", e)))?;
    let (Some(partner_id), Some(dog)) = (request.partner_id.filter(|id| *id > 0), request.dog_data)
    else {
        return Err(Error::bad_request("Missing partner_id or dogData"));
    };

    let session = session_from_headers(
        &headers,
        &state.config.erp.session_header,
        &state.config.session.cookie_name,
    );

    info!("Creating dog profile for partner {}", partner_id);
    let dog_id = admin
        .create_dog_profile(session.as_deref(), partner_id, dog)
        .await?;

    Ok((StatusCode::CREATED, Json(DogProfileCreated { dog_id })).into_response())
}
