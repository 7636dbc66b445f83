pub mod handlers;
pub mod types;

pub use handlers::AppState;

use crate::{
    Result,
    config::Config,
    erp::{ErpTransport, HttpErpTransport},
};
use axum::{
    Router,
    routing::{any, post},
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing::info;

pub const PORTAL_SESSION_PATH: &str = "/api/auth/session";
pub const CREATE_DOG_PROFILE_PATH: &str = "/api/admin/create-dog-profile";

pub fn router(state: AppState) -> Router {
    let mount = state
        .config
        .server
        .mount_path
        .trim_end_matches('/')
        .to_string();

    Router::new()
        .route(&mount, any(handlers::proxy))
        .route(&format!("{}/", mount), any(handlers::proxy))
        .route(&format!("{}/*path", mount), any(handlers::proxy))
        .route(
            PORTAL_SESSION_PATH,
            post(handlers::create_portal_session).delete(handlers::delete_portal_session),
        )
        .route(CREATE_DOG_PROFILE_PATH, post(handlers::create_dog_profile))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: Config) -> Result<()> {
    // Built once; shared read-only by every request.
    let transport: Arc<dyn ErpTransport> =
        Arc::new(HttpErpTransport::new(&config.erp, &config.session)?);

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    let mount = config.server.mount_path.clone();

    let state = AppState::new(config, transport);
    if state.admin.is_none() {
        info!("Admin relay disabled: no admin credentials configured");
    }

    let app = router(state);

    info!("Starting gateway on {} (proxy mounted at {})", addr, mount);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
