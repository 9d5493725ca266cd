//! HTTP server implementation using Axum.

use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use prospector_core::config::GatewayConfig;
use prospector_core::error::Result;
use prospector_engine::Engine;
use prospector_store::Store;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub engine: Engine,
    pub start_time: std::time::Instant,
}

/// Build the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(super::routes::health_check))
        // profiles
        .route("/api/profiles", get(super::routes::list_profiles))
        .route("/api/profiles", post(super::routes::create_profile))
        .route("/api/profiles/import", post(super::routes::import_profiles))
        .route("/api/profiles/{id}", get(super::routes::get_profile))
        .route("/api/profiles/{id}", delete(super::routes::delete_profile))
        // connections
        .route("/api/connections", get(super::routes::list_connections))
        .route("/api/connections/start", post(super::routes::start_connections))
        .route("/api/connections/retry", post(super::routes::retry_connections))
        .route("/api/connections/runs", get(super::routes::list_runs))
        .route("/api/connections/runs/{id}", get(super::routes::get_run))
        .route("/api/connections/{id}", get(super::routes::get_connection))
        // messages
        .route("/api/messages", get(super::routes::list_messages))
        .route("/api/messages/send-followup", post(super::routes::send_followup))
        .route("/api/messages/{id}", get(super::routes::get_message))
        // campaign
        .route("/api/stats", get(super::routes::stats))
        .route("/api/settings", get(super::routes::get_settings))
        .route("/api/settings", put(super::routes::update_settings))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server. Runs until the process exits.
pub async fn start_server(config: &GatewayConfig, state: Arc<AppState>) -> Result<()> {
    let app = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🌐 Gateway listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
