//! REST API for the telemetry hub
//!
//! Collectors push samples and neighbor reports here; operators read back
//! metric history, alerts, syslog and links.
//!
//! ## Endpoints
//!
//! - `GET /api/v1/health` - Health check (never requires a token)
//! - `POST /api/v1/metrics` - Ingest one sample and evaluate it
//! - `GET /api/v1/devices/{id}/metrics` - Sample history
//! - `GET /api/v1/devices/{id}/interfaces` - Interface counter history
//! - `GET /api/v1/alerts` - Recent alerts
//! - `WS /api/v1/alerts/stream` - Real-time alert streaming
//! - `POST /api/v1/rules/reload` - Reload alert rules
//! - `GET /api/v1/syslog` - Recent syslog messages
//! - `POST /api/v1/topology/reports` - Reconcile a neighbor report
//! - `GET /api/v1/topology/links` - Known links

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod types;
pub mod websocket;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;
pub use types::{
    AlertsResponse, HealthResponse, IngestResponse, InterfacesResponse, LinksResponse,
    MetricsResponse, RulesReloadResponse,
};

use std::net::SocketAddr;

use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080")
    pub bind_addr: SocketAddr,

    /// Optional authentication token
    pub auth_token: Option<String>,

    /// Enable permissive CORS
    pub enable_cors: bool,
}

impl From<&crate::config::ApiConfig> for ApiServerConfig {
    fn from(config: &crate::config::ApiConfig) -> Self {
        Self {
            bind_addr: config.socket_addr(),
            auth_token: config.token.clone(),
            enable_cors: config.cors,
        }
    }
}

/// Build the router with all routes
pub fn router(config: &ApiServerConfig, state: ApiState) -> Router {
    let mut protected = Router::new()
        .route("/api/v1/metrics", post(routes::metrics::ingest_metric))
        .route(
            "/api/v1/devices/:id/metrics",
            get(routes::devices::get_device_metrics),
        )
        .route(
            "/api/v1/devices/:id/interfaces",
            get(routes::devices::get_device_interfaces),
        )
        .route("/api/v1/alerts", get(routes::alerts::list_alerts))
        .route(
            "/api/v1/alerts/stream",
            get(websocket::alert_stream_handler),
        )
        .route("/api/v1/rules/reload", post(routes::rules::reload_rules))
        .route("/api/v1/syslog", get(routes::syslog::list_syslog))
        .route(
            "/api/v1/topology/reports",
            post(routes::topology::submit_report),
        )
        .route("/api/v1/topology/links", get(routes::topology::list_links));

    if let Some(token) = config.auth_token.clone() {
        protected = protected.route_layer(axum::middleware::from_fn_with_state(
            token,
            middleware::auth::require_hub_token,
        ));
    }

    // an unconfigured CorsLayer adds no CORS headers
    let cors = if config.enable_cors {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .merge(protected)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task.
/// Returns the server's local address.
pub async fn spawn_api_server(
    config: ApiServerConfig,
    state: ApiState,
) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", config.bind_addr);

    let app = router(&config, state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
