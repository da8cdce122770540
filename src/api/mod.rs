//! HTTP server for the metric store
//!
//! ## Endpoints
//!
//! - `POST /update/{type}/{name}/{value}` - Update a single metric
//! - `POST /update/` - Update a single metric from a JSON body
//! - `POST /updates/` - Apply a batch of JSON metrics atomically
//! - `GET /value/{type}/{name}` - Current value as text
//! - `POST /value/` - Current value as JSON
//! - `GET /ping` - Database health check
//! - `GET /` - HTML listing of all metrics

pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;

use std::future::Future;
use std::net::SocketAddr;

use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "localhost:8080")
    pub bind_addr: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "localhost:8080".to_string(),
        }
    }
}

/// Build the router with all routes
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(routes::root::list_metrics))
        .route(
            "/update/:kind/:name/:value",
            post(routes::update::update_from_path),
        )
        .route("/update/", post(routes::update::update_json))
        .route("/updates/", post(routes::update::bulk_update))
        .route("/value/:kind/:name", get(routes::value::value_from_path))
        .route("/value/", post(routes::value::value_json))
        .route("/ping", get(routes::ping::ping))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Serve the API until `shutdown` resolves
pub async fn serve(
    config: ApiConfig,
    state: ApiState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("API server listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("API server stopped");
    Ok(())
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task.
/// Returns the server's local address.
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router(state)).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
