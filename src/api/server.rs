//! HTTP server setup and configuration.

use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use reqwest::Client;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::handlers::{self, REQUEST_ID_HEADER};
use crate::config::{Config, ConfigError};
use crate::error::{Error, Result};
use crate::metrics::OutcomeSink;
use crate::registry::Registry;
use crate::router::{Executor, Selector};
use crate::storage::{self, SqliteSink};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<Executor>,
    pub config: Arc<Config>,
    /// Outcome log, when `[database]` is configured.
    pub db: Option<SqlitePool>,
}

/// Identifier assigned to every incoming request.
#[derive(Debug, Clone, Copy)]
pub struct RequestId(pub Uuid);

/// Create the axum router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/execute", post(handlers::execute))
        .route("/v1/providers", get(handlers::list_providers))
        .route("/v1/stats", get(handlers::stats))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(middleware::from_fn(assign_request_id))
        .layer(TraceLayer::new_for_http())
}

/// Tag the request with a fresh [`RequestId`] and echo it in the response.
async fn assign_request_id(mut request: Request, next: Next) -> Response {
    let request_id = RequestId(Uuid::new_v4());
    request.extensions_mut().insert(request_id);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id.0.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Build the registry and executor described by a configuration.
pub fn build_executor(
    config: &Config,
    http_client: Client,
    sink: Option<Arc<dyn OutcomeSink>>,
) -> std::result::Result<Executor, ConfigError> {
    let mut builder = Registry::builder()
        .http_client(http_client)
        .timeout(config.routing.request_timeout());
    if let Some(sink) = sink {
        builder = builder.sink(sink);
    }
    let registry = builder.build(&config.providers)?;

    Ok(Executor::new(Arc::new(registry))
        .with_selector(Selector::new(config.routing.criteria))
        .with_retry_policy(config.routing.retry_policy()))
}

/// Run the HTTP server.
pub async fn run_server(config: Config) -> Result<()> {
    let listen_addr = config.server.listen.clone();

    let db = match &config.database {
        Some(db_config) => {
            let pool = storage::init_pool(&db_config.path).await?;
            tracing::info!(path = %db_config.path, "Outcome log opened");
            Some(pool)
        }
        None => None,
    };

    let sink: Option<Arc<dyn OutcomeSink>> = match &db {
        Some(pool) if config.logging.log_outcomes => Some(Arc::new(SqliteSink::new(pool.clone()))),
        _ => None,
    };

    // Per-backend timeouts are enforced by each backend; this one only
    // bounds connection setup.
    let http_client = Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| Error::Internal(format!("failed to build HTTP client: {}", e)))?;

    let executor = build_executor(&config, http_client, sink)?;

    let state = AppState {
        executor: Arc::new(executor),
        config: Arc::new(config),
        db,
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .map_err(|e| Error::Internal(format!("failed to bind {}: {}", listen_addr, e)))?;
    tracing::info!(address = %listen_addr, "Starting switchboard server");

    axum::serve(listener, app)
        .await
        .map_err(|e| Error::Internal(format!("server error: {}", e)))?;

    Ok(())
}
