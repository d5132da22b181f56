//! Probe and metrics endpoints, plus the HTTP/HTTPS listeners
//!
//! - `/healthz` - Liveness: Is the process alive?
//! - `/readyz` - Readiness: Should the API server send conversions here?
//! - `/metrics` - Prometheus metrics in text format
//!
//! `/convert` is mounted next to these by [`super::webhook::build_router`].

use super::metrics::SharedMetrics;
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Prometheus text exposition format
const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Whether the webhook should receive traffic
///
/// `main` flips this on once the listener task is spawned and off again
/// as soon as a termination signal arrives.
#[derive(Debug, Clone, Default)]
pub struct ReadinessState {
    ready: Arc<AtomicBool>,
}

impl ReadinessState {
    /// Create a new readiness state (initially not ready)
    pub fn new() -> Self {
        Self::default()
    }

    /// Start answering `/readyz` with 200
    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Answer `/readyz` with 503 so the Service drops this pod from its endpoints
    pub fn set_not_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    /// Current readiness
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// State shared by every handler, probes and `/convert` alike
#[derive(Clone)]
pub struct ServerState {
    readiness: ReadinessState,
    metrics: SharedMetrics,
}

impl ServerState {
    /// Bundle readiness and metrics for the router
    pub fn new(readiness: ReadinessState, metrics: SharedMetrics) -> Self {
        Self { readiness, metrics }
    }

    /// Registry the conversion handler records into
    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }
}

/// Liveness probe handler
///
/// Answers 200 whenever the runtime can schedule the handler at all.
async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe handler
///
/// 200 while ready, 503 before startup completes and during shutdown.
async fn readyz(State(state): State<ServerState>) -> StatusCode {
    if state.readiness.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Prometheus scrape handler
///
/// Encoding failures are reported as 500 with the error text.
async fn metrics(State(state): State<ServerState>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (StatusCode::OK, [(CONTENT_TYPE, METRICS_CONTENT_TYPE)], body).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", e),
        )
            .into_response(),
    }
}

/// Probe and metrics routes, still waiting for their [`ServerState`]
pub fn probe_routes() -> Router<ServerState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(self::metrics))
}

fn listen_addr(port: u16) -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], port))
}

/// Serve the webhook router over plain HTTP
///
/// Only useful for local runs and tests: the API server refuses to call a
/// conversion webhook over HTTP. Runs until the task is aborted or the
/// listener fails.
pub async fn run_health_server(
    port: u16,
    readiness: ReadinessState,
    metrics: SharedMetrics,
) -> Result<(), std::io::Error> {
    let app = super::webhook::build_router(readiness, metrics);
    let listener = TcpListener::bind(listen_addr(port)).await?;
    info!(port = %port, "Conversion webhook listening (HTTP)");

    axum::serve(listener, app)
        .await
        .map_err(std::io::Error::other)
}

/// Serve the webhook router over HTTPS with the bootstrapped certificate
///
/// # Arguments
/// * `port` - Port the webhook Service targets (8443 by default)
/// * `readiness` - Shared readiness flag for `/readyz`
/// * `metrics` - Registry exposed on `/metrics`
/// * `tls_config` - Built by [`super::tls::build_rustls_config`]
pub async fn run_health_server_tls(
    port: u16,
    readiness: ReadinessState,
    metrics: SharedMetrics,
    tls_config: Arc<rustls::ServerConfig>,
) -> Result<(), std::io::Error> {
    use axum_server::tls_rustls::RustlsConfig;

    let app = super::webhook::build_router(readiness, metrics);
    let config = RustlsConfig::from_config(tls_config);
    info!(port = %port, "Conversion webhook listening (HTTPS)");

    axum_server::bind_rustls(listen_addr(port), config)
        .serve(app.into_make_service())
        .await
}
