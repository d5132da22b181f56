//! HTTP(S) server for the conversion webhook
//!
//! Serves the `/convert` endpoint the API server calls, plus Kubernetes
//! health probes and Prometheus metrics:
//! - `/healthz` - Liveness probe (process is running)
//! - `/readyz` - Readiness probe (webhook is ready to serve)
//! - `/metrics` - Conversion counters
//!
//! Also provides graceful shutdown handling for SIGTERM/SIGINT and TLS
//! certificate bootstrap.

mod health;
pub mod metrics;
pub mod shutdown;
pub mod tls;
pub mod webhook;

pub use health::{run_health_server, run_health_server_tls, ReadinessState, ServerState};
pub use metrics::{create_metrics, Metrics, MetricsError, SharedMetrics};
pub use shutdown::{shutdown_channel, wait_for_signal, ShutdownController, ShutdownSignal};
pub use tls::{build_rustls_config, initialize_tls, CertificateBundle, TlsError};
pub use webhook::{build_router, convert_policies};

#[cfg(test)]
#[path = "health_test.rs"]
mod health_tests;

#[cfg(test)]
#[path = "shutdown_test.rs"]
mod shutdown_tests;

#[cfg(test)]
#[path = "tls_test.rs"]
mod tls_tests;
