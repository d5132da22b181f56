use anyhow::Context;
use imagepolicy::config::WebhookConfig;
use imagepolicy::server::{
    build_rustls_config, create_metrics, initialize_tls, run_health_server, run_health_server_tls,
    shutdown_channel, wait_for_signal, ReadinessState,
};
use kube::Client;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = WebhookConfig::from_env()?;
    info!(
        tls = config.tls_enabled,
        port = config.listen_port(),
        "Starting ClusterImagePolicy conversion webhook"
    );

    let (shutdown_controller, mut shutdown_signal) = shutdown_channel();
    let readiness = ReadinessState::new();
    let metrics = create_metrics().context("Failed to create metrics registry")?;

    // The API server only calls conversion webhooks over HTTPS
    let tls_config = if config.tls_enabled {
        let client = Client::try_default()
            .await
            .context("Failed to create Kubernetes client")?;
        info!(
            service = %config.service_name,
            namespace = %config.namespace,
            "Initializing webhook TLS certificates"
        );

        let bundle = initialize_tls(
            &client,
            &config.service_name,
            &config.namespace,
            &config.tls_secret,
        )
        .await
        .context("Failed to initialize TLS certificates")?;
        Some(build_rustls_config(&bundle).context("Failed to build TLS config")?)
    } else {
        info!("Webhook TLS disabled - serving plain HTTP");
        None
    };

    let port = config.listen_port();
    let server_readiness = readiness.clone();
    let mut server = tokio::spawn(async move {
        let serve = async move {
            match tls_config {
                Some(tls) => run_health_server_tls(port, server_readiness, metrics, tls).await,
                None => run_health_server(port, server_readiness, metrics).await,
            }
        };
        tokio::select! {
            served = serve => {
                if let Err(e) = served {
                    error!(error = %e, port, "Server failed");
                }
            }
            _ = shutdown_signal.wait() => {
                info!("Server stopping");
            }
        }
    });

    readiness.set_ready();

    tokio::select! {
        _ = &mut server => {
            warn!("Server task exited, shutting down");
        }
        signal = wait_for_signal() => {
            match signal {
                Ok(name) => info!(signal = name, "Initiating graceful shutdown"),
                Err(e) => warn!(error = %e, "Failed to listen for signals, shutting down"),
            }
        }
    }

    // Stop receiving traffic before the listener goes away
    readiness.set_not_ready();
    shutdown_controller.shutdown();
    if !server.is_finished() {
        if let Err(e) = server.await {
            warn!(error = %e, "Server task did not stop cleanly");
        }
    }

    info!("Conversion webhook shut down");
    Ok(())
}
