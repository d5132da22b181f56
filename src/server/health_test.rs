//! Tests for health, metrics, and conversion endpoints

use super::metrics::create_metrics;
use super::*;
use serde_json::json;
use std::time::Duration;

/// Wait for server to be ready with retry logic
///
/// Retries connection up to max_retries times with exponential backoff.
async fn wait_for_server(port: u16, max_retries: u32) -> reqwest::Client {
    let client = reqwest::Client::new();
    let mut delay = Duration::from_millis(10);

    for attempt in 1..=max_retries {
        match client
            .get(format!("http://127.0.0.1:{}/healthz", port))
            .timeout(Duration::from_millis(100))
            .send()
            .await
        {
            Ok(_) => return client,
            Err(_) if attempt < max_retries => {
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, Duration::from_millis(200));
            }
            Err(e) => panic!("Server not ready after {} attempts: {}", max_retries, e),
        }
    }
    client
}

fn spawn_server(
    port: u16,
    readiness: ReadinessState,
) -> tokio::task::JoinHandle<Result<(), std::io::Error>> {
    let metrics = create_metrics().expect("metrics registry");
    tokio::spawn(async move { run_health_server(port, readiness, metrics).await })
}

#[tokio::test]
async fn test_healthz_returns_200() {
    let readiness = ReadinessState::new();
    let port = 18180;
    let server_handle = spawn_server(port, readiness.clone());

    let client = wait_for_server(port, 10).await;

    let response = client
        .get(format!("http://127.0.0.1:{}/healthz", port))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to connect to health server");

    assert_eq!(response.status(), 200, "Liveness probe should return 200");

    server_handle.abort();
}

#[tokio::test]
async fn test_readyz_follows_readiness_state() {
    let readiness = ReadinessState::new();
    let port = 18181;
    let server_handle = spawn_server(port, readiness.clone());

    let client = wait_for_server(port, 10).await;
    let readyz = format!("http://127.0.0.1:{}/readyz", port);

    let response = client.get(&readyz).send().await.expect("readyz request");
    assert_eq!(response.status(), 503, "Not ready yet");

    readiness.set_ready();
    let response = client.get(&readyz).send().await.expect("readyz request");
    assert_eq!(response.status(), 200, "Ready after set_ready()");

    readiness.set_not_ready();
    let response = client.get(&readyz).send().await.expect("readyz request");
    assert_eq!(response.status(), 503, "Not ready during shutdown");

    server_handle.abort();
}

#[tokio::test]
async fn test_convert_endpoint_and_metrics() {
    let readiness = ReadinessState::new();
    let port = 18182;
    let server_handle = spawn_server(port, readiness);

    let client = wait_for_server(port, 10).await;

    let review = json!({
        "apiVersion": "apiextensions.k8s.io/v1",
        "kind": "ConversionReview",
        "request": {
            "uid": "http-uid",
            "desiredAPIVersion": "policy.sigstore.dev/v1beta1",
            "objects": [{
                "apiVersion": "policy.sigstore.dev/v1alpha1",
                "kind": "ClusterImagePolicy",
                "metadata": {"name": "over-http"},
                "spec": {"images": [{"glob": "*"}]}
            }]
        }
    });

    let response: serde_json::Value = client
        .post(format!("http://127.0.0.1:{}/convert", port))
        .json(&review)
        .send()
        .await
        .expect("convert request")
        .json()
        .await
        .expect("ConversionReview response");

    assert_eq!(response["kind"], "ConversionReview");
    assert_eq!(response["response"]["uid"], "http-uid");
    assert_eq!(response["response"]["result"]["status"], "Success");
    assert_eq!(
        response["response"]["convertedObjects"][0]["apiVersion"],
        "policy.sigstore.dev/v1beta1"
    );

    let metrics = client
        .get(format!("http://127.0.0.1:{}/metrics", port))
        .send()
        .await
        .expect("metrics request")
        .text()
        .await
        .expect("metrics body");
    assert!(metrics.contains(
        r#"cip_conversion_requests_total{desired_version="v1beta1",result="success"} 1"#
    ));

    server_handle.abort();
}

#[test]
fn test_readiness_state_clones_share_state() {
    let state = ReadinessState::new();
    assert!(!state.is_ready());

    let cloned = state.clone();
    state.set_ready();

    assert!(cloned.is_ready());
}
