//! Tests for environment configuration

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use std::collections::HashMap;

fn from_vars(vars: &[(&str, &str)]) -> Result<WebhookConfig, ConfigError> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    WebhookConfig::from_lookup(|var| vars.get(var).cloned())
}

/// Test: No variables set yields the defaults
#[test]
fn test_defaults() {
    let config = from_vars(&[]).unwrap();

    assert_eq!(config, WebhookConfig::default());
    assert!(!config.tls_enabled);
    assert_eq!(config.service_name, "policy-webhook");
    assert_eq!(config.namespace, "cosign-system");
    assert_eq!(config.listen_port(), 8080);
}

/// Test: TLS flag accepts "true" and "1", anything else is off
#[test]
fn test_tls_flag() {
    assert!(from_vars(&[("CIP_WEBHOOK_TLS", "true")]).unwrap().tls_enabled);
    assert!(from_vars(&[("CIP_WEBHOOK_TLS", "1")]).unwrap().tls_enabled);
    assert!(!from_vars(&[("CIP_WEBHOOK_TLS", "yes")]).unwrap().tls_enabled);
}

/// Test: Overrides are applied and TLS mode listens on the HTTPS port
#[test]
fn test_overrides() {
    let config = from_vars(&[
        ("CIP_WEBHOOK_TLS", "true"),
        ("CIP_SERVICE_NAME", "webhook"),
        ("CIP_NAMESPACE", "sigstore"),
        ("CIP_TLS_SECRET", "webhook-certs"),
        ("CIP_HTTPS_PORT", "9443"),
    ])
    .unwrap();

    assert_eq!(config.service_name, "webhook");
    assert_eq!(config.namespace, "sigstore");
    assert_eq!(config.tls_secret, "webhook-certs");
    assert_eq!(config.listen_port(), 9443);
}

/// Test: Empty strings fall back to defaults
#[test]
fn test_empty_values_use_defaults() {
    let config = from_vars(&[("CIP_NAMESPACE", "")]).unwrap();
    assert_eq!(config.namespace, DEFAULT_NAMESPACE);
}

/// Test: A non-numeric port is an error naming the variable
#[test]
fn test_invalid_port() {
    let err = from_vars(&[("CIP_HTTP_PORT", "http")]).unwrap_err();

    assert_eq!(
        err,
        ConfigError::InvalidPort {
            var: "CIP_HTTP_PORT",
            value: "http".to_string()
        }
    );
    assert!(err.to_string().contains("CIP_HTTP_PORT"));
}
