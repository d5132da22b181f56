//! Webhook configuration from environment variables
//!
//! | Variable           | Default              |
//! |--------------------|----------------------|
//! | `CIP_WEBHOOK_TLS`  | `false`              |
//! | `CIP_SERVICE_NAME` | `policy-webhook`     |
//! | `CIP_NAMESPACE`    | `cosign-system`      |
//! | `CIP_TLS_SECRET`   | `policy-webhook-tls` |
//! | `CIP_HTTP_PORT`    | `8080`               |
//! | `CIP_HTTPS_PORT`   | `8443`               |

use thiserror::Error;

pub const DEFAULT_SERVICE_NAME: &str = "policy-webhook";
pub const DEFAULT_NAMESPACE: &str = "cosign-system";
pub const DEFAULT_TLS_SECRET_NAME: &str = "policy-webhook-tls";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_HTTPS_PORT: u16 = 8443;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{var} must be a port number, got {value:?}")]
    InvalidPort { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct WebhookConfig {
    /// Serve HTTPS with a self-managed certificate instead of plain HTTP
    pub tls_enabled: bool,
    pub service_name: String,
    pub namespace: String,
    pub tls_secret: String,
    pub http_port: u16,
    pub https_port: u16,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            tls_enabled: false,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            tls_secret: DEFAULT_TLS_SECRET_NAME.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            https_port: DEFAULT_HTTPS_PORT,
        }
    }
}

impl WebhookConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the config from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let string = |var: &str, default: String| {
            lookup(var).filter(|v| !v.is_empty()).unwrap_or(default)
        };
        let port = |var: &'static str, default: u16| match lookup(var) {
            None => Ok(default),
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort { var, value }),
        };

        Ok(Self {
            tls_enabled: lookup("CIP_WEBHOOK_TLS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.tls_enabled),
            service_name: string("CIP_SERVICE_NAME", defaults.service_name),
            namespace: string("CIP_NAMESPACE", defaults.namespace),
            tls_secret: string("CIP_TLS_SECRET", defaults.tls_secret),
            http_port: port("CIP_HTTP_PORT", defaults.http_port)?,
            https_port: port("CIP_HTTPS_PORT", defaults.https_port)?,
        })
    }

    /// Port the server binds, depending on TLS mode
    pub fn listen_port(&self) -> u16 {
        if self.tls_enabled {
            self.https_port
        } else {
            self.http_port
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
