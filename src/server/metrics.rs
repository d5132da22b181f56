//! Prometheus metrics for the conversion webhook

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("Metrics output is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Conversion webhook metrics backed by a private registry
pub struct Metrics {
    registry: Registry,
    conversion_requests: IntCounterVec,
    converted_objects: IntCounterVec,
}

pub type SharedMetrics = Arc<Metrics>;

impl Metrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let conversion_requests = IntCounterVec::new(
            Opts::new(
                "cip_conversion_requests_total",
                "ConversionReview requests handled, by desired version and result",
            ),
            &["desired_version", "result"],
        )?;
        let converted_objects = IntCounterVec::new(
            Opts::new(
                "cip_converted_objects_total",
                "ClusterImagePolicy objects returned by successful conversions",
            ),
            &["desired_version"],
        )?;

        registry.register(Box::new(conversion_requests.clone()))?;
        registry.register(Box::new(converted_objects.clone()))?;

        Ok(Self {
            registry,
            conversion_requests,
            converted_objects,
        })
    }

    /// Record the outcome of one ConversionReview
    pub fn record_conversion(&self, desired_version: &str, success: bool, objects: usize) {
        let result = if success { "success" } else { "failure" };
        self.conversion_requests
            .with_label_values(&[desired_version, result])
            .inc();
        if success {
            self.converted_objects
                .with_label_values(&[desired_version])
                .inc_by(objects as u64);
        }
    }

    /// Encode all metrics in Prometheus text format
    pub fn encode(&self) -> Result<String, MetricsError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Create the shared metrics registry
pub fn create_metrics() -> Result<SharedMetrics, MetricsError> {
    Ok(Arc::new(Metrics::new()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_conversion_counts_requests_and_objects() {
        let metrics = Metrics::new().unwrap();

        metrics.record_conversion("v1beta1", true, 3);
        metrics.record_conversion("v1beta1", false, 0);

        let text = metrics.encode().unwrap();
        assert!(text.contains(
            r#"cip_conversion_requests_total{desired_version="v1beta1",result="success"} 1"#
        ));
        assert!(text.contains(
            r#"cip_conversion_requests_total{desired_version="v1beta1",result="failure"} 1"#
        ));
        assert!(text.contains(r#"cip_converted_objects_total{desired_version="v1beta1"} 3"#));
    }

    #[test]
    fn test_registries_are_independent() {
        let first = create_metrics().unwrap();
        let second = create_metrics().unwrap();

        first.record_conversion("v1alpha1", true, 1);

        assert!(!second.encode().unwrap().contains("v1alpha1"));
    }
}
