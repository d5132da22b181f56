//! CRD Conversion Webhook for ClusterImagePolicy resources
//!
//! Handles conversion between v1alpha1 and v1beta1 versions of the
//! ClusterImagePolicy CRD. Kubernetes calls this webhook when it needs to
//! convert between versions.
//!
//! ## Endpoints
//! - POST /convert - Kubernetes ConversionReview webhook
//!
//! [`build_router`] mounts it next to the probe routes from `health`.
//!
//! Objects are decoded into the typed CRD structs and converted through
//! `crd::conversion`, so the webhook and in-process callers share one
//! conversion path.

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::health::{probe_routes, ReadinessState, ServerState};
use super::metrics::SharedMetrics;
use crate::crd::conversion::{ConversionContext, Convertible};
use crate::crd::{v1alpha1, v1beta1, GROUP};

/// Kubernetes ConversionReview request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionReview {
    pub api_version: String,
    pub kind: String,
    pub request: ConversionRequest,
}

/// The actual conversion request from Kubernetes
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRequest {
    /// Unique ID for this request
    pub uid: String,
    /// Target API version (e.g., "policy.sigstore.dev/v1beta1")
    #[serde(rename = "desiredAPIVersion", alias = "desiredApiVersion")]
    pub desired_api_version: String,
    /// Objects to convert
    pub objects: Vec<Value>,
}

/// Result status for conversion
#[derive(Debug, Serialize, PartialEq)]
pub struct ConversionResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ConversionResult {
    fn success() -> Self {
        Self {
            status: "Success".to_string(),
            message: None,
        }
    }

    fn failed(message: String) -> Self {
        Self {
            status: "Failed".to_string(),
            message: Some(message),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "Success"
    }
}

/// Response for a conversion request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResponse {
    pub uid: String,
    pub result: ConversionResult,
    pub converted_objects: Vec<Value>,
}

impl ConversionResponse {
    fn failed(uid: String, message: String) -> Self {
        Self {
            uid,
            result: ConversionResult::failed(message),
            converted_objects: vec![],
        }
    }
}

/// Full ConversionReview response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionReviewResponse {
    pub api_version: String,
    pub kind: String,
    pub response: ConversionResponse,
}

/// Versions this webhook can convert between
const SERVED_VERSIONS: [&str; 2] = ["v1alpha1", "v1beta1"];

/// Extract version from apiVersion string (e.g., "policy.sigstore.dev/v1beta1" -> "v1beta1")
fn extract_version(api_version: &str) -> Option<&str> {
    api_version.split('/').next_back().filter(|v| !v.is_empty())
}

/// Metrics label for a desired apiVersion
///
/// Anything outside our group and served versions shares one label so request
/// input cannot grow the series count.
fn version_label(desired_api_version: &str) -> &'static str {
    let Some((group, version)) = desired_api_version.split_once('/') else {
        return "unsupported";
    };
    if group != GROUP {
        return "unsupported";
    }
    SERVED_VERSIONS
        .iter()
        .copied()
        .find(|served| *served == version)
        .unwrap_or("unsupported")
}

/// Build a short context string (name) for error messages
///
/// ClusterImagePolicy is cluster scoped, so a namespace only shows up on
/// malformed objects; it is reported when present.
fn object_context(obj: &Value) -> String {
    let metadata = obj.get("metadata");
    let name = metadata
        .and_then(|m| m.get("name"))
        .and_then(|n| n.as_str());
    let namespace = metadata
        .and_then(|m| m.get("namespace"))
        .and_then(|n| n.as_str());
    match (namespace, name) {
        (Some(ns), Some(n)) => format!(" (namespace: {}, name: {})", ns, n),
        (None, Some(n)) => format!(" (name: {})", n),
        (Some(ns), None) => format!(" (namespace: {})", ns),
        _ => String::new(),
    }
}

fn decode<T: serde::de::DeserializeOwned>(obj: &Value, version: &str) -> Result<T, String> {
    serde_json::from_value(obj.clone()).map_err(|e| {
        format!(
            "Invalid {} ClusterImagePolicy{}: {}",
            version,
            object_context(obj),
            e
        )
    })
}

fn encode<T: Serialize>(converted: &T, obj: &Value) -> Result<Value, String> {
    serde_json::to_value(converted)
        .map_err(|e| format!("Failed to encode converted object{}: {}", object_context(obj), e))
}

/// Convert a single ClusterImagePolicy object to the desired version
fn convert_object(
    obj: &Value,
    desired_version: &str,
    ctx: &ConversionContext,
) -> Result<Value, String> {
    let current_api_version = obj
        .get("apiVersion")
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("Missing apiVersion{}", object_context(obj)))?;

    let current_version = extract_version(current_api_version).ok_or_else(|| {
        format!(
            "Invalid apiVersion format '{}'{}",
            current_api_version,
            object_context(obj)
        )
    })?;

    // Same version - no conversion needed
    if current_version == desired_version {
        return Ok(obj.clone());
    }

    let failed = |e: crate::crd::conversion::ConversionError| {
        format!("Cannot convert{}: {}", object_context(obj), e)
    };

    match (current_version, desired_version) {
        ("v1alpha1", "v1beta1") => {
            let source: v1alpha1::ClusterImagePolicy = decode(obj, current_version)?;
            let mut converted = v1beta1::ClusterImagePolicy::default();
            source.convert_to(ctx, &mut converted).map_err(failed)?;
            encode(&converted, obj)
        }
        ("v1beta1", "v1alpha1") => {
            let source: v1beta1::ClusterImagePolicy = decode(obj, current_version)?;
            let mut converted = v1alpha1::ClusterImagePolicy::default();
            converted.convert_from(ctx, &source).map_err(failed)?;
            encode(&converted, obj)
        }
        _ => Err(format!(
            "Unsupported conversion: {} -> {}{}",
            current_version,
            desired_version,
            object_context(obj)
        )),
    }
}

/// Convert all objects in a request
///
/// The first failing object fails the whole request; no partial results are returned.
pub fn convert_policies(request: ConversionRequest) -> ConversionResponse {
    let desired_version = match extract_version(&request.desired_api_version) {
        Some(v) => v,
        None => {
            let message = format!(
                "Invalid desired API version: {}",
                request.desired_api_version
            );
            return ConversionResponse::failed(request.uid, message);
        }
    };

    let group = request.desired_api_version.split('/').next();
    if group != Some(GROUP) || !SERVED_VERSIONS.contains(&desired_version) {
        let message = format!(
            "Unsupported API version: {}",
            request.desired_api_version
        );
        return ConversionResponse::failed(request.uid, message);
    }

    let ctx = ConversionContext::for_request(request.uid.as_str());
    let converted_objects = request
        .objects
        .iter()
        .map(|obj| convert_object(obj, desired_version, &ctx))
        .collect::<Result<Vec<_>, _>>();

    match converted_objects {
        Ok(converted_objects) => ConversionResponse {
            uid: request.uid,
            result: ConversionResult::success(),
            converted_objects,
        },
        Err(message) => ConversionResponse::failed(request.uid, message),
    }
}

/// Axum handler for the /convert endpoint
pub async fn handle_convert(
    State(state): State<ServerState>,
    Json(review): Json<ConversionReview>,
) -> impl IntoResponse {
    let desired_version = version_label(&review.request.desired_api_version);
    info!(
        uid = %review.request.uid,
        desired_api_version = %review.request.desired_api_version,
        object_count = review.request.objects.len(),
        "Processing conversion request"
    );

    let response = convert_policies(review.request);
    let success = response.result.is_success();

    if success {
        info!(
            uid = %response.uid,
            converted_count = response.converted_objects.len(),
            "Conversion successful"
        );
    } else {
        warn!(
            uid = %response.uid,
            error = ?response.result.message,
            "Conversion failed"
        );
    }
    state.metrics().record_conversion(
        desired_version,
        success,
        response.converted_objects.len(),
    );

    let review_response = ConversionReviewResponse {
        api_version: "apiextensions.k8s.io/v1".to_string(),
        kind: "ConversionReview".to_string(),
        response,
    };

    (StatusCode::OK, Json(review_response))
}

/// Full router: `/convert` plus the probe and metrics routes
pub fn build_router(readiness: ReadinessState, metrics: SharedMetrics) -> Router {
    probe_routes()
        .route("/convert", post(handle_convert))
        .with_state(ServerState::new(readiness, metrics))
}

#[cfg(test)]
#[path = "webhook_test.rs"]
mod tests;
