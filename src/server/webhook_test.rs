//! Tests for CRD conversion webhook

use super::{
    convert_policies, handle_convert, version_label, ConversionRequest, ConversionReview,
};
use crate::crd::conversion::RETAINED_FIELDS_ANNOTATION;
use crate::server::{create_metrics, ReadinessState, ServerState};
use axum::{extract::State, Json};
use serde_json::{json, Value};

fn request(uid: &str, desired_api_version: &str, objects: Vec<Value>) -> ConversionRequest {
    ConversionRequest {
        uid: uid.to_string(),
        desired_api_version: desired_api_version.to_string(),
        objects,
    }
}

fn v1beta1_policy(name: &str) -> Value {
    json!({
        "apiVersion": "policy.sigstore.dev/v1beta1",
        "kind": "ClusterImagePolicy",
        "metadata": {"name": name},
        "spec": {
            "images": [{"glob": "ghcr.io/example/*"}],
            "authorities": [
                {"key": {"secretRef": {"name": "mysecret"}}},
                {
                    "keyless": {
                        "identities": [{"issuerRegExp": ".*", "subjectRegExp": ".*@example.com"}]
                    },
                    "rfc3161timestamp": {"trustRootRef": "tsa"}
                }
            ],
            "policy": {
                "type": "cue",
                "data": "predicateType: \"cosign.sigstore.dev/attestation/v1\"",
                "fetchConfigFile": true,
                "includeSpec": false
            }
        }
    })
}

/// Test: Webhook converts v1alpha1 to v1beta1
#[test]
fn test_convert_v1alpha1_to_v1beta1() {
    let response = convert_policies(request(
        "test-uid-123",
        "policy.sigstore.dev/v1beta1",
        vec![json!({
            "apiVersion": "policy.sigstore.dev/v1alpha1",
            "kind": "ClusterImagePolicy",
            "metadata": {"name": "test-cip"},
            "spec": {
                "mode": "warn",
                "images": [{"glob": "*"}],
                "authorities": [{"static": {"action": "pass"}}]
            }
        })],
    ));

    assert_eq!(response.result.status, "Success");
    assert_eq!(response.uid, "test-uid-123");
    assert_eq!(response.converted_objects.len(), 1);

    let converted = &response.converted_objects[0];
    assert_eq!(converted["apiVersion"], "policy.sigstore.dev/v1beta1");
    assert_eq!(converted["kind"], "ClusterImagePolicy");
    assert_eq!(converted["spec"]["mode"], "warn");
    assert_eq!(converted["spec"]["authorities"][0]["static"]["action"], "pass");
    // No v1beta1-only fields are invented
    assert!(converted["spec"].get("policy").is_none());
}

/// Test: Webhook converts v1beta1 to v1alpha1, retaining new fields in an annotation
#[test]
fn test_convert_v1beta1_to_v1alpha1() {
    let response = convert_policies(request(
        "test-uid-456",
        "policy.sigstore.dev/v1alpha1",
        vec![v1beta1_policy("test-cip")],
    ));

    assert_eq!(response.result.status, "Success");
    assert_eq!(response.converted_objects.len(), 1);

    let converted = &response.converted_objects[0];
    assert_eq!(converted["apiVersion"], "policy.sigstore.dev/v1alpha1");
    // v1alpha1 should NOT have the new fields
    assert!(converted["spec"].get("policy").is_none());
    assert!(converted["spec"]["authorities"][1]
        .get("rfc3161timestamp")
        .is_none());
    // But should preserve existing fields
    assert_eq!(
        converted["spec"]["authorities"][0]["key"]["secretRef"]["name"],
        "mysecret"
    );
    assert!(converted["metadata"]["annotations"][RETAINED_FIELDS_ANNOTATION].is_string());
}

/// Test: v1beta1 -> v1alpha1 -> v1beta1 through the webhook is lossless
#[test]
fn test_convert_roundtrip_through_webhook() {
    let original = v1beta1_policy("roundtrip");

    let down = convert_policies(request(
        "down",
        "policy.sigstore.dev/v1alpha1",
        vec![original.clone()],
    ));
    let up = convert_policies(request(
        "up",
        "policy.sigstore.dev/v1beta1",
        down.converted_objects,
    ));

    assert_eq!(up.result.status, "Success");
    assert_eq!(up.converted_objects[0], original);
}

/// Test: Webhook handles multiple objects in single request
#[test]
fn test_convert_multiple_objects() {
    let response = convert_policies(request(
        "batch-uid",
        "policy.sigstore.dev/v1alpha1",
        vec![v1beta1_policy("cip-1"), v1beta1_policy("cip-2")],
    ));

    assert_eq!(response.result.status, "Success");
    assert_eq!(response.converted_objects.len(), 2);
    assert_eq!(response.converted_objects[0]["metadata"]["name"], "cip-1");
    assert_eq!(response.converted_objects[1]["metadata"]["name"], "cip-2");
}

/// Test: Webhook preserves metadata during conversion
#[test]
fn test_convert_preserves_metadata() {
    let response = convert_policies(request(
        "meta-uid",
        "policy.sigstore.dev/v1beta1",
        vec![json!({
            "apiVersion": "policy.sigstore.dev/v1alpha1",
            "kind": "ClusterImagePolicy",
            "metadata": {
                "name": "my-policy",
                "labels": {"app": "myapp"},
                "annotations": {"note": "test"},
                "resourceVersion": "42"
            },
            "spec": {"images": [{"glob": "*"}]}
        })],
    ));

    let converted = &response.converted_objects[0];
    assert_eq!(converted["metadata"]["name"], "my-policy");
    assert_eq!(converted["metadata"]["labels"]["app"], "myapp");
    assert_eq!(converted["metadata"]["annotations"]["note"], "test");
    assert_eq!(converted["metadata"]["resourceVersion"], "42");
}

/// Test: Webhook handles same-version "conversion" (no-op)
#[test]
fn test_convert_same_version_is_noop() {
    let original = v1beta1_policy("noop");
    let response = convert_policies(request(
        "noop-uid",
        "policy.sigstore.dev/v1beta1",
        vec![original.clone()],
    ));

    assert_eq!(response.result.status, "Success");
    // Object should be unchanged
    assert_eq!(response.converted_objects[0], original);
}

/// Test: Webhook returns error for unknown version
#[test]
fn test_convert_unknown_version_fails() {
    let response = convert_policies(request(
        "error-uid",
        "policy.sigstore.dev/v2",
        vec![v1beta1_policy("test")],
    ));

    assert_eq!(response.result.status, "Failed");
    assert!(response.result.message.is_some());
    assert!(response.converted_objects.is_empty());
}

/// Test: Webhook rejects a desired version from another API group
#[test]
fn test_convert_foreign_group_fails() {
    let response = convert_policies(request(
        "group-uid",
        "example.com/v1beta1",
        vec![v1beta1_policy("test")],
    ));

    assert_eq!(response.result.status, "Failed");
}

/// Test: Webhook fails when an object lacks apiVersion
#[test]
fn test_convert_missing_api_version_fails() {
    let response = convert_policies(request(
        "missing-uid",
        "policy.sigstore.dev/v1beta1",
        vec![json!({"kind": "ClusterImagePolicy", "metadata": {"name": "nameless"}})],
    ));

    assert_eq!(response.result.status, "Failed");
    let message = response.result.message.unwrap();
    assert!(message.contains("Missing apiVersion"));
    assert!(message.contains("nameless"));
}

/// Test: Webhook reports unconvertible shapes with the object name and field path
#[test]
fn test_convert_ambiguous_authority_fails() {
    let response = convert_policies(request(
        "ambiguous-uid",
        "policy.sigstore.dev/v1alpha1",
        vec![
            v1beta1_policy("fine"),
            json!({
                "apiVersion": "policy.sigstore.dev/v1beta1",
                "kind": "ClusterImagePolicy",
                "metadata": {"name": "broken"},
                "spec": {
                    "authorities": [{
                        "key": {"kms": "gcpkms://key"},
                        "static": {"action": "fail"}
                    }]
                }
            }),
        ],
    ));

    assert_eq!(response.result.status, "Failed");
    assert!(response.converted_objects.is_empty());
    let message = response.result.message.unwrap();
    assert!(message.contains("broken"));
    assert!(message.contains("spec.authorities[0]"));
}

/// Test: Webhook fails on objects that do not decode as ClusterImagePolicy
#[test]
fn test_convert_malformed_object_fails() {
    let response = convert_policies(request(
        "malformed-uid",
        "policy.sigstore.dev/v1beta1",
        vec![json!({
            "apiVersion": "policy.sigstore.dev/v1alpha1",
            "kind": "ClusterImagePolicy",
            "metadata": {"name": "bad"},
            "spec": {"images": "not-a-list"}
        })],
    ));

    assert_eq!(response.result.status, "Failed");
    assert!(response.result.message.unwrap().contains("Invalid v1alpha1"));
}

/// Test: Only served versions of our group get their own metrics label
#[test]
fn test_version_label() {
    assert_eq!(version_label("policy.sigstore.dev/v1alpha1"), "v1alpha1");
    assert_eq!(version_label("policy.sigstore.dev/v1beta1"), "v1beta1");
    assert_eq!(version_label("policy.sigstore.dev/v2"), "unsupported");
    assert_eq!(version_label("example.com/v1beta1"), "unsupported");
    assert_eq!(version_label("v1beta1"), "unsupported");
    assert_eq!(version_label(""), "unsupported");
}

/// Test: Requests for unknown versions share one failure series
#[tokio::test]
async fn test_unsupported_versions_share_metrics_series() {
    let metrics = create_metrics().unwrap();
    let state = ServerState::new(ReadinessState::new(), metrics.clone());

    for desired in ["example.com/v9", "policy.sigstore.dev/v7", "bogus"] {
        let review = ConversionReview {
            api_version: "apiextensions.k8s.io/v1".to_string(),
            kind: "ConversionReview".to_string(),
            request: request("metrics-uid", desired, vec![]),
        };
        let _ = handle_convert(State(state.clone()), Json(review)).await;
    }

    let text = metrics.encode().unwrap();
    assert!(text.contains(
        r#"cip_conversion_requests_total{desired_version="unsupported",result="failure"} 3"#
    ));
    for bogus in ["v9", "v7", "bogus"] {
        assert!(!text.contains(bogus), "unexpected series for {bogus}");
    }
}
