//! v1alpha1 CRD types
//!
//! The original API version of ClusterImagePolicy. It has no top-level
//! policy, no RFC3161 timestamp authority and no evaluation flags on
//! policies. Those are carried through this version by the
//! `policy.sigstore.dev/v1beta1-fields` annotation (see `crd::conversion`).

use k8s_openapi::api::core::v1::{LocalObjectReference, SecretReference};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// ClusterImagePolicy v1alpha1 - images and the authorities that must vouch for them
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "policy.sigstore.dev",
    version = "v1alpha1",
    kind = "ClusterImagePolicy",
    shortname = "cip",
    derive = "PartialEq",
    derive = "Default"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterImagePolicySpec {
    /// Glob patterns of images this policy applies to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImagePattern>,

    /// Authorities an image must satisfy, evaluated in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authorities: Vec<Authority>,

    /// Enforcement mode: "enforce" (default) or "warn"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct ImagePattern {
    pub glob: String,
}

/// A single trust requirement
///
/// At most one of `key`, `keyless` or `static` may be set.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Authority {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<KeyRef>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyless: Option<KeylessRef>,

    #[serde(rename = "static", skip_serializing_if = "Option::is_none")]
    pub static_ref: Option<StaticRef>,

    /// Where to look for signatures, defaults to the image's own repository
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,

    /// Transparency log to check signatures against
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctlog: Option<TLog>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attestations: Vec<Attestation>,
}

/// Location of verification key material
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KeyRef {
    /// Inline PEM encoded public key
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,

    /// Secret holding the public key, by reference only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretReference>,

    /// KMS URI of the key
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kms: String,
}

/// Keyless (identity based) verification
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KeylessRef {
    /// Fulcio URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identities: Vec<Identity>,

    #[serde(rename = "ca-cert", skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<KeyRef>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub trust_root_ref: String,
}

/// Certificate identity to match: exact values or regular expressions, never both
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub issuer: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subject: String,

    #[serde(rename = "issuerRegExp", default, skip_serializing_if = "String::is_empty")]
    pub issuer_reg_exp: String,

    #[serde(rename = "subjectRegExp", default, skip_serializing_if = "String::is_empty")]
    pub subject_reg_exp: String,
}

/// Fixed verdict, no verification performed
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct StaticRef {
    /// "pass" or "fail"
    pub action: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// OCI repository holding the signatures
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub oci: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signature_pull_secrets: Vec<LocalObjectReference>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TLog {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub trust_root_ref: String,
}

/// Named attestation with the policy its predicate must satisfy
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Attestation {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub predicate_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<Policy>,
}

/// Policy engine descriptor
///
/// At most one of `data` or `configMapRef` may be set.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    /// Engine identifier, "cue" or "rego"
    #[serde(rename = "type", default)]
    pub policy_type: String,

    /// Inline policy source
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_map_ref: Option<ConfigMapReference>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct ConfigMapReference {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
}
