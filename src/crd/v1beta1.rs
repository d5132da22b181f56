//! v1beta1 CRD types
//!
//! Evolution of v1alpha1 with additional fields:
//! - spec.policy: Policy evaluated once every authority has passed
//! - authorities[].rfc3161timestamp: Timestamp authority trust root
//! - policy flags: fetchConfigFile, includeSpec, includeObjectMeta, includeTypeMeta

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// Re-export unchanged types from v1alpha1
pub use super::v1alpha1::{
    ConfigMapReference, Identity, ImagePattern, KeyRef, KeylessRef, Source, StaticRef, TLog,
};

/// ClusterImagePolicy v1beta1 - images and the authorities that must vouch for them
///
/// New in v1beta1:
/// - policy: top-level policy over the combined authority results
/// - rfc3161timestamp on authorities
/// - evaluation context flags on policies
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "policy.sigstore.dev",
    version = "v1beta1",
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

    // === NEW IN v1beta1 ===
    /// Policy applied to the results of all authorities once they have passed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<Policy>,
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

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctlog: Option<TLog>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attestations: Vec<Attestation>,

    // === NEW IN v1beta1 ===
    /// Timestamp authority used to verify signature timestamps
    #[serde(rename = "rfc3161timestamp", skip_serializing_if = "Option::is_none")]
    pub rfc3161_timestamp: Option<RFC3161Timestamp>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RFC3161Timestamp {
    /// Name of the TrustRoot resource holding the TSA certificate chain
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub trust_root_ref: String,
}

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
/// At most one of `data` or `configMapRef` may be set. The include flags are
/// tri-state: unset means the engine applies its own default.
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

    // === NEW IN v1beta1 ===
    /// Fetch the image's config file and hand it to the engine
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_config_file: Option<bool>,

    /// Include the admitted object's spec
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_spec: Option<bool>,

    /// Include the admitted object's ObjectMeta
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_object_meta: Option<bool>,

    /// Include the admitted object's TypeMeta
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_type_meta: Option<bool>,
}
