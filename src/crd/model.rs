//! Version-independent ClusterImagePolicy model
//!
//! Superset of every served API version. Each version is lifted into this
//! model and projected back out of it, so a new version only needs its own
//! lift/project pair.
//!
//! The "exactly one of" choices that the wire schemas spell as independent
//! optional fields are enums here.

use k8s_openapi::api::core::v1::{LocalObjectReference, SecretReference};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClusterImagePolicy {
    pub metadata: ObjectMeta,
    pub images: Vec<String>,
    pub authorities: Vec<Authority>,
    pub mode: Option<String>,
    pub policy: Option<Policy>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Authority {
    pub name: String,
    /// None for an authority that only carries sources or attestations
    pub verifier: Option<Verifier>,
    pub sources: Vec<Source>,
    pub ctlog: Option<TLog>,
    pub attestations: Vec<Attestation>,
    pub rfc3161_timestamp: Option<Rfc3161Timestamp>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Verifier {
    Key(KeyRef),
    Keyless(KeylessRef),
    Static(StaticRef),
}

impl Verifier {
    /// Serialized field name of the variant
    pub fn field_name(&self) -> &'static str {
        match self {
            Verifier::Key(_) => "key",
            Verifier::Keyless(_) => "keyless",
            Verifier::Static(_) => "static",
        }
    }
}

/// Where key material lives
///
/// The origins are independent: stored objects set several of them on a
/// keyless `ca-cert` and conversion must not drop any.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KeyRef {
    pub data: Option<String>,
    pub secret_ref: Option<SecretReference>,
    pub kms: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct KeylessRef {
    pub url: Option<String>,
    pub identities: Vec<Identity>,
    pub ca_cert: Option<KeyRef>,
    pub trust_root_ref: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Identity {
    Exact {
        issuer: String,
        subject: String,
    },
    RegExp {
        issuer_reg_exp: String,
        subject_reg_exp: String,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct StaticRef {
    pub action: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Source {
    pub oci: String,
    pub signature_pull_secrets: Vec<LocalObjectReference>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TLog {
    pub url: Option<String>,
    pub trust_root_ref: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Rfc3161Timestamp {
    pub trust_root_ref: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Attestation {
    pub name: String,
    pub predicate_type: String,
    pub policy: Option<Policy>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Policy {
    pub policy_type: String,
    pub source: Option<PolicySource>,
    pub context: EvaluationContext,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PolicySource {
    Inline(String),
    ConfigMap { name: String, key: String },
}

/// What the policy engine gets to see besides the verification results
///
/// `None` means the caller expressed no preference, which is distinct from
/// an explicit `false`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvaluationContext {
    pub fetch_config_file: Option<bool>,
    pub include_spec: Option<bool>,
    pub include_object_meta: Option<bool>,
    pub include_type_meta: Option<bool>,
}

impl EvaluationContext {
    pub fn is_unset(&self) -> bool {
        *self == EvaluationContext::default()
    }
}
