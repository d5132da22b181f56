//! CRD version conversion between v1alpha1 and v1beta1
//!
//! Provides bidirectional, lossless conversion for the ClusterImagePolicy CRD.
//! Both versions are lifted into [`model::ClusterImagePolicy`] and projected
//! back out of it.
//!
//! ## Conversion rules:
//! - v1alpha1 -> v1beta1: Copy every field. New fields stay unset unless the
//!   object carries the retained-fields annotation, which restores them.
//! - v1beta1 -> v1alpha1: Copy every field. Fields with no v1alpha1
//!   counterpart (spec.policy, rfc3161timestamp, policy evaluation flags) are
//!   moved into the retained-fields annotation.
//!
//! Conversion fails only when a "one of" choice is over-specified: more than
//! one of key/keyless/static on an authority, both exact and regexp matchers
//! on an identity (or neither), or both data and configMapRef on a policy.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::model::{self, EvaluationContext, PolicySource, Verifier};
use super::v1alpha1;
use super::v1beta1;

/// Annotation carrying v1beta1-only fields on a v1alpha1 object
pub const RETAINED_FIELDS_ANNOTATION: &str = "policy.sigstore.dev/v1beta1-fields";

/// Errors for shapes that have no representation in the target version
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("{path}: only one of key, keyless or static may be set, found {populated}")]
    AmbiguousAuthority { path: String, populated: String },

    #[error("{path}: identity sets both exact and regular expression matchers")]
    AmbiguousIdentity { path: String },

    #[error("{path}: identity sets neither exact nor regular expression matchers")]
    EmptyIdentity { path: String },

    #[error("{path}: only one of data or configMapRef may be set")]
    AmbiguousPolicySource { path: String },

    #[error("invalid policy.sigstore.dev/v1beta1-fields annotation: {0}")]
    RetainedFields(#[from] serde_json::Error),
}

/// Request scoped context handed to every conversion
///
/// Conversion itself does not look at it; it exists so callers can thread
/// request identity through the same call.
#[derive(Debug, Clone, Default)]
pub struct ConversionContext {
    pub request_uid: Option<String>,
}

impl ConversionContext {
    pub fn for_request(uid: impl Into<String>) -> Self {
        Self {
            request_uid: Some(uid.into()),
        }
    }
}

/// A resource version that converts to and from another version
///
/// `dst`/`self` must be treated as undefined when an error is returned.
pub trait Convertible<Other> {
    /// Populate `dst` from `self`
    fn convert_to(&self, ctx: &ConversionContext, dst: &mut Other) -> Result<(), ConversionError>;

    /// Populate `self` from `src`
    fn convert_from(&mut self, ctx: &ConversionContext, src: &Other)
        -> Result<(), ConversionError>;
}

impl Convertible<v1beta1::ClusterImagePolicy> for v1alpha1::ClusterImagePolicy {
    fn convert_to(
        &self,
        _ctx: &ConversionContext,
        dst: &mut v1beta1::ClusterImagePolicy,
    ) -> Result<(), ConversionError> {
        *dst = convert_to_v1beta1(self)?;
        Ok(())
    }

    fn convert_from(
        &mut self,
        _ctx: &ConversionContext,
        src: &v1beta1::ClusterImagePolicy,
    ) -> Result<(), ConversionError> {
        *self = convert_to_v1alpha1(src)?;
        Ok(())
    }
}

/// Convert a v1alpha1 ClusterImagePolicy to v1beta1
pub fn convert_to_v1beta1(
    policy: &v1alpha1::ClusterImagePolicy,
) -> Result<v1beta1::ClusterImagePolicy, ConversionError> {
    let model = lift_v1alpha1(policy)?;
    Ok(project_v1beta1(&model))
}

/// Convert a v1beta1 ClusterImagePolicy to v1alpha1
pub fn convert_to_v1alpha1(
    policy: &v1beta1::ClusterImagePolicy,
) -> Result<v1alpha1::ClusterImagePolicy, ConversionError> {
    let model = lift_v1beta1(policy)?;
    project_v1alpha1(&model)
}

// === v1alpha1 ===

pub fn lift_v1alpha1(
    policy: &v1alpha1::ClusterImagePolicy,
) -> Result<model::ClusterImagePolicy, ConversionError> {
    let mut metadata = policy.metadata.clone();
    let retained = take_retained_fields(&mut metadata)?;

    let mut authorities = policy
        .spec
        .authorities
        .iter()
        .enumerate()
        .map(|(i, authority)| lift_authority_v1alpha1(authority, &authority_path(i)))
        .collect::<Result<Vec<_>, _>>()?;

    let top_level = retained
        .policy
        .as_ref()
        .map(|p| lift_policy_v1beta1(p, &retained_path("policy")))
        .transpose()?;
    retained.restore(&mut authorities);

    Ok(model::ClusterImagePolicy {
        metadata,
        images: lift_images(&policy.spec.images),
        authorities,
        mode: policy.spec.mode.clone(),
        policy: top_level,
    })
}

pub fn project_v1alpha1(
    policy: &model::ClusterImagePolicy,
) -> Result<v1alpha1::ClusterImagePolicy, ConversionError> {
    let mut metadata = policy.metadata.clone();
    strip_retained_fields(&mut metadata);
    let mut retained = RetainedFields::collect(policy);
    if !retained.is_empty() {
        retained.empty_annotations = metadata
            .annotations
            .as_ref()
            .is_some_and(BTreeMap::is_empty);
        let encoded = serde_json::to_string(&retained)?;
        metadata
            .annotations
            .get_or_insert_with(Default::default)
            .insert(RETAINED_FIELDS_ANNOTATION.to_string(), encoded);
    }

    Ok(v1alpha1::ClusterImagePolicy {
        metadata,
        spec: v1alpha1::ClusterImagePolicySpec {
            images: project_images(&policy.images),
            authorities: policy
                .authorities
                .iter()
                .map(project_authority_v1alpha1)
                .collect(),
            mode: policy.mode.clone(),
        },
    })
}

fn lift_authority_v1alpha1(
    authority: &v1alpha1::Authority,
    path: &str,
) -> Result<model::Authority, ConversionError> {
    Ok(model::Authority {
        name: authority.name.clone(),
        verifier: lift_verifier(
            authority.key.as_ref(),
            authority.keyless.as_ref(),
            authority.static_ref.as_ref(),
            path,
        )?,
        sources: authority.sources.iter().map(lift_source).collect(),
        ctlog: authority.ctlog.as_ref().map(lift_tlog),
        attestations: authority
            .attestations
            .iter()
            .enumerate()
            .map(|(i, a)| lift_attestation_v1alpha1(a, &format!("{path}.attestations[{i}]")))
            .collect::<Result<Vec<_>, _>>()?,
        rfc3161_timestamp: None,
    })
}

fn lift_attestation_v1alpha1(
    attestation: &v1alpha1::Attestation,
    path: &str,
) -> Result<model::Attestation, ConversionError> {
    Ok(model::Attestation {
        name: attestation.name.clone(),
        predicate_type: attestation.predicate_type.clone(),
        policy: attestation
            .policy
            .as_ref()
            .map(|p| lift_policy_v1alpha1(p, &format!("{path}.policy")))
            .transpose()?,
    })
}

fn project_authority_v1alpha1(authority: &model::Authority) -> v1alpha1::Authority {
    let (key, keyless, static_ref) = project_verifier(authority.verifier.as_ref());
    v1alpha1::Authority {
        name: authority.name.clone(),
        key,
        keyless,
        static_ref,
        sources: authority.sources.iter().map(project_source).collect(),
        ctlog: authority.ctlog.as_ref().map(project_tlog),
        attestations: authority
            .attestations
            .iter()
            .map(|a| v1alpha1::Attestation {
                name: a.name.clone(),
                predicate_type: a.predicate_type.clone(),
                policy: a.policy.as_ref().map(project_policy_v1alpha1),
            })
            .collect(),
    }
}

fn lift_policy_v1alpha1(
    policy: &v1alpha1::Policy,
    path: &str,
) -> Result<model::Policy, ConversionError> {
    Ok(model::Policy {
        policy_type: policy.policy_type.clone(),
        source: lift_policy_source(&policy.data, policy.config_map_ref.as_ref(), path)?,
        context: EvaluationContext::default(),
    })
}

fn project_policy_v1alpha1(policy: &model::Policy) -> v1alpha1::Policy {
    let (data, config_map_ref) = project_policy_source(policy.source.as_ref());
    v1alpha1::Policy {
        policy_type: policy.policy_type.clone(),
        data,
        config_map_ref,
    }
}

// === v1beta1 ===

pub fn lift_v1beta1(
    policy: &v1beta1::ClusterImagePolicy,
) -> Result<model::ClusterImagePolicy, ConversionError> {
    // The annotation is reserved; whatever a v1beta1 object carries there is not ours
    let mut metadata = policy.metadata.clone();
    strip_retained_fields(&mut metadata);

    Ok(model::ClusterImagePolicy {
        metadata,
        images: lift_images(&policy.spec.images),
        authorities: policy
            .spec
            .authorities
            .iter()
            .enumerate()
            .map(|(i, authority)| lift_authority_v1beta1(authority, &authority_path(i)))
            .collect::<Result<Vec<_>, _>>()?,
        mode: policy.spec.mode.clone(),
        policy: policy
            .spec
            .policy
            .as_ref()
            .map(|p| lift_policy_v1beta1(p, "spec.policy"))
            .transpose()?,
    })
}

pub fn project_v1beta1(policy: &model::ClusterImagePolicy) -> v1beta1::ClusterImagePolicy {
    v1beta1::ClusterImagePolicy {
        metadata: policy.metadata.clone(),
        spec: v1beta1::ClusterImagePolicySpec {
            images: project_images(&policy.images),
            authorities: policy
                .authorities
                .iter()
                .map(project_authority_v1beta1)
                .collect(),
            mode: policy.mode.clone(),
            policy: policy.policy.as_ref().map(project_policy_v1beta1),
        },
    }
}

fn lift_authority_v1beta1(
    authority: &v1beta1::Authority,
    path: &str,
) -> Result<model::Authority, ConversionError> {
    Ok(model::Authority {
        name: authority.name.clone(),
        verifier: lift_verifier(
            authority.key.as_ref(),
            authority.keyless.as_ref(),
            authority.static_ref.as_ref(),
            path,
        )?,
        sources: authority.sources.iter().map(lift_source).collect(),
        ctlog: authority.ctlog.as_ref().map(lift_tlog),
        attestations: authority
            .attestations
            .iter()
            .enumerate()
            .map(|(i, a)| lift_attestation_v1beta1(a, &format!("{path}.attestations[{i}]")))
            .collect::<Result<Vec<_>, _>>()?,
        rfc3161_timestamp: authority
            .rfc3161_timestamp
            .as_ref()
            .map(|ts| model::Rfc3161Timestamp {
                trust_root_ref: ts.trust_root_ref.clone(),
            }),
    })
}

fn lift_attestation_v1beta1(
    attestation: &v1beta1::Attestation,
    path: &str,
) -> Result<model::Attestation, ConversionError> {
    Ok(model::Attestation {
        name: attestation.name.clone(),
        predicate_type: attestation.predicate_type.clone(),
        policy: attestation
            .policy
            .as_ref()
            .map(|p| lift_policy_v1beta1(p, &format!("{path}.policy")))
            .transpose()?,
    })
}

fn project_authority_v1beta1(authority: &model::Authority) -> v1beta1::Authority {
    let (key, keyless, static_ref) = project_verifier(authority.verifier.as_ref());
    v1beta1::Authority {
        name: authority.name.clone(),
        key,
        keyless,
        static_ref,
        sources: authority.sources.iter().map(project_source).collect(),
        ctlog: authority.ctlog.as_ref().map(project_tlog),
        attestations: authority
            .attestations
            .iter()
            .map(|a| v1beta1::Attestation {
                name: a.name.clone(),
                predicate_type: a.predicate_type.clone(),
                policy: a.policy.as_ref().map(project_policy_v1beta1),
            })
            .collect(),
        rfc3161_timestamp: authority
            .rfc3161_timestamp
            .as_ref()
            .map(project_rfc3161_timestamp),
    }
}

fn project_rfc3161_timestamp(ts: &model::Rfc3161Timestamp) -> v1beta1::RFC3161Timestamp {
    v1beta1::RFC3161Timestamp {
        trust_root_ref: ts.trust_root_ref.clone(),
    }
}

fn lift_policy_v1beta1(
    policy: &v1beta1::Policy,
    path: &str,
) -> Result<model::Policy, ConversionError> {
    Ok(model::Policy {
        policy_type: policy.policy_type.clone(),
        source: lift_policy_source(&policy.data, policy.config_map_ref.as_ref(), path)?,
        context: EvaluationContext {
            fetch_config_file: policy.fetch_config_file,
            include_spec: policy.include_spec,
            include_object_meta: policy.include_object_meta,
            include_type_meta: policy.include_type_meta,
        },
    })
}

fn project_policy_v1beta1(policy: &model::Policy) -> v1beta1::Policy {
    let (data, config_map_ref) = project_policy_source(policy.source.as_ref());
    v1beta1::Policy {
        policy_type: policy.policy_type.clone(),
        data,
        config_map_ref,
        fetch_config_file: policy.context.fetch_config_file,
        include_spec: policy.context.include_spec,
        include_object_meta: policy.context.include_object_meta,
        include_type_meta: policy.context.include_type_meta,
    }
}

// === Types shared by both versions ===

fn lift_images(images: &[v1alpha1::ImagePattern]) -> Vec<String> {
    images.iter().map(|image| image.glob.clone()).collect()
}

fn project_images(images: &[String]) -> Vec<v1alpha1::ImagePattern> {
    images
        .iter()
        .map(|glob| v1alpha1::ImagePattern { glob: glob.clone() })
        .collect()
}

fn lift_verifier(
    key: Option<&v1alpha1::KeyRef>,
    keyless: Option<&v1alpha1::KeylessRef>,
    static_ref: Option<&v1alpha1::StaticRef>,
    path: &str,
) -> Result<Option<Verifier>, ConversionError> {
    let mut verifiers = Vec::with_capacity(1);
    if let Some(key) = key {
        verifiers.push(Verifier::Key(lift_key_ref(key)));
    }
    if let Some(keyless) = keyless {
        let keyless = lift_keyless_ref(keyless, &format!("{path}.keyless"))?;
        verifiers.push(Verifier::Keyless(keyless));
    }
    if let Some(static_ref) = static_ref {
        verifiers.push(Verifier::Static(model::StaticRef {
            action: static_ref.action.clone(),
        }));
    }

    if verifiers.len() > 1 {
        let populated: Vec<&str> = verifiers.iter().map(Verifier::field_name).collect();
        return Err(ConversionError::AmbiguousAuthority {
            path: path.to_string(),
            populated: populated.join(", "),
        });
    }
    Ok(verifiers.pop())
}

type VerifierFields = (
    Option<v1alpha1::KeyRef>,
    Option<v1alpha1::KeylessRef>,
    Option<v1alpha1::StaticRef>,
);

fn project_verifier(verifier: Option<&Verifier>) -> VerifierFields {
    match verifier {
        Some(Verifier::Key(key)) => (Some(project_key_ref(key)), None, None),
        Some(Verifier::Keyless(keyless)) => (None, Some(project_keyless_ref(keyless)), None),
        Some(Verifier::Static(s)) => (
            None,
            None,
            Some(v1alpha1::StaticRef {
                action: s.action.clone(),
            }),
        ),
        None => (None, None, None),
    }
}

fn lift_key_ref(key: &v1alpha1::KeyRef) -> model::KeyRef {
    model::KeyRef {
        data: non_empty(&key.data),
        secret_ref: key.secret_ref.clone(),
        kms: non_empty(&key.kms),
    }
}

fn project_key_ref(key: &model::KeyRef) -> v1alpha1::KeyRef {
    v1alpha1::KeyRef {
        data: key.data.clone().unwrap_or_default(),
        secret_ref: key.secret_ref.clone(),
        kms: key.kms.clone().unwrap_or_default(),
    }
}

fn lift_keyless_ref(
    keyless: &v1alpha1::KeylessRef,
    path: &str,
) -> Result<model::KeylessRef, ConversionError> {
    Ok(model::KeylessRef {
        url: keyless.url.clone(),
        identities: keyless
            .identities
            .iter()
            .enumerate()
            .map(|(i, identity)| lift_identity(identity, &format!("{path}.identities[{i}]")))
            .collect::<Result<Vec<_>, _>>()?,
        ca_cert: keyless.ca_cert.as_ref().map(lift_key_ref),
        trust_root_ref: non_empty(&keyless.trust_root_ref),
    })
}

fn project_keyless_ref(keyless: &model::KeylessRef) -> v1alpha1::KeylessRef {
    v1alpha1::KeylessRef {
        url: keyless.url.clone(),
        identities: keyless.identities.iter().map(project_identity).collect(),
        ca_cert: keyless.ca_cert.as_ref().map(project_key_ref),
        trust_root_ref: keyless.trust_root_ref.clone().unwrap_or_default(),
    }
}

fn lift_identity(
    identity: &v1alpha1::Identity,
    path: &str,
) -> Result<model::Identity, ConversionError> {
    let exact = !identity.issuer.is_empty() || !identity.subject.is_empty();
    let regexp = !identity.issuer_reg_exp.is_empty() || !identity.subject_reg_exp.is_empty();

    match (exact, regexp) {
        (true, false) => Ok(model::Identity::Exact {
            issuer: identity.issuer.clone(),
            subject: identity.subject.clone(),
        }),
        (false, true) => Ok(model::Identity::RegExp {
            issuer_reg_exp: identity.issuer_reg_exp.clone(),
            subject_reg_exp: identity.subject_reg_exp.clone(),
        }),
        (true, true) => Err(ConversionError::AmbiguousIdentity {
            path: path.to_string(),
        }),
        (false, false) => Err(ConversionError::EmptyIdentity {
            path: path.to_string(),
        }),
    }
}

fn project_identity(identity: &model::Identity) -> v1alpha1::Identity {
    match identity {
        model::Identity::Exact { issuer, subject } => v1alpha1::Identity {
            issuer: issuer.clone(),
            subject: subject.clone(),
            ..Default::default()
        },
        model::Identity::RegExp {
            issuer_reg_exp,
            subject_reg_exp,
        } => v1alpha1::Identity {
            issuer_reg_exp: issuer_reg_exp.clone(),
            subject_reg_exp: subject_reg_exp.clone(),
            ..Default::default()
        },
    }
}

fn lift_source(source: &v1alpha1::Source) -> model::Source {
    model::Source {
        oci: source.oci.clone(),
        signature_pull_secrets: source.signature_pull_secrets.clone(),
    }
}

fn project_source(source: &model::Source) -> v1alpha1::Source {
    v1alpha1::Source {
        oci: source.oci.clone(),
        signature_pull_secrets: source.signature_pull_secrets.clone(),
    }
}

fn lift_tlog(tlog: &v1alpha1::TLog) -> model::TLog {
    model::TLog {
        url: tlog.url.clone(),
        trust_root_ref: tlog.trust_root_ref.clone(),
    }
}

fn project_tlog(tlog: &model::TLog) -> v1alpha1::TLog {
    v1alpha1::TLog {
        url: tlog.url.clone(),
        trust_root_ref: tlog.trust_root_ref.clone(),
    }
}

fn lift_policy_source(
    data: &str,
    config_map_ref: Option<&v1alpha1::ConfigMapReference>,
    path: &str,
) -> Result<Option<PolicySource>, ConversionError> {
    match (data.is_empty(), config_map_ref) {
        (true, None) => Ok(None),
        (false, None) => Ok(Some(PolicySource::Inline(data.to_string()))),
        (true, Some(cm)) => Ok(Some(PolicySource::ConfigMap {
            name: cm.name.clone(),
            key: cm.key.clone(),
        })),
        (false, Some(_)) => Err(ConversionError::AmbiguousPolicySource {
            path: path.to_string(),
        }),
    }
}

fn project_policy_source(
    source: Option<&PolicySource>,
) -> (String, Option<v1alpha1::ConfigMapReference>) {
    match source {
        Some(PolicySource::Inline(data)) => (data.clone(), None),
        Some(PolicySource::ConfigMap { name, key }) => (
            String::new(),
            Some(v1alpha1::ConfigMapReference {
                name: name.clone(),
                key: key.clone(),
            }),
        ),
        None => (String::new(), None),
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn authority_path(index: usize) -> String {
    format!("spec.authorities[{index}]")
}

fn retained_path(field: &str) -> String {
    format!("metadata.annotations[{RETAINED_FIELDS_ANNOTATION}].{field}")
}

// === Retained v1beta1 fields ===

/// v1beta1-only state stashed on a v1alpha1 object
///
/// Authorities and attestations are addressed by position.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
struct RetainedFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    policy: Option<v1beta1::Policy>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    authorities: Vec<RetainedAuthority>,

    /// The v1beta1 object had an annotations map with nothing else in it
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    empty_annotations: bool,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
struct RetainedAuthority {
    index: usize,

    #[serde(
        rename = "rfc3161timestamp",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    rfc3161_timestamp: Option<v1beta1::RFC3161Timestamp>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    attestations: Vec<RetainedAttestation>,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
struct RetainedAttestation {
    index: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    fetch_config_file: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    include_spec: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    include_object_meta: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    include_type_meta: Option<bool>,
}

impl RetainedAttestation {
    fn new(index: usize, context: EvaluationContext) -> Self {
        Self {
            index,
            fetch_config_file: context.fetch_config_file,
            include_spec: context.include_spec,
            include_object_meta: context.include_object_meta,
            include_type_meta: context.include_type_meta,
        }
    }

    fn context(&self) -> EvaluationContext {
        EvaluationContext {
            fetch_config_file: self.fetch_config_file,
            include_spec: self.include_spec,
            include_object_meta: self.include_object_meta,
            include_type_meta: self.include_type_meta,
        }
    }
}

impl RetainedFields {
    /// Gather everything v1alpha1 cannot hold
    fn collect(policy: &model::ClusterImagePolicy) -> Self {
        let authorities = policy
            .authorities
            .iter()
            .enumerate()
            .filter_map(|(index, authority)| {
                let attestations: Vec<RetainedAttestation> = authority
                    .attestations
                    .iter()
                    .enumerate()
                    .filter_map(|(index, attestation)| {
                        let context = attestation.policy.as_ref()?.context;
                        (!context.is_unset()).then(|| RetainedAttestation::new(index, context))
                    })
                    .collect();
                let rfc3161_timestamp = authority
                    .rfc3161_timestamp
                    .as_ref()
                    .map(project_rfc3161_timestamp);

                if rfc3161_timestamp.is_none() && attestations.is_empty() {
                    return None;
                }
                Some(RetainedAuthority {
                    index,
                    rfc3161_timestamp,
                    attestations,
                })
            })
            .collect();

        Self {
            policy: policy.policy.as_ref().map(project_policy_v1beta1),
            authorities,
            empty_annotations: false,
        }
    }

    fn is_empty(&self) -> bool {
        self.policy.is_none() && self.authorities.is_empty()
    }

    /// Put retained authority state back; entries pointing past the end are stale and skipped
    fn restore(self, authorities: &mut [model::Authority]) {
        for retained in self.authorities {
            let Some(authority) = authorities.get_mut(retained.index) else {
                continue;
            };
            if let Some(ts) = retained.rfc3161_timestamp {
                authority.rfc3161_timestamp = Some(model::Rfc3161Timestamp {
                    trust_root_ref: ts.trust_root_ref,
                });
            }
            for attestation in retained.attestations {
                let policy = authority
                    .attestations
                    .get_mut(attestation.index)
                    .and_then(|a| a.policy.as_mut());
                if let Some(policy) = policy {
                    policy.context = attestation.context();
                }
            }
        }
    }
}

/// Remove the retained-fields annotation, returning its raw value
fn strip_retained_fields(metadata: &mut ObjectMeta) -> Option<String> {
    metadata
        .annotations
        .as_mut()?
        .remove(RETAINED_FIELDS_ANNOTATION)
}

/// Remove and decode the retained-fields annotation
///
/// An annotations map emptied by the removal goes back to `None` unless the
/// v1beta1 object had an empty map to begin with.
fn take_retained_fields(metadata: &mut ObjectMeta) -> Result<RetainedFields, ConversionError> {
    let Some(raw) = strip_retained_fields(metadata) else {
        return Ok(RetainedFields::default());
    };
    let retained: RetainedFields = serde_json::from_str(&raw)?;
    if !retained.empty_annotations
        && metadata.annotations.as_ref().is_some_and(BTreeMap::is_empty)
    {
        metadata.annotations = None;
    }
    Ok(retained)
}

#[cfg(test)]
#[path = "conversion_test.rs"]
mod tests;
