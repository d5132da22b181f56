//! ClusterImagePolicy custom resource definitions
//!
//! - `v1alpha1` / `v1beta1`: served API versions (v1beta1 is the storage version)
//! - `model`: version-independent superset both versions convert through
//! - `conversion`: v1alpha1 <-> v1beta1 conversion

pub mod conversion;
pub mod model;
pub mod v1alpha1;
pub mod v1beta1;

/// API group of the ClusterImagePolicy CRD
pub const GROUP: &str = "policy.sigstore.dev";

/// Full CRD name, used when patching the conversion webhook CA bundle
pub const CRD_NAME: &str = "clusterimagepolicies.policy.sigstore.dev";

#[cfg(test)]
#[path = "crd_test.rs"]
mod tests;
