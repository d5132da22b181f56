//! ClusterImagePolicy conversion webhook
//!
//! Converts `policy.sigstore.dev` ClusterImagePolicy objects between the
//! v1alpha1 and v1beta1 API versions.

pub mod config;
pub mod crd;
pub mod server;
