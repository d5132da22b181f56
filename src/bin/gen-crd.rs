use imagepolicy::config::{DEFAULT_HTTPS_PORT, DEFAULT_NAMESPACE, DEFAULT_SERVICE_NAME};
use imagepolicy::crd::v1alpha1::ClusterImagePolicy as PolicyV1alpha1;
use imagepolicy::crd::v1beta1::ClusterImagePolicy as PolicyV1beta1;
use kube::CustomResourceExt;
use serde_json::{json, Value};

/// Print the ClusterImagePolicy CRD with both versions and the conversion webhook
///
/// `cargo run --bin gen-crd | yq -P` for YAML.
fn main() -> anyhow::Result<()> {
    let mut crd: Value = serde_json::to_value(PolicyV1alpha1::crd())?;
    let beta: Value = serde_json::to_value(PolicyV1beta1::crd())?;

    let versions = crd["spec"]["versions"]
        .as_array_mut()
        .ok_or_else(|| anyhow::anyhow!("v1alpha1 CRD has no versions"))?;
    for version in versions.iter_mut() {
        version["served"] = json!(true);
        version["storage"] = json!(false);
    }
    let mut beta_version = beta["spec"]["versions"][0].clone();
    beta_version["served"] = json!(true);
    beta_version["storage"] = json!(true);
    versions.push(beta_version);

    crd["spec"]["conversion"] = json!({
        "strategy": "Webhook",
        "webhook": {
            "clientConfig": {
                "service": {
                    "name": DEFAULT_SERVICE_NAME,
                    "namespace": DEFAULT_NAMESPACE,
                    "path": "/convert",
                    "port": DEFAULT_HTTPS_PORT
                }
            },
            "conversionReviewVersions": ["v1"]
        }
    });

    println!("{}", serde_json::to_string_pretty(&crd)?);
    Ok(())
}
