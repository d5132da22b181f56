//! TLS certificate bootstrap for the conversion webhook
//!
//! The API server only talks HTTPS to conversion webhooks and needs the CA
//! in the CRD's `spec.conversion.webhook.clientConfig.caBundle`. On startup
//! the webhook reuses the bundle stored in its Secret, or generates one,
//! then patches the CRD with the CA.
//!
//! ## Certificate Chain
//! ```text
//! Self-signed CA (policy-webhook-ca)
//!     └── Server cert (<service>.<namespace>.svc)
//! ```

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::ByteString;
use kube::api::{Patch, PatchParams, PostParams};
use kube::Api;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyPair, KeyUsagePurpose, SanType,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::crd::CRD_NAME;

/// Validity period for the CA certificate (10 years)
pub const CA_VALIDITY_DAYS: i64 = 3650;

/// Validity period for the server certificate (1 year)
pub const SERVER_VALIDITY_DAYS: i64 = 365;

/// Secret keys for storing certificate data
pub const SECRET_CA_CERT_KEY: &str = "ca.crt";
pub const SECRET_SERVER_CERT_KEY: &str = "tls.crt";
pub const SECRET_SERVER_KEY_KEY: &str = "tls.key";

const ORGANIZATION: &str = "imagepolicy";

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("Failed to generate certificate: {0}")]
    Generation(#[from] rcgen::Error),

    #[error("Invalid DNS name {name}: {reason}")]
    DnsName { name: String, reason: String },

    #[error("Failed to parse certificate: {0}")]
    Parse(String),

    #[error("Secret {secret} is missing {key}")]
    MissingSecretKey { secret: String, key: &'static str },

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Invalid PEM data")]
    InvalidPem,
}

/// CA and server certificate, PEM encoded
#[derive(Clone)]
pub struct CertificateBundle {
    pub ca_cert_pem: String,
    pub server_cert_pem: String,
    pub server_key_pem: String,
}

impl CertificateBundle {
    /// CA certificate as base64 DER, the form `caBundle` expects
    pub fn ca_bundle_base64(&self) -> Result<String, TlsError> {
        use base64::{engine::general_purpose::STANDARD, Engine};

        let pem = pem::parse(&self.ca_cert_pem)
            .map_err(|e| TlsError::Parse(format!("Failed to parse CA PEM: {}", e)))?;

        Ok(STANDARD.encode(pem.contents()))
    }
}

/// DNS names the API server may use to reach the service
pub fn service_dns_names(service_name: &str, namespace: &str) -> Vec<String> {
    vec![
        service_name.to_string(),
        format!("{}.{}", service_name, namespace),
        format!("{}.{}.svc", service_name, namespace),
        format!("{}.{}.svc.cluster.local", service_name, namespace),
    ]
}

fn validity(params: &mut CertificateParams, days: i64) {
    let now = time::OffsetDateTime::now_utc();
    params.not_before = now;
    params.not_after = now + time::Duration::days(days);
}

fn generate_ca() -> Result<(Certificate, KeyPair), TlsError> {
    let mut params = CertificateParams::default();
    params
        .distinguished_name
        .push(DnType::CommonName, "policy-webhook-ca");
    params
        .distinguished_name
        .push(DnType::OrganizationName, ORGANIZATION);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
    validity(&mut params, CA_VALIDITY_DAYS);

    let key_pair = KeyPair::generate()?;
    let cert = params.self_signed(&key_pair)?;
    Ok((cert, key_pair))
}

/// Server certificate signed by the CA, returned as (cert PEM, key PEM)
fn generate_server_cert(
    ca_cert: &Certificate,
    ca_key: &KeyPair,
    service_name: &str,
    namespace: &str,
) -> Result<(String, String), TlsError> {
    let mut params = CertificateParams::default();
    params
        .distinguished_name
        .push(DnType::CommonName, service_name);
    params
        .distinguished_name
        .push(DnType::OrganizationName, ORGANIZATION);

    params.subject_alt_names = service_dns_names(service_name, namespace)
        .into_iter()
        .map(|name| {
            name.clone()
                .try_into()
                .map(SanType::DnsName)
                .map_err(|e: rcgen::Error| TlsError::DnsName {
                    name,
                    reason: e.to_string(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
    validity(&mut params, SERVER_VALIDITY_DAYS);

    let key_pair = KeyPair::generate()?;
    let cert = params.signed_by(&key_pair, ca_cert, ca_key)?;
    Ok((cert.pem(), key_pair.serialize_pem()))
}

/// Generate a fresh CA and a server certificate for `service_name.namespace`
pub fn generate_certificate_bundle(
    service_name: &str,
    namespace: &str,
) -> Result<CertificateBundle, TlsError> {
    let (ca_cert, ca_key) = generate_ca()?;
    let (server_cert_pem, server_key_pem) =
        generate_server_cert(&ca_cert, &ca_key, service_name, namespace)?;

    Ok(CertificateBundle {
        ca_cert_pem: ca_cert.pem(),
        server_cert_pem,
        server_key_pem,
    })
}

/// Load the bundle from a Secret; `Ok(None)` when the Secret does not exist
pub async fn load_from_secret(
    client: &kube::Client,
    namespace: &str,
    secret_name: &str,
) -> Result<Option<CertificateBundle>, TlsError> {
    let secrets: Api<Secret> = Api::namespaced(client.clone(), namespace);

    let secret = match secrets.get_opt(secret_name).await? {
        Some(secret) => secret,
        None => return Ok(None),
    };
    let data = secret.data.unwrap_or_default();
    let entry = |key: &'static str| {
        data.get(key)
            .map(|b| String::from_utf8_lossy(&b.0).into_owned())
            .ok_or_else(|| TlsError::MissingSecretKey {
                secret: secret_name.to_string(),
                key,
            })
    };

    Ok(Some(CertificateBundle {
        ca_cert_pem: entry(SECRET_CA_CERT_KEY)?,
        server_cert_pem: entry(SECRET_SERVER_CERT_KEY)?,
        server_key_pem: entry(SECRET_SERVER_KEY_KEY)?,
    }))
}

/// Create or update the TLS Secret with the bundle
pub async fn save_to_secret(
    client: &kube::Client,
    namespace: &str,
    secret_name: &str,
    bundle: &CertificateBundle,
) -> Result<(), TlsError> {
    let secrets: Api<Secret> = Api::namespaced(client.clone(), namespace);

    let data: BTreeMap<String, ByteString> = [
        (SECRET_CA_CERT_KEY, &bundle.ca_cert_pem),
        (SECRET_SERVER_CERT_KEY, &bundle.server_cert_pem),
        (SECRET_SERVER_KEY_KEY, &bundle.server_key_pem),
    ]
    .into_iter()
    .map(|(key, pem)| (key.to_string(), ByteString(pem.as_bytes().to_vec())))
    .collect();

    let secret = Secret {
        metadata: kube::api::ObjectMeta {
            name: Some(secret_name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([(
                "app.kubernetes.io/managed-by".to_string(),
                ORGANIZATION.to_string(),
            )])),
            ..Default::default()
        },
        type_: Some("kubernetes.io/tls".to_string()),
        data: Some(data),
        ..Default::default()
    };

    match secrets.create(&PostParams::default(), &secret).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(err)) if err.code == 409 => {
            secrets
                .patch(secret_name, &PatchParams::default(), &Patch::Merge(&secret))
                .await?;
            Ok(())
        }
        Err(e) => Err(TlsError::Kube(e)),
    }
}

/// Point the ClusterImagePolicy CRD's conversion webhook at our CA
pub async fn patch_crd_ca_bundle(
    client: &kube::Client,
    ca_bundle_base64: &str,
) -> Result<(), TlsError> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());

    let patch = serde_json::json!({
        "spec": {
            "conversion": {
                "webhook": {
                    "clientConfig": {
                        "caBundle": ca_bundle_base64
                    }
                }
            }
        }
    });

    crds.patch(CRD_NAME, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    Ok(())
}

/// Load or generate the webhook certificates and publish the CA to the CRD
///
/// A failed CRD patch is logged, not returned: the CRD may not be installed yet.
pub async fn initialize_tls(
    client: &kube::Client,
    service_name: &str,
    namespace: &str,
    secret_name: &str,
) -> Result<CertificateBundle, TlsError> {
    let bundle = match load_from_secret(client, namespace, secret_name).await? {
        Some(bundle) => {
            info!(secret = secret_name, "Loaded existing TLS certificates from Secret");
            bundle
        }
        None => {
            info!("No existing TLS certificates found, generating new ones");
            let bundle = generate_certificate_bundle(service_name, namespace)?;
            save_to_secret(client, namespace, secret_name, &bundle).await?;
            info!(secret = secret_name, "Saved new TLS certificates to Secret");
            bundle
        }
    };

    let ca_bundle = bundle.ca_bundle_base64()?;
    if let Err(e) = patch_crd_ca_bundle(client, &ca_bundle).await {
        warn!(error = ?e, crd = CRD_NAME, "Failed to patch CRD with CA bundle");
    }

    Ok(bundle)
}

/// Build a rustls ServerConfig from the bundle
pub fn build_rustls_config(
    bundle: &CertificateBundle,
) -> Result<Arc<rustls::ServerConfig>, TlsError> {
    use rustls::pki_types::CertificateDer;
    use rustls_pemfile::{certs, private_key};
    use std::io::BufReader;

    let cert_chain: Vec<CertificateDer<'static>> =
        certs(&mut BufReader::new(bundle.server_cert_pem.as_bytes()))
            .collect::<Result<_, _>>()
            .map_err(|e| TlsError::Parse(format!("Failed to parse certificate chain: {}", e)))?;
    if cert_chain.is_empty() {
        return Err(TlsError::InvalidPem);
    }

    let key = private_key(&mut BufReader::new(bundle.server_key_pem.as_bytes()))
        .map_err(|e| TlsError::Parse(format!("Failed to parse private key: {}", e)))?
        .ok_or(TlsError::InvalidPem)?;

    let config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| TlsError::Parse(format!("Failed to set protocol versions: {}", e)))?
    .with_no_client_auth()
    .with_single_cert(cert_chain, key)
    .map_err(|e| TlsError::Parse(format!("Failed to build TLS config: {}", e)))?;

    Ok(Arc::new(config))
}
