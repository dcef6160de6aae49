use crate::utils::error::{EtlError, Result};
use rustls::{ClientConfig, RootCertStore};
use rustls_native_certs::load_native_certs;
use std::sync::Arc;

/// TLS configuration for the remote connection, trusting the platform's
/// native root certificates.
pub(crate) fn rustls_client_config() -> Result<ClientConfig> {
    let mut root_store = RootCertStore::empty();
    let cert_result = load_native_certs();
    for err in &cert_result.errors {
        tracing::warn!("⚠️ Could not load a native certificate: {}", err);
    }
    let (added, ignored) = root_store.add_parsable_certificates(cert_result.certs);
    tracing::debug!("Loaded {} root certificates ({} ignored)", added, ignored);

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| EtlError::ConnectionError {
            message: format!("could not configure TLS: {}", e),
        })?
        .with_root_certificates(root_store)
        .with_no_client_auth();
    Ok(config)
}
