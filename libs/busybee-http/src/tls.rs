//! rustls crypto provider for the HTTPS connector.

use std::sync::Arc;

/// The process-wide default crypto provider, or aws-lc-rs when none is installed.
#[must_use]
pub fn get_crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}
