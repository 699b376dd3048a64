//! Crypto/HSM service selection.

use std::sync::Arc;

use anyhow::Context;

use payments_hsm::{HsmService, KeyLabels, SoftKeystore};
use payments_types::CryptoProvider;

use crate::config::{HsmBackend, HsmConfig};

/// Opens the configured keystore and makes sure both managed keys exist.
pub async fn build_crypto(config: &HsmConfig) -> anyhow::Result<Arc<dyn CryptoProvider>> {
    let labels = KeyLabels {
        signing: config.signing_key_label.clone(),
        encryption: config.encryption_key_label.clone(),
    };

    let crypto: Arc<dyn CryptoProvider> = match config.backend {
        HsmBackend::Soft => {
            tracing::warn!("using the in-process software keystore; keys are lost on restart");
            Arc::new(HsmService::new(SoftKeystore::new(), labels))
        }
        HsmBackend::Pkcs11 => pkcs11_service(config, labels)?,
    };

    crypto
        .ensure_keys()
        .await
        .context("failed to provision HSM keys")?;
    tracing::info!(
        signing = %config.signing_key_label,
        encryption = %config.encryption_key_label,
        "HSM keys ready"
    );
    Ok(crypto)
}

#[cfg(feature = "pkcs11")]
fn pkcs11_service(config: &HsmConfig, labels: KeyLabels) -> anyhow::Result<Arc<dyn CryptoProvider>> {
    let keystore =
        payments_hsm::Pkcs11Keystore::new(&config.module, &config.token_label, &config.user_pin)
            .with_context(|| format!("failed to open PKCS#11 module {}", config.module))?;
    Ok(Arc::new(HsmService::new(keystore, labels)))
}

#[cfg(not(feature = "pkcs11"))]
fn pkcs11_service(_config: &HsmConfig, _labels: KeyLabels) -> anyhow::Result<Arc<dyn CryptoProvider>> {
    anyhow::bail!("HSM_BACKEND=pkcs11 requires a build with the `pkcs11` feature")
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE;

    fn soft_config() -> HsmConfig {
        HsmConfig {
            backend: HsmBackend::Soft,
            module: String::new(),
            token_label: "payment-hsm".into(),
            user_pin: "5678".into(),
            signing_key_label: "sign".into(),
            encryption_key_label: "enc".into(),
        }
    }

    #[tokio::test]
    async fn test_soft_backend_is_provisioned() {
        let crypto = build_crypto(&soft_config()).await.unwrap();

        let token = crypto.encrypt_token(b"4242424242424242").await.unwrap();
        let payload = URL_SAFE
            .decode(token.expose().trim_start_matches("hsm:v1:"))
            .unwrap();
        assert!(payload.len() > 16);
        assert_eq!(
            crypto.decrypt_token(token.expose()).await.unwrap(),
            b"4242424242424242"
        );
        assert!(!crypto.export_public_key().await.unwrap().is_empty());
    }

    #[cfg(not(feature = "pkcs11"))]
    #[tokio::test]
    async fn test_pkcs11_needs_feature() {
        let config = HsmConfig {
            backend: HsmBackend::Pkcs11,
            ..soft_config()
        };
        let err = build_crypto(&config).await.err().unwrap();
        assert!(err.to_string().contains("pkcs11"));
    }
}
