//! Crypto/HSM service port.

use crate::domain::PaymentToken;
use crate::error::CryptoError;

/// Signing and token encryption backed by a keystore that never releases
/// private or secret key material.
#[async_trait::async_trait]
pub trait CryptoProvider: Send + Sync + 'static {
    /// Finds or generates the signing key pair and the encryption key.
    /// Idempotent; never rotates an existing key.
    async fn ensure_keys(&self) -> Result<(), CryptoError>;

    /// RSA PKCS#1 v1.5 / SHA-256 signature over `message`.
    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// DER-encoded SubjectPublicKeyInfo of the signing key.
    async fn export_public_key(&self) -> Result<Vec<u8>, CryptoError>;

    /// Encrypts under a fresh IV and wraps the result as an `hsm:v1:` token.
    async fn encrypt_token(&self, plaintext: &[u8]) -> Result<PaymentToken, CryptoError>;

    async fn decrypt_token(&self, token: &str) -> Result<Vec<u8>, CryptoError>;
}
