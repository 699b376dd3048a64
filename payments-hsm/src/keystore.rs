//! Keystore port.
//!
//! A keystore hands out sessions; a session is a stateful, single-owner handle
//! that can find, generate and use keys by label. Sessions are blocking and
//! not assumed safe for concurrent use.

use crate::token::IV_LEN;

/// The three key objects the service manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    SigningPrivate,
    SigningPublic,
    Secret,
}

#[derive(Debug, thiserror::Error)]
pub enum KeystoreError {
    /// No key object with the requested label.
    #[error("key not found: {0}")]
    NotFound(String),

    /// The keystore refused the input (bad padding, wrong length).
    /// The session is still usable.
    #[error("operation rejected: {0}")]
    Rejected(String),

    /// Device, transport or session failure. The session must be discarded.
    #[error("keystore fault: {0}")]
    Fault(String),
}

/// Raw RSA public key parts, big-endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicComponents {
    pub modulus: Vec<u8>,
    pub exponent: Vec<u8>,
}

pub trait Keystore: Send + Sync + 'static {
    type Session: KeystoreSession;

    /// Opens and authenticates a new session.
    fn open_session(&self) -> Result<Self::Session, KeystoreError>;
}

pub trait KeystoreSession: Send + 'static {
    type Handle: Copy + Send + 'static;

    fn find_key(&mut self, kind: KeyKind, label: &str)
    -> Result<Option<Self::Handle>, KeystoreError>;

    /// Generates a 2048-bit RSA pair (e = 65537) under `label`. The private
    /// half is sign-only, sensitive and non-extractable.
    fn generate_signing_keypair(&mut self, label: &str) -> Result<(), KeystoreError>;

    /// Generates a non-extractable AES-256 key under `label`.
    fn generate_secret_key(&mut self, label: &str) -> Result<(), KeystoreError>;

    /// RSA PKCS#1 v1.5 with SHA-256.
    fn sign(&mut self, key: Self::Handle, data: &[u8]) -> Result<Vec<u8>, KeystoreError>;

    fn public_components(&mut self, key: Self::Handle) -> Result<PublicComponents, KeystoreError>;

    /// AES-CBC with PKCS#7 padding.
    fn encrypt(
        &mut self,
        key: Self::Handle,
        iv: &[u8; IV_LEN],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, KeystoreError>;

    fn decrypt(
        &mut self,
        key: Self::Handle,
        iv: &[u8; IV_LEN],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, KeystoreError>;
}
