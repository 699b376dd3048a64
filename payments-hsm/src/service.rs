//! Guarded single-session HSM service.
//!
//! All keystore work funnels through one session slot behind a mutex.
//! Callers queue for the slot instead of opening parallel sessions. The slot
//! is opened lazily and discarded on any keystore fault, so the next caller
//! reopens it. Keystore calls block, so they run on the blocking pool.

use std::sync::{Arc, Mutex};

use rand::RngCore;
use rsa::pkcs8::EncodePublicKey;
use rsa::{BigUint, RsaPublicKey};

use payments_types::{CryptoError, CryptoProvider, PaymentToken};

use crate::keystore::{KeyKind, Keystore, KeystoreError, KeystoreSession};
use crate::token::{self, IV_LEN};

/// Labels of the managed key objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLabels {
    pub signing: String,
    pub encryption: String,
}

impl Default for KeyLabels {
    fn default() -> Self {
        Self {
            signing: "payment-signing-key".into(),
            encryption: "payment-encryption-key".into(),
        }
    }
}

#[derive(Clone, Copy)]
struct ResolvedKeys<H> {
    signing_private: H,
    signing_public: H,
    secret: H,
}

struct Slot<S: KeystoreSession> {
    session: S,
    keys: Option<ResolvedKeys<S::Handle>>,
}

impl<S: KeystoreSession> Slot<S> {
    fn keys(&mut self, labels: &KeyLabels) -> Result<ResolvedKeys<S::Handle>, KeystoreError> {
        if let Some(keys) = self.keys {
            return Ok(keys);
        }
        let keys = ResolvedKeys {
            signing_private: find_required(
                &mut self.session,
                KeyKind::SigningPrivate,
                &labels.signing,
            )?,
            signing_public: find_required(
                &mut self.session,
                KeyKind::SigningPublic,
                &labels.signing,
            )?,
            secret: find_required(&mut self.session, KeyKind::Secret, &labels.encryption)?,
        };
        self.keys = Some(keys);
        Ok(keys)
    }
}

fn find_required<S: KeystoreSession>(
    session: &mut S,
    kind: KeyKind,
    label: &str,
) -> Result<S::Handle, KeystoreError> {
    session
        .find_key(kind, label)?
        .ok_or_else(|| KeystoreError::NotFound(label.to_string()))
}

struct Inner<K: Keystore> {
    keystore: K,
    labels: KeyLabels,
    slot: Mutex<Option<Slot<K::Session>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    EnsureKeys,
    Sign,
    ExportPublicKey,
    Encrypt,
    Decrypt,
}

/// Crypto service over a keystore. Cheap to clone; clones share the session.
pub struct HsmService<K: Keystore> {
    inner: Arc<Inner<K>>,
}

impl<K: Keystore> Clone for HsmService<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: Keystore> HsmService<K> {
    pub fn new(keystore: K, labels: KeyLabels) -> Self {
        Self {
            inner: Arc::new(Inner {
                keystore,
                labels,
                slot: Mutex::new(None),
            }),
        }
    }

    pub fn keystore(&self) -> &K {
        &self.inner.keystore
    }

    /// Runs `f` against the shared session on the blocking pool.
    async fn with_session<T, F>(&self, op: Op, f: F) -> Result<T, CryptoError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Slot<K::Session>, &KeyLabels) -> Result<T, KeystoreError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.run(op, f))
            .await
            .map_err(|e| CryptoError::HsmTransport(format!("keystore task failed: {}", e)))?
    }
}

impl<K: Keystore> Inner<K> {
    fn run<T, F>(&self, op: Op, f: F) -> Result<T, CryptoError>
    where
        F: FnOnce(&mut Slot<K::Session>, &KeyLabels) -> Result<T, KeystoreError>,
    {
        let mut guard = self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if guard.is_none() {
            let session = self.keystore.open_session().map_err(|e| {
                tracing::error!(error = %e, "failed to open keystore session");
                CryptoError::HsmTransport(e.to_string())
            })?;
            tracing::debug!("keystore session opened");
            *guard = Some(Slot {
                session,
                keys: None,
            });
        }

        let slot = guard
            .as_mut()
            .ok_or_else(|| CryptoError::HsmTransport("keystore session unavailable".into()))?;

        match f(slot, &self.labels) {
            Ok(value) => Ok(value),
            Err(KeystoreError::Fault(message)) => {
                tracing::warn!(?op, error = %message, "keystore fault, discarding session");
                *guard = None;
                Err(CryptoError::HsmTransport(message))
            }
            Err(KeystoreError::NotFound(label)) => {
                Err(CryptoError::KeyUnavailable(format!("no key labelled {}", label)))
            }
            Err(KeystoreError::Rejected(message)) if op == Op::Decrypt => {
                Err(CryptoError::InvalidToken(message))
            }
            Err(KeystoreError::Rejected(message)) => Err(CryptoError::HsmTransport(message)),
        }
    }
}

fn der_from_components(modulus: &[u8], exponent: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let key = RsaPublicKey::new(
        BigUint::from_bytes_be(modulus),
        BigUint::from_bytes_be(exponent),
    )
    .map_err(|e| CryptoError::HsmTransport(format!("invalid public key components: {}", e)))?;
    let der = key
        .to_public_key_der()
        .map_err(|e| CryptoError::HsmTransport(format!("public key encoding failed: {}", e)))?;
    Ok(der.as_bytes().to_vec())
}

#[async_trait::async_trait]
impl<K: Keystore> CryptoProvider for HsmService<K> {
    #[tracing::instrument(skip(self))]
    async fn ensure_keys(&self) -> Result<(), CryptoError> {
        self.with_session(Op::EnsureKeys, |slot, labels| {
            let session = &mut slot.session;
            if session
                .find_key(KeyKind::SigningPrivate, &labels.signing)?
                .is_none()
            {
                tracing::info!(label = %labels.signing, "generating signing key pair");
                session.generate_signing_keypair(&labels.signing)?;
            }
            if session
                .find_key(KeyKind::Secret, &labels.encryption)?
                .is_none()
            {
                tracing::info!(label = %labels.encryption, "generating encryption key");
                session.generate_secret_key(&labels.encryption)?;
            }
            slot.keys = None;
            slot.keys(labels)?;
            Ok(())
        })
        .await
    }

    #[tracing::instrument(skip(self, message), fields(len = message.len()))]
    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let message = message.to_vec();
        self.with_session(Op::Sign, move |slot, labels| {
            let keys = slot.keys(labels)?;
            slot.session.sign(keys.signing_private, &message)
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn export_public_key(&self) -> Result<Vec<u8>, CryptoError> {
        let components = self
            .with_session(Op::ExportPublicKey, |slot, labels| {
                let keys = slot.keys(labels)?;
                slot.session.public_components(keys.signing_public)
            })
            .await?;
        der_from_components(&components.modulus, &components.exponent)
    }

    #[tracing::instrument(skip(self, plaintext))]
    async fn encrypt_token(&self, plaintext: &[u8]) -> Result<PaymentToken, CryptoError> {
        let plaintext = plaintext.to_vec();
        let mut iv = [0u8; IV_LEN];
        rand::rng().fill_bytes(&mut iv);

        let ciphertext = self
            .with_session(Op::Encrypt, move |slot, labels| {
                let keys = slot.keys(labels)?;
                slot.session.encrypt(keys.secret, &iv, &plaintext)
            })
            .await?;
        Ok(token::encode(&iv, &ciphertext))
    }

    #[tracing::instrument(skip(self, token), fields(len = token.len()))]
    async fn decrypt_token(&self, token: &str) -> Result<Vec<u8>, CryptoError> {
        let (iv, ciphertext) = token::decode(token)?;
        self.with_session(Op::Decrypt, move |slot, labels| {
            let keys = slot.keys(labels)?;
            slot.session.decrypt(keys.secret, &iv, &ciphertext)
        })
        .await
    }
}
