//! In-process software keystore.
//!
//! Behaves like a token: key objects persist across sessions of the same
//! `SoftKeystore` and are looked up by label. Key material never leaves this
//! module. Used in development and by the test suite.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use rsa::pkcs1v15::SigningKey;
use rsa::sha2::Sha256;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::keystore::{KeyKind, Keystore, KeystoreError, KeystoreSession, PublicComponents};
use crate::token::IV_LEN;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const RSA_BITS: usize = 2048;
const AES_KEY_LEN: usize = 32;

enum Material {
    RsaPrivate(Box<RsaPrivateKey>),
    RsaPublic(RsaPublicKey),
    Aes([u8; AES_KEY_LEN]),
}

struct SoftObject {
    handle: u64,
    kind: KeyKind,
    label: String,
    material: Material,
}

#[derive(Default)]
struct SoftState {
    objects: Mutex<Vec<SoftObject>>,
    next_handle: AtomicUsize,
    sessions_opened: AtomicUsize,
    fail_next: AtomicBool,
}

/// Software keystore. Cloning shares the same objects.
#[derive(Clone, Default)]
pub struct SoftKeystore {
    state: Arc<SoftState>,
}

impl SoftKeystore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions opened so far.
    pub fn sessions_opened(&self) -> usize {
        self.state.sessions_opened.load(Ordering::SeqCst)
    }

    /// Number of key objects of `kind` stored under `label`.
    pub fn object_count(&self, kind: KeyKind, label: &str) -> usize {
        lock(&self.state.objects)
            .iter()
            .filter(|o| o.kind == kind && o.label == label)
            .count()
    }

    /// Makes the next session operation fail with a device fault.
    pub fn inject_fault(&self) {
        self.state.fail_next.store(true, Ordering::SeqCst);
    }
}

impl Keystore for SoftKeystore {
    type Session = SoftSession;

    fn open_session(&self) -> Result<SoftSession, KeystoreError> {
        let id = self.state.sessions_opened.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(session = id, "soft keystore session opened");
        Ok(SoftSession {
            state: Arc::clone(&self.state),
            closed: false,
        })
    }
}

pub struct SoftSession {
    state: Arc<SoftState>,
    closed: bool,
}

impl SoftSession {
    fn check(&mut self) -> Result<(), KeystoreError> {
        if self.closed {
            return Err(KeystoreError::Fault("session closed".into()));
        }
        if self.state.fail_next.swap(false, Ordering::SeqCst) {
            // A faulted session stays dead, like CKR_SESSION_HANDLE_INVALID.
            self.closed = true;
            return Err(KeystoreError::Fault("CKR_DEVICE_ERROR (injected)".into()));
        }
        Ok(())
    }

    fn store(&self, kind: KeyKind, label: &str, material: Material) {
        let handle = self.state.next_handle.fetch_add(1, Ordering::SeqCst) as u64 + 1;
        lock(&self.state.objects).push(SoftObject {
            handle,
            kind,
            label: label.to_string(),
            material,
        });
    }

    fn with_material<T>(
        &self,
        handle: u64,
        f: impl FnOnce(&Material) -> Result<T, KeystoreError>,
    ) -> Result<T, KeystoreError> {
        let objects = lock(&self.state.objects);
        let object = objects
            .iter()
            .find(|o| o.handle == handle)
            .ok_or_else(|| KeystoreError::NotFound(format!("object handle {}", handle)))?;
        f(&object.material)
    }
}

impl KeystoreSession for SoftSession {
    type Handle = u64;

    fn find_key(&mut self, kind: KeyKind, label: &str) -> Result<Option<u64>, KeystoreError> {
        self.check()?;
        Ok(lock(&self.state.objects)
            .iter()
            .find(|o| o.kind == kind && o.label == label)
            .map(|o| o.handle))
    }

    fn generate_signing_keypair(&mut self, label: &str) -> Result<(), KeystoreError> {
        self.check()?;
        let private = RsaPrivateKey::new(&mut rsa::rand_core::OsRng, RSA_BITS)
            .map_err(|e| KeystoreError::Fault(format!("key generation failed: {}", e)))?;
        let public = RsaPublicKey::from(&private);
        self.store(KeyKind::SigningPublic, label, Material::RsaPublic(public));
        self.store(
            KeyKind::SigningPrivate,
            label,
            Material::RsaPrivate(Box::new(private)),
        );
        Ok(())
    }

    fn generate_secret_key(&mut self, label: &str) -> Result<(), KeystoreError> {
        self.check()?;
        let mut key = [0u8; AES_KEY_LEN];
        rand::rng().fill_bytes(&mut key);
        self.store(KeyKind::Secret, label, Material::Aes(key));
        Ok(())
    }

    fn sign(&mut self, key: u64, data: &[u8]) -> Result<Vec<u8>, KeystoreError> {
        self.check()?;
        self.with_material(key, |material| match material {
            Material::RsaPrivate(private) => {
                let signing_key = SigningKey::<Sha256>::new((**private).clone());
                let signature = signing_key
                    .try_sign(data)
                    .map_err(|e| KeystoreError::Fault(format!("sign failed: {}", e)))?;
                Ok(signature.to_vec())
            }
            _ => Err(KeystoreError::Rejected("key cannot sign".into())),
        })
    }

    fn public_components(&mut self, key: u64) -> Result<PublicComponents, KeystoreError> {
        self.check()?;
        self.with_material(key, |material| match material {
            Material::RsaPublic(public) => Ok(PublicComponents {
                modulus: public.n().to_bytes_be(),
                exponent: public.e().to_bytes_be(),
            }),
            _ => Err(KeystoreError::Rejected("not an RSA public key".into())),
        })
    }

    fn encrypt(
        &mut self,
        key: u64,
        iv: &[u8; IV_LEN],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, KeystoreError> {
        self.check()?;
        self.with_material(key, |material| match material {
            Material::Aes(secret) => {
                let cipher = Aes256CbcEnc::new_from_slices(secret, iv)
                    .map_err(|e| KeystoreError::Fault(e.to_string()))?;
                Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
            }
            _ => Err(KeystoreError::Rejected("key cannot encrypt".into())),
        })
    }

    fn decrypt(
        &mut self,
        key: u64,
        iv: &[u8; IV_LEN],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, KeystoreError> {
        self.check()?;
        self.with_material(key, |material| match material {
            Material::Aes(secret) => {
                let cipher = Aes256CbcDec::new_from_slices(secret, iv)
                    .map_err(|e| KeystoreError::Fault(e.to_string()))?;
                cipher
                    .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                    .map_err(|_| KeystoreError::Rejected("CKR_ENCRYPTED_DATA_INVALID".into()))
            }
            _ => Err(KeystoreError::Rejected("key cannot decrypt".into())),
        })
    }
}

impl Drop for SoftSession {
    fn drop(&mut self) {
        tracing::debug!("soft keystore session closed");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
