//! PKCS#11 keystore (SoftHSM or a hardware token) via `cryptoki`.

use cryptoki::context::{CInitializeArgs, Pkcs11};
use cryptoki::error::{Error, RvError};
use cryptoki::mechanism::Mechanism;
use cryptoki::object::{Attribute, AttributeType, KeyType, ObjectClass, ObjectHandle};
use cryptoki::session::{Session, UserType};
use cryptoki::slot::Slot;
use cryptoki::types::AuthPin;

use crate::keystore::{KeyKind, Keystore, KeystoreError, KeystoreSession, PublicComponents};
use crate::token::IV_LEN;

const RSA_BITS: u64 = 2048;
const AES_KEY_LEN: u64 = 32;
const PUBLIC_EXPONENT: [u8; 3] = [0x01, 0x00, 0x01];

/// A PKCS#11 token located by label and logged into as the normal user.
pub struct Pkcs11Keystore {
    ctx: Pkcs11,
    slot: Slot,
    user_pin: String,
}

impl Pkcs11Keystore {
    /// Loads `module`, initialises it and finds the slot holding `token_label`.
    pub fn new(module: &str, token_label: &str, user_pin: &str) -> Result<Self, KeystoreError> {
        let ctx = Pkcs11::new(module).map_err(fault)?;
        ctx.initialize(CInitializeArgs::OsThreads).map_err(fault)?;

        let slot = ctx
            .get_slots_with_token()
            .map_err(fault)?
            .into_iter()
            .find(|slot| {
                ctx.get_token_info(*slot)
                    .map(|info| info.label().trim() == token_label)
                    .unwrap_or(false)
            })
            .ok_or_else(|| KeystoreError::Fault(format!("no token labelled {}", token_label)))?;

        tracing::info!(module, token_label, "pkcs11 token located");
        Ok(Self {
            ctx,
            slot,
            user_pin: user_pin.to_string(),
        })
    }
}

impl Keystore for Pkcs11Keystore {
    type Session = Pkcs11Session;

    fn open_session(&self) -> Result<Pkcs11Session, KeystoreError> {
        let session = self.ctx.open_rw_session(self.slot).map_err(fault)?;
        match session.login(UserType::User, Some(&AuthPin::new(self.user_pin.clone()))) {
            Ok(()) | Err(Error::Pkcs11(RvError::UserAlreadyLoggedIn, _)) => {}
            Err(e) => return Err(fault(e)),
        }
        Ok(Pkcs11Session { session })
    }
}

pub struct Pkcs11Session {
    session: Session,
}

fn template(kind: KeyKind, label: &str) -> Vec<Attribute> {
    let (class, key_type) = match kind {
        KeyKind::SigningPrivate => (ObjectClass::PRIVATE_KEY, KeyType::RSA),
        KeyKind::SigningPublic => (ObjectClass::PUBLIC_KEY, KeyType::RSA),
        KeyKind::Secret => (ObjectClass::SECRET_KEY, KeyType::AES),
    };
    vec![
        Attribute::Class(class),
        Attribute::KeyType(key_type),
        Attribute::Label(label.as_bytes().to_vec()),
    ]
}

fn fault(err: Error) -> KeystoreError {
    KeystoreError::Fault(err.to_string())
}

/// Bad ciphertext is the caller's problem, not the device's.
fn classify_decrypt(err: Error) -> KeystoreError {
    match err {
        Error::Pkcs11(RvError::EncryptedDataInvalid | RvError::EncryptedDataLenRange, _) => {
            KeystoreError::Rejected(err.to_string())
        }
        other => fault(other),
    }
}

impl KeystoreSession for Pkcs11Session {
    type Handle = ObjectHandle;

    fn find_key(
        &mut self,
        kind: KeyKind,
        label: &str,
    ) -> Result<Option<ObjectHandle>, KeystoreError> {
        let found = self
            .session
            .find_objects(&template(kind, label))
            .map_err(fault)?;
        Ok(found.into_iter().next())
    }

    fn generate_signing_keypair(&mut self, label: &str) -> Result<(), KeystoreError> {
        let public_template = vec![
            Attribute::Token(true),
            Attribute::Label(label.as_bytes().to_vec()),
            Attribute::ModulusBits(RSA_BITS.into()),
            Attribute::PublicExponent(PUBLIC_EXPONENT.to_vec()),
            Attribute::Verify(true),
        ];
        let private_template = vec![
            Attribute::Token(true),
            Attribute::Private(true),
            Attribute::Label(label.as_bytes().to_vec()),
            Attribute::Sign(true),
            Attribute::Sensitive(true),
            Attribute::Extractable(false),
        ];
        self.session
            .generate_key_pair(
                &Mechanism::RsaPkcsKeyPairGen,
                &public_template,
                &private_template,
            )
            .map_err(fault)?;
        Ok(())
    }

    fn generate_secret_key(&mut self, label: &str) -> Result<(), KeystoreError> {
        let key_template = vec![
            Attribute::Class(ObjectClass::SECRET_KEY),
            Attribute::KeyType(KeyType::AES),
            Attribute::ValueLen(AES_KEY_LEN.into()),
            Attribute::Token(true),
            Attribute::Private(true),
            Attribute::Label(label.as_bytes().to_vec()),
            Attribute::Encrypt(true),
            Attribute::Decrypt(true),
            Attribute::Sensitive(true),
            Attribute::Extractable(false),
        ];
        self.session
            .generate_key(&Mechanism::AesKeyGen, &key_template)
            .map_err(fault)?;
        Ok(())
    }

    fn sign(&mut self, key: ObjectHandle, data: &[u8]) -> Result<Vec<u8>, KeystoreError> {
        self.session
            .sign(&Mechanism::Sha256RsaPkcs, key, data)
            .map_err(fault)
    }

    fn public_components(&mut self, key: ObjectHandle) -> Result<PublicComponents, KeystoreError> {
        let attributes = self
            .session
            .get_attributes(key, &[AttributeType::Modulus, AttributeType::PublicExponent])
            .map_err(fault)?;

        let mut modulus = None;
        let mut exponent = None;
        for attribute in attributes {
            match attribute {
                Attribute::Modulus(value) => modulus = Some(value),
                Attribute::PublicExponent(value) => exponent = Some(value),
                _ => {}
            }
        }
        match (modulus, exponent) {
            (Some(modulus), Some(exponent)) => Ok(PublicComponents { modulus, exponent }),
            _ => Err(KeystoreError::Rejected(
                "public key is missing modulus or exponent".into(),
            )),
        }
    }

    fn encrypt(
        &mut self,
        key: ObjectHandle,
        iv: &[u8; IV_LEN],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, KeystoreError> {
        self.session
            .encrypt(&Mechanism::AesCbcPad(*iv), key, plaintext)
            .map_err(fault)
    }

    fn decrypt(
        &mut self,
        key: ObjectHandle,
        iv: &[u8; IV_LEN],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, KeystoreError> {
        self.session
            .decrypt(&Mechanism::AesCbcPad(*iv), key, ciphertext)
            .map_err(classify_decrypt)
    }
}
