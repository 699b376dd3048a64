//! # Payments HSM
//!
//! Crypto/HSM service for the payments service: a signing key pair and a
//! symmetric token encryption key that live inside a keystore and never
//! leave it.
//!
//! - `keystore` - the keystore port (`Keystore`, `KeystoreSession`)
//! - `service` - `HsmService`, the single guarded session implementing `CryptoProvider`
//! - `token` - the `hsm:v1:` token wire format
//! - `soft` - software keystore for development and tests
//! - `pkcs11` - PKCS#11 keystore (SoftHSM or hardware), behind the `pkcs11` feature

pub mod keystore;
#[cfg(feature = "pkcs11")]
pub mod pkcs11;
pub mod service;
pub mod soft;
pub mod token;

pub use keystore::{KeyKind, Keystore, KeystoreError, KeystoreSession, PublicComponents};
#[cfg(feature = "pkcs11")]
pub use pkcs11::Pkcs11Keystore;
pub use service::{HsmService, KeyLabels};
pub use soft::SoftKeystore;
