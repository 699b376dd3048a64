//! Opaque payment tokens and their one-way fingerprints.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Version prefix of every token the crypto service issues.
pub const TOKEN_PREFIX: &str = "hsm:v1:";

/// Opaque `hsm:<version>:<payload>` string handed out by the crypto service.
///
/// The raw value is never logged; `Debug` prints only its length.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentToken(String);

impl PaymentToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for PaymentToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PaymentToken(<{} bytes>)", self.0.len())
    }
}

/// Lower-case hex SHA-256 of a payment token. This, not the token, is what
/// the replay ledger stores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenFingerprint(String);

impl TokenFingerprint {
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix safe to put in logs.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(12);
        &self.0[..end]
    }
}

impl fmt::Display for TokenFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_debug_is_redacted() {
        let token = PaymentToken::new("hsm:v1:c2VjcmV0");
        let rendered = format!("{:?}", token);
        assert!(!rendered.contains("c2VjcmV0"));
        assert!(rendered.contains("15 bytes"));
    }

    #[test]
    fn test_token_serializes_as_plain_string() {
        let token = PaymentToken::new("hsm:v1:abc");
        assert_eq!(serde_json::to_string(&token).unwrap(), "\"hsm:v1:abc\"");
    }

    #[test]
    fn test_fingerprint_short_prefix() {
        let fp = TokenFingerprint::from_hex("0123456789abcdef0123");
        assert_eq!(fp.short(), "0123456789ab");
        assert_eq!(TokenFingerprint::from_hex("abc").short(), "abc");
    }
}
