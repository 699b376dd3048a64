//! Payment token fingerprinting for the replay ledger.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use sha2::{Digest, Sha256};

use payments_types::{TOKEN_PREFIX, TokenFingerprint};

/// Re-encodes a token's payload in the URL-safe alphabet.
///
/// The crypto service accepts either base64 alphabet, so two spellings of
/// the same IV and ciphertext must map to one ledger entry. Tokens whose
/// payload does not decode are returned unchanged; they never decrypt.
pub fn canonical_token(token: &str) -> String {
    let Some(payload) = token.strip_prefix(TOKEN_PREFIX) else {
        return token.to_string();
    };
    match URL_SAFE.decode(payload).or_else(|_| STANDARD.decode(payload)) {
        Ok(blob) => format!("{}{}", TOKEN_PREFIX, URL_SAFE.encode(blob)),
        Err(_) => token.to_string(),
    }
}

/// One-way SHA-256 fingerprint of the canonical token, lower-case hex.
pub fn fingerprint_token(token: &str) -> TokenFingerprint {
    let hash = Sha256::digest(canonical_token(token).as_bytes());
    TokenFingerprint::from_hex(hex::encode(hash))
}
