//! `hsm:v1:` token wire format.
//!
//! `hsm:v1:` followed by base64 (URL-safe alphabet, padded) of the 16-byte
//! IV and then the ciphertext.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};

use payments_types::{CryptoError, PaymentToken};

pub use payments_types::TOKEN_PREFIX;
pub const IV_LEN: usize = 16;

pub fn encode(iv: &[u8; IV_LEN], ciphertext: &[u8]) -> PaymentToken {
    let mut blob = Vec::with_capacity(IV_LEN + ciphertext.len());
    blob.extend_from_slice(iv);
    blob.extend_from_slice(ciphertext);
    PaymentToken::new(format!("{}{}", TOKEN_PREFIX, URL_SAFE.encode(blob)))
}

/// Splits a token into IV and ciphertext.
pub fn decode(token: &str) -> Result<([u8; IV_LEN], Vec<u8>), CryptoError> {
    let payload = token
        .strip_prefix(TOKEN_PREFIX)
        .ok_or(CryptoError::UnsupportedTokenFormat)?;

    let blob = URL_SAFE
        .decode(payload)
        .or_else(|_| STANDARD.decode(payload))
        .map_err(|e| CryptoError::InvalidToken(format!("bad base64: {}", e)))?;

    if blob.len() <= IV_LEN {
        return Err(CryptoError::InvalidToken("token carries no ciphertext".into()));
    }

    let (iv, ciphertext) = blob.split_at(IV_LEN);
    let mut iv_bytes = [0u8; IV_LEN];
    iv_bytes.copy_from_slice(iv);
    Ok((iv_bytes, ciphertext.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_then_decode_splits_iv() {
        let iv = [7u8; IV_LEN];
        let token = encode(&iv, &[1, 2, 3, 4]);
        assert!(token.expose().starts_with("hsm:v1:"));

        let (got_iv, ciphertext) = decode(token.expose()).unwrap();
        assert_eq!(got_iv, iv);
        assert_eq!(ciphertext, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_unknown_prefix_is_unsupported() {
        for token in ["hsm:v2:AAAA", "tok_123", "", "HSM:V1:AAAA"] {
            assert_eq!(decode(token), Err(CryptoError::UnsupportedTokenFormat));
        }
    }

    #[test]
    fn test_bad_base64_is_invalid() {
        assert!(matches!(
            decode("hsm:v1:***not-base64***"),
            Err(CryptoError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_iv_only_payload_is_invalid() {
        let blob = URL_SAFE.encode([0u8; IV_LEN]);
        assert!(matches!(
            decode(&format!("hsm:v1:{}", blob)),
            Err(CryptoError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_standard_alphabet_accepted() {
        // 0xfb 0xff encodes to "+/" in the standard alphabet.
        let mut blob = vec![0u8; IV_LEN];
        blob.extend_from_slice(&[0xfb, 0xff, 0xfe]);
        let token = format!("hsm:v1:{}", STANDARD.encode(&blob));
        assert!(token.contains('+') || token.contains('/'));

        let (_, ciphertext) = decode(&token).unwrap();
        assert_eq!(ciphertext, vec![0xfb, 0xff, 0xfe]);
    }
}
