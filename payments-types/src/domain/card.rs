//! Card data. These values only live for the duration of a tokenize or charge
//! call and are never persisted or logged.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::error::DomainError;

const MIN_PAN_LEN: usize = 12;
const MAX_PAN_LEN: usize = 19;
const MIN_EXP_YEAR: u16 = 2024;
const MAX_EXP_YEAR: u16 = 2100;

/// Card network, derived from the leading digits of the PAN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CardBrand {
    Visa,
    Mastercard,
    Card,
}

impl CardBrand {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardBrand::Visa => "visa",
            CardBrand::Mastercard => "mastercard",
            CardBrand::Card => "card",
        }
    }
}

impl fmt::Display for CardBrand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primary account number.
///
/// `Debug` only ever shows the masked form.
#[derive(Clone, PartialEq, Eq)]
pub struct CardNumber(String);

impl CardNumber {
    /// Parses a PAN, ignoring spaces and dashes between digit groups.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let digits: String = raw.chars().filter(|c| *c != ' ' && *c != '-').collect();
        if !(MIN_PAN_LEN..=MAX_PAN_LEN).contains(&digits.len())
            || !digits.chars().all(|c| c.is_ascii_digit())
        {
            return Err(DomainError::InvalidCardNumber);
        }
        Ok(Self(digits))
    }

    /// Raw digits. Only hand these to the crypto service or the PSP.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn brand(&self) -> CardBrand {
        let bytes = self.0.as_bytes();
        match (bytes[0], bytes[1]) {
            (b'4', _) => CardBrand::Visa,
            (b'5', b'1'..=b'5') => CardBrand::Mastercard,
            _ => CardBrand::Card,
        }
    }

    pub fn last4(&self) -> &str {
        &self.0[self.0.len() - 4..]
    }

    /// All digits but the last four replaced with `*`.
    pub fn masked(&self) -> String {
        let hidden = self.0.len() - 4;
        let mut out = "*".repeat(hidden);
        out.push_str(self.last4());
        out
    }
}

impl fmt::Debug for CardNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CardNumber").field(&self.masked()).finish()
    }
}

/// Card expiry month/year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardExpiry {
    month: u8,
    year: u16,
}

impl CardExpiry {
    pub fn new(month: u8, year: u16) -> Result<Self, DomainError> {
        if !(1..=12).contains(&month) {
            return Err(DomainError::InvalidExpiry(format!(
                "month must be 1..=12, got {}",
                month
            )));
        }
        if !(MIN_EXP_YEAR..=MAX_EXP_YEAR).contains(&year) {
            return Err(DomainError::InvalidExpiry(format!(
                "year must be {}..={}, got {}",
                MIN_EXP_YEAR, MAX_EXP_YEAR, year
            )));
        }
        Ok(Self { month, year })
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    pub fn year(&self) -> u16 {
        self.year
    }
}

/// Card verification code, redacted in `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Cvc(String);

impl Cvc {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let raw = raw.trim();
        if !(3..=4).contains(&raw.len()) || !raw.chars().all(|c| c.is_ascii_digit()) {
            return Err(DomainError::InvalidCvc);
        }
        Ok(Self(raw.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Cvc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cvc(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pan_length_bounds() {
        assert!(CardNumber::parse("12345678901").is_err());
        assert!(CardNumber::parse("123456789012").is_ok());
        assert!(CardNumber::parse("1234567890123456789").is_ok());
        assert!(CardNumber::parse("12345678901234567890").is_err());
    }

    #[test]
    fn test_pan_rejects_letters() {
        assert!(matches!(
            CardNumber::parse("4242abcd42424242"),
            Err(DomainError::InvalidCardNumber)
        ));
    }

    #[test]
    fn test_pan_accepts_grouped_input() {
        let pan = CardNumber::parse("4242 4242 4242 4242").unwrap();
        assert_eq!(pan.expose(), "4242424242424242");
    }

    #[test]
    fn test_brand_detection() {
        assert_eq!(CardNumber::parse("4111111111111111").unwrap().brand(), CardBrand::Visa);
        assert_eq!(
            CardNumber::parse("5105105105105100").unwrap().brand(),
            CardBrand::Mastercard
        );
        assert_eq!(
            CardNumber::parse("5555555555554444").unwrap().brand(),
            CardBrand::Mastercard
        );
        assert_eq!(CardNumber::parse("5612345678901234").unwrap().brand(), CardBrand::Card);
        assert_eq!(CardNumber::parse("378282246310005").unwrap().brand(), CardBrand::Card);
    }

    #[test]
    fn test_mask_keeps_last_four() {
        let pan = CardNumber::parse("4242424242424242").unwrap();
        assert_eq!(pan.last4(), "4242");
        assert_eq!(pan.masked(), "************4242");
    }

    #[test]
    fn test_debug_never_shows_pan() {
        let pan = CardNumber::parse("4111111111111111").unwrap();
        let rendered = format!("{:?}", pan);
        assert!(!rendered.contains("4111111111111111"));
        assert!(rendered.contains("1111"));

        let cvc = Cvc::parse("123").unwrap();
        assert!(!format!("{:?}", cvc).contains("123"));
    }

    #[test]
    fn test_expiry_bounds() {
        assert!(CardExpiry::new(0, 2030).is_err());
        assert!(CardExpiry::new(13, 2030).is_err());
        assert!(CardExpiry::new(12, 2023).is_err());
        assert!(CardExpiry::new(12, 2101).is_err());
        let exp = CardExpiry::new(1, 2024).unwrap();
        assert_eq!((exp.month(), exp.year()), (1, 2024));
    }

    #[test]
    fn test_cvc_shape() {
        assert!(Cvc::parse("12").is_err());
        assert!(Cvc::parse("12345").is_err());
        assert!(Cvc::parse("12a").is_err());
        assert_eq!(Cvc::parse("1234").unwrap().expose(), "1234");
    }
}
