//! Data Transfer Objects (DTOs) for requests and responses.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{CardBrand, OrderId, PaymentStatus};

// ─────────────────────────────────────────────────────────────────────────────
// Tokenization DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to tokenize a card.
#[derive(Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenizeRequest {
    /// Primary account number, 12 to 19 digits
    #[schema(example = "4242424242424242")]
    pub pan: String,
    #[schema(example = 12, minimum = 1, maximum = 12)]
    pub exp_month: u8,
    #[schema(example = 2030, minimum = 2024, maximum = 2100)]
    pub exp_year: u16,
    #[schema(example = "123")]
    pub cvc: String,
}

impl std::fmt::Debug for TokenizeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenizeRequest")
            .field("pan", &"<redacted>")
            .field("exp_month", &self.exp_month)
            .field("exp_year", &self.exp_year)
            .field("cvc", &"<redacted>")
            .finish()
    }
}

/// Response after tokenizing a card.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenizeResponse {
    /// Opaque `hsm:v1:` token
    pub token: String,
    pub brand: CardBrand,
    #[schema(example = "4242")]
    pub last4: String,
    pub exp_month: u8,
    pub exp_year: u16,
    /// PAN with all but the last four digits replaced by `*`
    #[schema(example = "************4242")]
    pub mask: String,
    /// Caller identity the token was issued to
    pub owner: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Direct charge DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to charge a tokenized card directly, without an order.
#[derive(Clone, Serialize, Deserialize, ToSchema)]
pub struct ChargeRequest {
    pub token: String,
    /// Amount in smallest currency unit, strictly positive
    #[schema(example = 500000)]
    pub amount: i64,
    /// Defaults to VND
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "VND")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp_month: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp_year: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cvc: Option<String>,
}

impl std::fmt::Debug for ChargeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChargeRequest")
            .field("token_len", &self.token.len())
            .field("amount", &self.amount)
            .field("currency", &self.currency)
            .field("exp_month", &self.exp_month)
            .field("exp_year", &self.exp_year)
            .field("cvc", &self.cvc.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// PSP charge outcome returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChargeResponse {
    /// Provider transaction id
    #[schema(example = "pi_mock_1a2b3c4d5e6f7a8b")]
    pub id: String,
    #[schema(example = "succeeded")]
    pub status: String,
    pub amount: i64,
    pub currency: String,
    pub last4: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt: Option<String>,
    #[schema(example = "mock")]
    pub provider: String,
    pub owner: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Orchestrated payment DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to pay an order with a previously issued token.
#[derive(Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatePaymentRequest {
    pub order_id: OrderId,
    pub payment_token: String,
}

impl std::fmt::Debug for CreatePaymentRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreatePaymentRequest")
            .field("order_id", &self.order_id)
            .field("payment_token_len", &self.payment_token.len())
            .finish()
    }
}

/// Result of a successful orchestration.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentResponse {
    pub status: PaymentStatus,
    /// Base64 RSA PKCS#1 v1.5 / SHA-256 signature over the canonical receipt
    pub signed_receipt: String,
    /// The signed receipt payload
    #[schema(value_type = Object)]
    pub receipt: serde_json::Value,
    /// `false` when the receipt could not be queued for reconciliation
    pub settlement_queued: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Crypto DTOs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignRequest {
    #[schema(example = "hello")]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignResponse {
    /// Standard base64 signature
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublicKeyResponse {
    /// Base64 DER SubjectPublicKeyInfo of the signing key
    pub public_key: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Misc
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    #[schema(example = "mock")]
    pub provider: String,
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charge_request_defaults() {
        let req: ChargeRequest =
            serde_json::from_str(r#"{"token":"hsm:v1:abc","amount":100}"#).unwrap();
        assert_eq!(req.currency, None);
        assert_eq!(req.cvc, None);
    }

    #[test]
    fn test_request_debug_redacts_card_data() {
        let req = TokenizeRequest {
            pan: "4242424242424242".into(),
            exp_month: 12,
            exp_year: 2030,
            cvc: "987".into(),
        };
        let rendered = format!("{:?}", req);
        assert!(!rendered.contains("4242424242424242"));
        assert!(!rendered.contains("987"));
    }
}
