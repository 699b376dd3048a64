//! Payment intents and the replay-protection ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::money::{CurrencyCode, Money};
use super::order::OrderId;
use super::token::TokenFingerprint;
use crate::error::DomainError;

/// Unique identifier for a PaymentIntent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct PaymentIntentId(Uuid);

impl PaymentIntentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PaymentIntentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PaymentIntentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
        }
    }

    pub fn is_final(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "SUCCESS" => Ok(PaymentStatus::Success),
            "FAILED" => Ok(PaymentStatus::Failed),
            other => Err(DomainError::ValidationError(format!(
                "unknown payment status: {}",
                other
            ))),
        }
    }
}

/// One orchestration attempt that reached the payment store.
///
/// Invariant: `signed_receipt` is present iff `status` is `Success`.
/// There are no mutators; a stored intent is never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: PaymentIntentId,
    pub order_id: OrderId,
    pub amount: i64,
    pub currency: CurrencyCode,
    pub status: PaymentStatus,
    pub signed_receipt: Option<String>,
    pub receipt_payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentIntent {
    /// A successful payment carrying its signed receipt.
    pub fn succeeded(
        order_id: OrderId,
        money: &Money,
        signed_receipt: String,
        receipt_payload: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentIntentId::new(),
            order_id,
            amount: money.amount(),
            currency: money.currency().clone(),
            status: PaymentStatus::Success,
            signed_receipt: Some(signed_receipt),
            receipt_payload,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstructs an intent from storage, re-checking the receipt invariant.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: PaymentIntentId,
        order_id: OrderId,
        amount: i64,
        currency: CurrencyCode,
        status: PaymentStatus,
        signed_receipt: Option<String>,
        receipt_payload: serde_json::Value,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if (status == PaymentStatus::Success) != signed_receipt.is_some() {
            return Err(DomainError::ValidationError(format!(
                "payment intent {} is {} but signed receipt presence is {}",
                id,
                status,
                signed_receipt.is_some()
            )));
        }
        Ok(Self {
            id,
            order_id,
            amount,
            currency,
            status,
            signed_receipt,
            receipt_payload,
            created_at,
            updated_at,
        })
    }
}

/// A consumed payment token, stored by fingerprint only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsedToken {
    pub id: Uuid,
    pub fingerprint: TokenFingerprint,
    pub order_id: OrderId,
    pub created_at: DateTime<Utc>,
}

impl UsedToken {
    pub fn new(fingerprint: TokenFingerprint, order_id: OrderId) -> Self {
        Self {
            id: Uuid::new_v4(),
            fingerprint,
            order_id,
            created_at: Utc::now(),
        }
    }
}
