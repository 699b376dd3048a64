//! Signed receipts and the settlement records derived from them.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::money::CurrencyCode;
use super::order::OrderId;
use super::payment::PaymentStatus;
use crate::error::ReconciliationError;

/// The payload that gets signed after a successful charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub order_id: OrderId,
    pub amount: i64,
    pub currency: CurrencyCode,
    pub timestamp: DateTime<Utc>,
    pub status: PaymentStatus,
    pub provider: String,
    pub psp_reference: String,
    pub last4: String,
}

impl Receipt {
    /// JSON object form with the timestamp rendered as RFC 3339 UTC.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        // Inserted in lexicographic key order so the map iterates sorted
        // whichever map backend serde_json is built with.
        map.insert("amount".into(), Value::from(self.amount));
        map.insert("currency".into(), Value::from(self.currency.as_str()));
        map.insert("last4".into(), Value::from(self.last4.as_str()));
        map.insert("order_id".into(), Value::from(self.order_id.to_string()));
        map.insert("provider".into(), Value::from(self.provider.as_str()));
        map.insert("psp_reference".into(), Value::from(self.psp_reference.as_str()));
        map.insert("status".into(), Value::from(self.status.as_str()));
        map.insert(
            "timestamp".into(),
            Value::from(self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        Value::Object(map)
    }

    /// Compact JSON with sorted keys. These are the exact bytes that are signed.
    pub fn canonical_json(&self) -> String {
        self.to_value().to_string()
    }
}

/// Message carried on the reconciliation queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementMessage {
    pub receipt: Value,
    pub signature: String,
}

impl SettlementMessage {
    pub fn new(receipt: &Receipt, signature: impl Into<String>) -> Self {
        Self {
            receipt: receipt.to_value(),
            signature: signature.into(),
        }
    }

    /// Parses a delivery body. Missing receipt or signature is malformed.
    pub fn parse(body: &[u8]) -> Result<Self, ReconciliationError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ReconciliationError::MalformedReconciliationMessage(e.to_string()))?;

        let Value::Object(mut fields) = value else {
            return Err(ReconciliationError::MalformedReconciliationMessage(
                "message is not a JSON object".into(),
            ));
        };

        let receipt = match fields.remove("receipt") {
            Some(Value::Null) | None => {
                return Err(ReconciliationError::MalformedReconciliationMessage(
                    "missing receipt".into(),
                ));
            }
            Some(receipt) => receipt,
        };

        let signature = match fields.remove("signature") {
            Some(Value::String(sig)) if !sig.is_empty() => sig,
            _ => {
                return Err(ReconciliationError::MalformedReconciliationMessage(
                    "missing signature".into(),
                ));
            }
        };

        Ok(Self { receipt, signature })
    }

    /// Builds the settlement row for this message.
    pub fn into_record(self) -> ReceiptRecord {
        let text_field = |name: &str| {
            self.receipt
                .get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let order_id = text_field("order_id");
        let psp_reference = text_field("psp_reference");
        let status = text_field("status");
        let now = Utc::now();

        ReceiptRecord {
            id: Uuid::new_v4(),
            order_id,
            psp_reference,
            signature: self.signature,
            payload: self.receipt,
            status,
            created_at: now,
            processed_at: now,
        }
    }
}

/// Durable settlement artifact. `signature` is the idempotency key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptRecord {
    pub id: Uuid,
    pub order_id: Option<String>,
    pub psp_reference: Option<String>,
    pub signature: String,
    pub payload: Value,
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: DateTime<Utc>,
}

/// Result of storing a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptInsertOutcome {
    Stored,
    /// A record with the same signature already exists.
    Duplicate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn receipt() -> Receipt {
        Receipt {
            order_id: "6f1c7c1e-3a4b-4f3e-9d7a-0b1e2c3d4e5f".parse().unwrap(),
            amount: 500_000,
            currency: CurrencyCode::default(),
            timestamp: Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(),
            status: PaymentStatus::Success,
            provider: "mock".into(),
            psp_reference: "pi_mock_0011223344556677".into(),
            last4: "4242".into(),
        }
    }

    #[test]
    fn test_canonical_json_is_sorted_and_compact() {
        let canonical = receipt().canonical_json();
        assert_eq!(
            canonical,
            concat!(
                r#"{"amount":500000,"currency":"VND","last4":"4242","#,
                r#""order_id":"6f1c7c1e-3a4b-4f3e-9d7a-0b1e2c3d4e5f","provider":"mock","#,
                r#""psp_reference":"pi_mock_0011223344556677","status":"SUCCESS","#,
                r#""timestamp":"2025-01-02T03:04:05.000000Z"}"#
            )
        );
    }

    #[test]
    fn test_parse_rejects_missing_signature() {
        let body = json!({"receipt": {"order_id": "o1"}}).to_string();
        assert!(matches!(
            SettlementMessage::parse(body.as_bytes()),
            Err(ReconciliationError::MalformedReconciliationMessage(_))
        ));
    }

    #[test]
    fn test_parse_rejects_missing_receipt_and_garbage() {
        let body = json!({"signature": "abc"}).to_string();
        assert!(SettlementMessage::parse(body.as_bytes()).is_err());
        assert!(SettlementMessage::parse(b"not json").is_err());
        assert!(SettlementMessage::parse(b"[1,2]").is_err());
    }

    #[test]
    fn test_record_takes_fields_from_receipt() {
        let message = SettlementMessage::new(&receipt(), "c2lnbmF0dXJl");
        let record = message.into_record();
        assert_eq!(
            record.order_id.as_deref(),
            Some("6f1c7c1e-3a4b-4f3e-9d7a-0b1e2c3d4e5f")
        );
        assert_eq!(record.psp_reference.as_deref(), Some("pi_mock_0011223344556677"));
        assert_eq!(record.status.as_deref(), Some("SUCCESS"));
        assert_eq!(record.signature, "c2lnbmF0dXJl");
    }

    #[test]
    fn test_record_order_id_null_when_empty() {
        let body = json!({"receipt": {"order_id": ""}, "signature": "s"}).to_string();
        let record = SettlementMessage::parse(body.as_bytes()).unwrap().into_record();
        assert_eq!(record.order_id, None);
        assert_eq!(record.status, None);
    }
}
