//! SQLite row types for reading payments back in tests.
//!
//! SQLite stores ids, timestamps and JSON as TEXT, so each row is parsed
//! into its domain type here.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use payments_types::{
    CurrencyCode, OrderId, PaymentIntent, PaymentIntentId, PaymentStatus, ReceiptRecord, RepoError,
};

#[derive(FromRow)]
pub struct DbPaymentIntent {
    pub id: String,
    pub order_id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub signed_receipt: Option<String>,
    pub receipt_payload: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(FromRow)]
pub struct DbReceiptRecord {
    pub id: String,
    pub order_id: Option<String>,
    pub psp_reference: Option<String>,
    pub signature: String,
    pub payload: String,
    pub status: Option<String>,
    pub created_at: String,
    pub processed_at: String,
}

fn corrupt(e: impl std::fmt::Display) -> RepoError {
    RepoError::Database(e.to_string())
}

fn parse_uuid(s: &str) -> Result<Uuid, RepoError> {
    Uuid::parse_str(s).map_err(corrupt)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, RepoError> {
    Ok(DateTime::parse_from_rfc3339(s)
        .map_err(corrupt)?
        .with_timezone(&Utc))
}

fn parse_json(s: &str) -> Result<serde_json::Value, RepoError> {
    serde_json::from_str(s).map_err(corrupt)
}

impl DbPaymentIntent {
    pub fn into_domain(self) -> Result<PaymentIntent, RepoError> {
        PaymentIntent::from_parts(
            PaymentIntentId::from_uuid(parse_uuid(&self.id)?),
            OrderId::from_uuid(parse_uuid(&self.order_id)?),
            self.amount,
            CurrencyCode::parse(&self.currency).map_err(corrupt)?,
            self.status.parse::<PaymentStatus>().map_err(corrupt)?,
            self.signed_receipt,
            parse_json(&self.receipt_payload)?,
            parse_timestamp(&self.created_at)?,
            parse_timestamp(&self.updated_at)?,
        )
        .map_err(RepoError::Domain)
    }
}

impl DbReceiptRecord {
    pub fn into_domain(self) -> Result<ReceiptRecord, RepoError> {
        Ok(ReceiptRecord {
            id: parse_uuid(&self.id)?,
            order_id: self.order_id,
            psp_reference: self.psp_reference,
            signature: self.signature,
            payload: parse_json(&self.payload)?,
            status: self.status,
            created_at: parse_timestamp(&self.created_at)?,
            processed_at: parse_timestamp(&self.processed_at)?,
        })
    }
}
