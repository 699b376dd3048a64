//! Repository port traits.
//!
//! Adapters (Postgres, SQLite, in-memory fakes) implement these.

use crate::domain::{
    PaymentIntent, ReceiptInsertOutcome, ReceiptRecord, TokenFingerprint, UsedToken,
};
use crate::error::RepoError;

/// Payment store: payment intents and the used-token ledger.
#[async_trait::async_trait]
pub trait PaymentRepository: Send + Sync + 'static {
    /// Advisory replay check. Racy by nature; `record_payment` is authoritative.
    async fn is_token_used(&self, fingerprint: &TokenFingerprint) -> Result<bool, RepoError>;

    /// Persists the intent and its used token in ONE transaction.
    ///
    /// Returns `RepoError::Conflict` and writes nothing when the token
    /// fingerprint is already in the ledger.
    async fn record_payment(
        &self,
        intent: &PaymentIntent,
        used_token: &UsedToken,
    ) -> Result<(), RepoError>;
}

/// Settlement store owned by the reconciliation worker.
#[async_trait::async_trait]
pub trait ReceiptRepository: Send + Sync + 'static {
    /// Inserts a record keyed by its signature. A second insert with the same
    /// signature is reported as `Duplicate`, not as an error.
    async fn store_receipt(&self, record: &ReceiptRecord)
    -> Result<ReceiptInsertOutcome, RepoError>;
}
