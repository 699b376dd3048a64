//! Payment service provider port.

use serde::{Deserialize, Serialize};

use crate::domain::{CardExpiry, CardNumber, Cvc, Money};
use crate::error::GatewayError;

/// A single card charge. `Debug` output is safe to log.
#[derive(Debug, Clone)]
pub struct ChargeCommand {
    pub card: CardNumber,
    pub money: Money,
    pub expiry: Option<CardExpiry>,
    pub cvc: Option<Cvc>,
}

/// What the provider reported for a charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PspCharge {
    pub id: String,
    pub status: String,
    pub amount: i64,
    pub currency: String,
    pub last4: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt: Option<String>,
}

impl PspCharge {
    pub fn is_succeeded(&self) -> bool {
        self.status == "succeeded"
    }
}

/// A card processor. Implementations are chosen once at startup.
///
/// Charges are never retried by callers of this trait.
#[async_trait::async_trait]
pub trait PspAdapter: Send + Sync + 'static {
    /// Provider name recorded on receipts (`mock`, `stripe`).
    fn provider(&self) -> &'static str;

    async fn charge(&self, command: &ChargeCommand) -> Result<PspCharge, GatewayError>;
}
