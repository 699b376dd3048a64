//! Domain models for the payment service.

pub mod caller;
pub mod card;
pub mod money;
pub mod orchestration;
pub mod order;
pub mod payment;
pub mod receipt;
pub mod token;

pub use caller::CallerIdentity;
pub use card::{CardBrand, CardExpiry, CardNumber, Cvc};
pub use money::{CurrencyCode, Money};
pub use orchestration::OrchestrationState;
pub use order::{OrderId, OrderSnapshot, OrderStatus};
pub use payment::{PaymentIntent, PaymentIntentId, PaymentStatus, UsedToken};
pub use receipt::{Receipt, ReceiptInsertOutcome, ReceiptRecord, SettlementMessage};
pub use token::{PaymentToken, TOKEN_PREFIX, TokenFingerprint};
