//! Port traits (interfaces for adapters).
//!
//! These are the contracts that adapters must implement.
//! The application layer depends on these traits, not concrete implementations.

mod crypto;
mod gateway;
mod psp;
mod queue;
mod repository;

pub use crypto::CryptoProvider;
pub use gateway::{FraudDecision, FraudGateway, FraudRequest, OrderGateway};
pub use psp::{ChargeCommand, PspAdapter, PspCharge};
pub use queue::{InboundMessage, MessageSource, ReceiptPublisher, Subscription};
pub use repository::{PaymentRepository, ReceiptRepository};
