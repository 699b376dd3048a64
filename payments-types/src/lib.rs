//! # Payments Types
//!
//! Domain types and port traits for the payment orchestration service.
//! This crate has ZERO external IO dependencies - only data structures,
//! business rules, and trait definitions.
//!
//! ## Architecture
//!
//! This crate represents the **innermost core** of the hexagonal architecture:
//! - `domain/` - Pure domain types (PaymentIntent, UsedToken, Receipt, CardNumber)
//! - `ports/` - Trait definitions that adapters must implement
//! - `dto/` - Data Transfer Objects for API boundaries
//! - `error/` - Domain and application error types

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;

// Re-export commonly used types
pub use domain::{
    CallerIdentity, CardBrand, CardExpiry, CardNumber, CurrencyCode, Cvc, Money, OrchestrationState,
    OrderId, OrderSnapshot, OrderStatus, PaymentIntent, PaymentIntentId, PaymentStatus,
    PaymentToken, Receipt, ReceiptInsertOutcome, ReceiptRecord, SettlementMessage,
    TOKEN_PREFIX, TokenFingerprint, UsedToken,
};
pub use dto::*;
pub use error::{
    AppError, CryptoError, DomainError, GatewayError, PaymentError, QueueError,
    ReconciliationError, RepoError,
};
pub use ports::{
    ChargeCommand, CryptoProvider, FraudDecision, FraudGateway, FraudRequest, InboundMessage,
    MessageSource, OrderGateway, PaymentRepository, PspAdapter, PspCharge, ReceiptPublisher,
    ReceiptRepository, Subscription,
};
