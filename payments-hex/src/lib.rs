//! # Payments Hex
//!
//! Application layer and adapters for the payments service.
//!
//! ## Architecture
//!
//! - `service` - Payment orchestration (the transaction state machine)
//! - `reconciliation` - Settlement queue consumer
//! - `inbound/` - HTTP adapter (Axum server)
//! - `outbound/` - Order service, fraud engine, PSP and AMQP adapters
//!
//! The service is generic over `R: PaymentRepository` and the worker over
//! `S: ReceiptRepository`, allowing different stores to be injected.

pub mod inbound;
pub mod openapi;
pub mod outbound;
pub mod reconciliation;
pub mod service;


pub use reconciliation::ReconciliationWorker;
pub use service::PaymentService;
