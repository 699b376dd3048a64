//! # Payments Application
//!
//! Process wiring for the two binaries:
//! - `payments-server` - Payment API (tokenize, charge, orchestrated payments, signing)
//! - `reconciliation-worker` - settlement queue consumer
//!
//! Both load configuration from the environment, install telemetry and
//! shut down gracefully on Ctrl+C / SIGTERM.

pub mod config;
pub mod crypto;
pub mod telemetry;
