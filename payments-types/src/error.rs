//! Error types for the payment service.

use crate::domain::{OrchestrationState, OrderId};

/// Domain-level errors (business rule and input validation violations).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(i64),

    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),

    #[error("Card number must be 12 to 19 digits")]
    InvalidCardNumber,

    #[error("Invalid card expiry: {0}")]
    InvalidExpiry(String),

    #[error("Card verification code must be 3 or 4 digits")]
    InvalidCvc,

    #[error("Caller identity is required")]
    MissingCallerIdentity,

    #[error("Illegal orchestration transition: {from} -> {to}")]
    IllegalTransition {
        from: OrchestrationState,
        to: OrchestrationState,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Repository-level errors (data access failures).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Errors raised by the crypto/HSM service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("Key unavailable: {0}")]
    KeyUnavailable(String),

    #[error("HSM transport error: {0}")]
    HsmTransport(String),

    #[error("Unsupported token format")]
    UnsupportedTokenFormat,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

/// Failures talking to a network collaborator (order service, fraud engine, PSP).
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{service}: resource not found")]
    NotFound { service: &'static str },

    #[error("{service}: access forbidden")]
    Forbidden { service: &'static str },

    #[error("{service}: request timed out")]
    Timeout { service: &'static str },

    #[error("{service}: upstream responded with HTTP {status}")]
    Upstream { service: &'static str, status: u16 },

    #[error("{service}: transport error: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },

    #[error("{service}: malformed response: {message}")]
    Malformed {
        service: &'static str,
        message: String,
    },
}

impl GatewayError {
    /// Name of the collaborator that failed.
    pub fn service(&self) -> &'static str {
        match self {
            GatewayError::NotFound { service }
            | GatewayError::Forbidden { service }
            | GatewayError::Timeout { service }
            | GatewayError::Upstream { service, .. }
            | GatewayError::Transport { service, .. }
            | GatewayError::Malformed { service, .. } => service,
        }
    }
}

/// Message broker failures.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Broker connection error: {0}")]
    Connection(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Consume failed: {0}")]
    Consume(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Outcome taxonomy of a payment orchestration.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Order is not payable: {0}")]
    InvalidOrder(String),

    #[error("Transaction blocked by fraud engine (score {score})")]
    FraudBlocked { score: i64 },

    #[error("Payment token already used")]
    TokenAlreadyUsed,

    #[error("Invalid payment token")]
    InvalidPaymentToken,

    #[error("PSP charge failed: {0}")]
    UpstreamChargeFailed(String),

    #[error("{service} unavailable: {reason}")]
    UpstreamUnavailable {
        service: &'static str,
        reason: String,
    },

    #[error(transparent)]
    Validation(#[from] DomainError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

/// Reconciliation worker failures. Neither variant stops the consumer loop.
#[derive(Debug, thiserror::Error)]
pub enum ReconciliationError {
    #[error("Malformed reconciliation message: {0}")]
    MalformedReconciliationMessage(String),

    #[error("Transient persistence error: {0}")]
    TransientPersistenceError(String),
}

/// Application-level errors (for HTTP responses).
///
/// Maps cleanly to HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad gateway: {0}")]
    BadGateway(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Domain(e) => AppError::BadRequest(e.to_string()),
            RepoError::NotFound => AppError::NotFound("Resource not found".into()),
            RepoError::Database(e) => AppError::Internal(e),
            RepoError::Transaction(e) => AppError::Internal(e),
            RepoError::Conflict(e) => AppError::Conflict(e),
        }
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::MissingCallerIdentity => AppError::Unauthorized(err.to_string()),
            DomainError::IllegalTransition { .. } => AppError::Internal(err.to_string()),
            e => AppError::BadRequest(e.to_string()),
        }
    }
}

impl From<CryptoError> for AppError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::UnsupportedTokenFormat => {
                AppError::BadRequest("unsupported token format".into())
            }
            CryptoError::InvalidToken(_) => AppError::BadRequest("invalid token".into()),
            CryptoError::KeyUnavailable(e) | CryptoError::HsmTransport(e) => AppError::Internal(e),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::OrderNotFound(_) => AppError::NotFound("order not found".into()),
            PaymentError::InvalidOrder(msg) => AppError::BadRequest(msg),
            PaymentError::FraudBlocked { .. } => {
                AppError::Forbidden("transaction blocked by fraud engine".into())
            }
            PaymentError::TokenAlreadyUsed => {
                AppError::Conflict("payment token already used".into())
            }
            PaymentError::InvalidPaymentToken => {
                AppError::BadRequest("invalid payment token".into())
            }
            PaymentError::UpstreamChargeFailed(_) => AppError::BadGateway("psp charge failed".into()),
            PaymentError::UpstreamUnavailable { service, .. } => {
                AppError::BadGateway(format!("{} unavailable", service))
            }
            PaymentError::Validation(e) => e.into(),
            PaymentError::Crypto(e) => e.into(),
            PaymentError::Persistence(e) => AppError::Internal(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_errors_map_to_distinct_statuses() {
        assert!(matches!(
            AppError::from(PaymentError::FraudBlocked { score: 95 }),
            AppError::Forbidden(_)
        ));
        assert!(matches!(
            AppError::from(PaymentError::TokenAlreadyUsed),
            AppError::Conflict(_)
        ));
        assert!(matches!(
            AppError::from(PaymentError::InvalidPaymentToken),
            AppError::BadRequest(_)
        ));
        assert!(matches!(
            AppError::from(PaymentError::UpstreamChargeFailed("declined".into())),
            AppError::BadGateway(_)
        ));
    }

    #[test]
    fn test_hsm_faults_are_internal() {
        let err = AppError::from(PaymentError::Crypto(CryptoError::HsmTransport(
            "CKR_DEVICE_ERROR".into(),
        )));
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn test_upstream_body_not_leaked() {
        let err = AppError::from(PaymentError::UpstreamChargeFailed(
            "card_declined: insufficient funds on pi_123".into(),
        ));
        assert_eq!(err.to_string(), "Bad gateway: psp charge failed");
    }
}
