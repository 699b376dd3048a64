//! Order service and fraud engine ports.

use serde::{Deserialize, Serialize};

use crate::domain::{CallerIdentity, OrderId, OrderSnapshot, OrderStatus};
use crate::error::GatewayError;

#[async_trait::async_trait]
pub trait OrderGateway: Send + Sync + 'static {
    /// Fetches an order on behalf of `caller`. The order service enforces
    /// ownership and answers 404/403 otherwise.
    async fn fetch_order(
        &self,
        order_id: OrderId,
        caller: &CallerIdentity,
    ) -> Result<OrderSnapshot, GatewayError>;

    async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        caller: &CallerIdentity,
    ) -> Result<(), GatewayError>;
}

/// Body of a fraud scoring request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudRequest {
    pub amount: i64,
    pub user_ip: Option<String>,
    pub device_id: String,
}

impl FraudRequest {
    pub fn new(amount: i64, caller: &CallerIdentity) -> Self {
        Self {
            amount,
            user_ip: None,
            device_id: caller.as_str().to_string(),
        }
    }
}

/// Fraud engine verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudDecision {
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub action: String,
}

impl FraudDecision {
    /// Only an explicit `BLOCK` stops a payment (case-insensitive).
    pub fn is_blocked(&self) -> bool {
        self.action.eq_ignore_ascii_case("BLOCK")
    }
}

#[async_trait::async_trait]
pub trait FraudGateway: Send + Sync + 'static {
    async fn score(&self, request: &FraudRequest) -> Result<FraudDecision, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraud_request_shape() {
        let caller = CallerIdentity::new("user-7").unwrap();
        let body = serde_json::to_value(FraudRequest::new(500_000, &caller)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"amount": 500000, "user_ip": null, "device_id": "user-7"})
        );
    }

    #[test]
    fn test_only_block_blocks() {
        let decision = |action: &str| FraudDecision {
            score: 10,
            action: action.into(),
        };
        assert!(decision("BLOCK").is_blocked());
        assert!(decision("block").is_blocked());
        assert!(!decision("ALLOW").is_blocked());
        assert!(!decision("REVIEW").is_blocked());
        assert!(!decision("").is_blocked());
    }
}
