//! Fraud engine client.

use async_trait::async_trait;

use payments_types::{FraudDecision, FraudGateway, FraudRequest, GatewayError};

use super::{decode_json, ensure_success, transport_error};

const SERVICE: &str = "fraud engine";

#[derive(Clone)]
pub struct HttpFraudGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFraudGateway {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl FraudGateway for HttpFraudGateway {
    #[tracing::instrument(skip(self), fields(amount = request.amount))]
    async fn score(&self, request: &FraudRequest) -> Result<FraudDecision, GatewayError> {
        let response = self
            .client
            .post(format!("{}/score", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        let response = ensure_success(SERVICE, response)?;
        let decision: FraudDecision = decode_json(SERVICE, response).await?;
        tracing::info!(
            action = %decision.action,
            score = decision.score,
            "fraud decision received"
        );
        Ok(decision)
    }
}
