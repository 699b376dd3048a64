//! Order service client.

use async_trait::async_trait;
use serde_json::json;

use payments_types::{CallerIdentity, GatewayError, OrderGateway, OrderId, OrderSnapshot, OrderStatus};

use super::{CALLER_HEADER, decode_json, ensure_success, transport_error};

const SERVICE: &str = "order service";

/// `OrderGateway` over the order service's REST API.
#[derive(Clone)]
pub struct HttpOrderGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOrderGateway {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn order_url(&self, order_id: OrderId) -> String {
        format!("{}/orders/{}", self.base_url, order_id)
    }
}

#[async_trait]
impl OrderGateway for HttpOrderGateway {
    #[tracing::instrument(skip(self, caller), fields(order_id = %order_id))]
    async fn fetch_order(
        &self,
        order_id: OrderId,
        caller: &CallerIdentity,
    ) -> Result<OrderSnapshot, GatewayError> {
        let response = self
            .client
            .get(self.order_url(order_id))
            .header(CALLER_HEADER, caller.as_str())
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        let response = ensure_success(SERVICE, response)?;
        decode_json(SERVICE, response).await
    }

    #[tracing::instrument(skip(self, caller), fields(order_id = %order_id, status = %status))]
    async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        caller: &CallerIdentity,
    ) -> Result<(), GatewayError> {
        let response = self
            .client
            .put(format!("{}/status", self.order_url(order_id)))
            .header(CALLER_HEADER, caller.as_str())
            .json(&json!({ "status": status }))
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        ensure_success(SERVICE, response)?;
        Ok(())
    }
}
