//! # Payments Client SDK
//!
//! A typed Rust client for the Payment API.

use payments_types::{
    ChargeRequest, ChargeResponse, CreatePaymentRequest, HealthResponse, OrderId,
    PaymentResponse, PublicKeyResponse, SignRequest, SignResponse, TokenizeRequest,
    TokenizeResponse,
};
use reqwest::Client;
use serde::de::DeserializeOwned;

/// Header carrying the caller identity.
const CALLER_HEADER: &str = "x-user-id";

/// Error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Payment API client.
pub struct PaymentsClient {
    base_url: String,
    caller: Option<String>,
    http: Client,
}

impl PaymentsClient {
    /// Creates a new client.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            caller: None,
            http: Client::new(),
        }
    }

    /// Sets the caller identity sent as `x-user-id`.
    pub fn with_caller(mut self, caller: impl Into<String>) -> Self {
        self.caller = Some(caller.into());
        self
    }

    /// Health probe; needs no caller identity.
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        self.get("/health").await
    }

    /// Encrypts a card into a payment token.
    pub async fn tokenize(&self, req: &TokenizeRequest) -> Result<TokenizeResponse, ClientError> {
        self.post("/payment/tokenize", req).await
    }

    /// Charges a tokenized card directly, without an order.
    pub async fn charge(&self, req: &ChargeRequest) -> Result<ChargeResponse, ClientError> {
        self.post("/payment/charge", req).await
    }

    /// Pays an order with a payment token.
    pub async fn pay(
        &self,
        order_id: OrderId,
        payment_token: &str,
    ) -> Result<PaymentResponse, ClientError> {
        let req = CreatePaymentRequest {
            order_id,
            payment_token: payment_token.to_string(),
        };
        self.post("/payments", &req).await
    }

    /// Signs a message with the service signing key.
    pub async fn sign(&self, message: &str) -> Result<SignResponse, ClientError> {
        let req = SignRequest {
            message: message.to_string(),
        };
        self.post("/sign", &req).await
    }

    /// Public half of the signing key (base64 DER).
    pub async fn public_key(&self) -> Result<PublicKeyResponse, ClientError> {
        self.get("/public-key").await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let mut req = self.http.get(format!("{}{}", self.base_url, path));
        if let Some(caller) = &self.caller {
            req = req.header(CALLER_HEADER, caller);
        }
        let resp = req.send().await?;
        self.handle_response(resp).await
    }

    async fn post<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let mut req = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body);
        if let Some(caller) = &self.caller {
            req = req.header(CALLER_HEADER, caller);
        }
        let resp = req.send().await?;
        self.handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            Ok(serde_json::from_str(&body)?)
        } else {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
                .unwrap_or(body);
            Err(ClientError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}
