//! Card processors.
//!
//! Exactly one implementation is wired at startup, chosen by configuration.

use async_trait::async_trait;
use rand::RngCore;
use serde::Deserialize;

use payments_types::{ChargeCommand, GatewayError, PspAdapter, PspCharge};

use super::{decode_json, ensure_success, transport_error};

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock
// ─────────────────────────────────────────────────────────────────────────────

/// Always succeeds. For local stacks and tests.
#[derive(Debug, Clone, Default)]
pub struct MockPsp;

#[async_trait]
impl PspAdapter for MockPsp {
    fn provider(&self) -> &'static str {
        "mock"
    }

    async fn charge(&self, command: &ChargeCommand) -> Result<PspCharge, GatewayError> {
        Ok(PspCharge {
            id: format!("pi_mock_{}", random_hex(8)),
            status: "succeeded".into(),
            amount: command.money.amount(),
            currency: command.money.currency().as_str().to_string(),
            last4: command.card.last4().to_string(),
            receipt: Some(format!("rcpt_{}", random_hex(4))),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stripe
// ─────────────────────────────────────────────────────────────────────────────

const STRIPE: &str = "stripe";

#[derive(Debug, Deserialize)]
struct StripePaymentMethod {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripeIntent {
    id: String,
    status: String,
    amount: i64,
    currency: String,
    #[serde(default)]
    latest_charge: Option<StripeCharge>,
}

#[derive(Debug, Deserialize)]
struct StripeCharge {
    #[serde(default)]
    receipt_number: Option<String>,
    #[serde(default)]
    payment_method_details: Option<StripeMethodDetails>,
}

#[derive(Debug, Deserialize)]
struct StripeMethodDetails {
    #[serde(default)]
    card: Option<StripeCard>,
}

#[derive(Debug, Deserialize)]
struct StripeCard {
    last4: String,
}

impl StripeIntent {
    fn into_charge(self) -> PspCharge {
        let last4 = self
            .latest_charge
            .as_ref()
            .and_then(|c| c.payment_method_details.as_ref())
            .and_then(|d| d.card.as_ref())
            .map(|card| card.last4.clone())
            .unwrap_or_else(|| "****".to_string());
        let receipt = self.latest_charge.and_then(|c| c.receipt_number);
        PspCharge {
            id: self.id,
            status: self.status,
            amount: self.amount,
            currency: self.currency.to_uppercase(),
            last4,
            receipt,
        }
    }
}

/// Stripe REST API: create a card PaymentMethod, then create and confirm a
/// PaymentIntent with it.
#[derive(Clone)]
pub struct StripePsp {
    client: reqwest::Client,
    api_url: String,
    secret_key: String,
}

impl StripePsp {
    pub fn new(
        client: reqwest::Client,
        api_url: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        }
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        let response = self
            .client
            .post(format!("{}{}", self.api_url, path))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await
            .map_err(|e| transport_error(STRIPE, e))?;
        let response = ensure_success(STRIPE, response)?;
        decode_json(STRIPE, response).await
    }
}

impl std::fmt::Debug for StripePsp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripePsp")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PspAdapter for StripePsp {
    fn provider(&self) -> &'static str {
        STRIPE
    }

    #[tracing::instrument(skip(self, command), fields(last4 = command.card.last4(), amount = command.money.amount()))]
    async fn charge(&self, command: &ChargeCommand) -> Result<PspCharge, GatewayError> {
        let mut card = vec![
            ("type", "card".to_string()),
            ("card[number]", command.card.expose().to_string()),
        ];
        if let Some(expiry) = command.expiry {
            card.push(("card[exp_month]", expiry.month().to_string()));
            card.push(("card[exp_year]", expiry.year().to_string()));
        }
        if let Some(cvc) = &command.cvc {
            card.push(("card[cvc]", cvc.expose().to_string()));
        }
        let method: StripePaymentMethod = self.post_form("/v1/payment_methods", &card).await?;

        let intent_form = [
            ("amount", command.money.amount().to_string()),
            ("currency", command.money.currency().as_str().to_lowercase()),
            ("payment_method", method.id),
            ("confirm", "true".to_string()),
            ("expand[]", "latest_charge".to_string()),
        ];
        let intent: StripeIntent = self.post_form("/v1/payment_intents", &intent_form).await?;

        tracing::info!(psp_reference = %intent.id, status = %intent.status, "stripe intent confirmed");
        Ok(intent.into_charge())
    }
}
