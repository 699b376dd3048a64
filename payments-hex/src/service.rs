//! Payment Application Service
//!
//! Orchestrates the payment pipeline through the ports: order service, fraud
//! engine, crypto service, card processor, payment store and reconciliation
//! queue. Contains NO infrastructure logic.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;

use payments_repo::security::fingerprint_token;
use payments_types::{
    CallerIdentity, CardExpiry, CardNumber, ChargeCommand, ChargeRequest, ChargeResponse,
    CryptoError, CryptoProvider, CurrencyCode, Cvc, DomainError, FraudGateway, FraudRequest,
    GatewayError, Money, OrchestrationState, OrderGateway, OrderId, OrderStatus, PaymentError,
    PaymentIntent, PaymentRepository, PaymentResponse, PaymentStatus, PspAdapter,
    PublicKeyResponse, QueueError, Receipt, ReceiptPublisher, RepoError, SettlementMessage,
    SignResponse, TokenizeRequest, TokenizeResponse, UsedToken,
};

/// Upper bound on handing a receipt to the reconciliation queue.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-request position in the orchestration state machine.
struct Tracker {
    order_id: OrderId,
    state: OrchestrationState,
}

impl Tracker {
    fn start(order_id: OrderId) -> Self {
        tracing::debug!(order_id = %order_id, state = %OrchestrationState::Started, "orchestration started");
        Self {
            order_id,
            state: OrchestrationState::Started,
        }
    }

    fn advance(&mut self, next: OrchestrationState) -> Result<(), PaymentError> {
        if !self.state.can_transition_to(next) {
            return Err(DomainError::IllegalTransition {
                from: self.state,
                to: next,
            }
            .into());
        }
        tracing::info!(
            order_id = %self.order_id,
            from = %self.state,
            to = %next,
            "orchestration state transition"
        );
        self.state = next;
        Ok(())
    }
}

/// Application service for payment operations.
///
/// Generic over `R: PaymentRepository`; the network collaborators are
/// injected as trait objects chosen once at startup.
pub struct PaymentService<R: PaymentRepository> {
    repo: R,
    crypto: Arc<dyn CryptoProvider>,
    orders: Arc<dyn OrderGateway>,
    fraud: Arc<dyn FraudGateway>,
    psp: Arc<dyn PspAdapter>,
    publisher: Arc<dyn ReceiptPublisher>,
    publish_timeout: Duration,
}

impl<R: PaymentRepository> PaymentService<R> {
    pub fn new(
        repo: R,
        crypto: Arc<dyn CryptoProvider>,
        orders: Arc<dyn OrderGateway>,
        fraud: Arc<dyn FraudGateway>,
        psp: Arc<dyn PspAdapter>,
        publisher: Arc<dyn ReceiptPublisher>,
    ) -> Self {
        Self {
            repo,
            crypto,
            orders,
            fraud,
            psp,
            publisher,
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }

    /// Bounds step 9. A publish that does not finish in time counts as a
    /// failed publish.
    pub fn with_publish_timeout(mut self, publish_timeout: Duration) -> Self {
        self.publish_timeout = publish_timeout;
        self
    }

    /// Returns a reference to the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Name of the configured card processor.
    pub fn provider(&self) -> &'static str {
        self.psp.provider()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Crypto Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Encrypts a card number into an opaque token. Card data is never stored.
    #[tracing::instrument(skip(self, req), fields(owner = %caller))]
    pub async fn tokenize(
        &self,
        req: TokenizeRequest,
        caller: &CallerIdentity,
    ) -> Result<TokenizeResponse, PaymentError> {
        let card = CardNumber::parse(&req.pan)?;
        let expiry = CardExpiry::new(req.exp_month, req.exp_year)?;
        Cvc::parse(&req.cvc)?;

        tracing::info!(brand = %card.brand(), last4 = card.last4(), "tokenizing card");
        let token = self.crypto.encrypt_token(card.expose().as_bytes()).await?;

        Ok(TokenizeResponse {
            token: token.expose().to_string(),
            brand: card.brand(),
            last4: card.last4().to_string(),
            exp_month: expiry.month(),
            exp_year: expiry.year(),
            mask: card.masked(),
            owner: caller.to_string(),
        })
    }

    /// Charges a tokenized card directly, without an order.
    #[tracing::instrument(skip(self, req), fields(owner = %caller, amount = req.amount))]
    pub async fn charge(
        &self,
        req: ChargeRequest,
        caller: &CallerIdentity,
    ) -> Result<ChargeResponse, PaymentError> {
        let currency = match req.currency.as_deref() {
            Some(code) => CurrencyCode::parse(code)?,
            None => CurrencyCode::default(),
        };
        let money = Money::new(req.amount, currency)?;
        let expiry = match (req.exp_month, req.exp_year) {
            (Some(month), Some(year)) => Some(CardExpiry::new(month, year)?),
            _ => None,
        };
        let cvc = req.cvc.as_deref().map(Cvc::parse).transpose()?;

        let plaintext = self.crypto.decrypt_token(&req.token).await?;
        let card = card_from_plaintext(plaintext)?;

        let command = ChargeCommand {
            card,
            money,
            expiry,
            cvc,
        };
        let result = self
            .psp
            .charge(&command)
            .await
            .map_err(|e| PaymentError::UpstreamChargeFailed(e.to_string()))?;
        tracing::info!(psp_reference = %result.id, status = %result.status, "psp charge returned");

        Ok(ChargeResponse {
            id: result.id,
            status: result.status,
            amount: result.amount,
            currency: result.currency,
            last4: result.last4,
            receipt: result.receipt,
            provider: self.psp.provider().to_string(),
            owner: caller.to_string(),
        })
    }

    /// Signs a UTF-8 message; the signature is returned base64 encoded.
    #[tracing::instrument(skip(self, message), fields(len = message.len()))]
    pub async fn sign(&self, message: &str) -> Result<SignResponse, PaymentError> {
        let signature = self.crypto.sign(message.as_bytes()).await?;
        Ok(SignResponse {
            signature: STANDARD.encode(signature),
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn public_key(&self) -> Result<PublicKeyResponse, PaymentError> {
        let der = self.crypto.export_public_key().await?;
        Ok(PublicKeyResponse {
            public_key: STANDARD.encode(der),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Orchestration
    // ─────────────────────────────────────────────────────────────────────────────

    /// Pays an order with a previously issued payment token.
    ///
    /// Once the order has been fetched, every failure before persistence marks
    /// the order FAILED (best effort) and leaves no payment rows behind.
    #[tracing::instrument(skip(self, payment_token), fields(order_id = %order_id, owner = %caller))]
    pub async fn orchestrate_payment(
        &self,
        order_id: OrderId,
        payment_token: &str,
        caller: &CallerIdentity,
    ) -> Result<PaymentResponse, PaymentError> {
        let mut tracker = Tracker::start(order_id);

        // Step 1: nothing to compensate if the order cannot be read.
        let order = self
            .orders
            .fetch_order(order_id, caller)
            .await
            .map_err(|e| match e {
                GatewayError::NotFound { .. } | GatewayError::Forbidden { .. } => {
                    PaymentError::OrderNotFound(order_id)
                }
                other => unavailable(other),
            })?;
        let money = order.money()?;
        tracing::info!(amount = money.amount(), currency = %money.currency(), "order loaded");

        let (receipt, signature) = match self
            .charge_and_sign(&mut tracker, &money, payment_token, caller)
            .await
        {
            Ok(signed) => signed,
            Err(err) => {
                tracing::warn!(error = %err, at = %tracker.state, "orchestration failed");
                if tracker.state.can_transition_to(OrchestrationState::Failed) {
                    tracker.advance(OrchestrationState::Failed)?;
                }
                self.mark_order(order_id, OrderStatus::Failed, caller).await;
                return Err(err);
            }
        };

        // Step 8: the payment already happened; a failed update is only logged.
        self.mark_order(order_id, OrderStatus::Completed, caller).await;

        let settlement = SettlementMessage::new(&receipt, &signature);

        // Step 9
        let published = tokio::time::timeout(self.publish_timeout, self.publisher.publish(&settlement))
            .await
            .unwrap_or_else(|_| {
                Err(QueueError::Connection(format!(
                    "no broker answer within {:?}",
                    self.publish_timeout
                )))
            });
        let settlement_queued = match published {
            Ok(()) => {
                tracker.advance(OrchestrationState::SettlementQueued)?;
                true
            }
            Err(e) => {
                tracing::error!(
                    order_id = %order_id,
                    error = %e,
                    reconciliation_gap = true,
                    "receipt persisted but not queued for reconciliation"
                );
                false
            }
        };

        Ok(PaymentResponse {
            status: PaymentStatus::Success,
            signed_receipt: signature,
            receipt: settlement.receipt,
            settlement_queued,
        })
    }

    /// Steps 2 to 7. Returns the receipt and its base64 signature once both
    /// the intent and the used token are durably stored.
    async fn charge_and_sign(
        &self,
        tracker: &mut Tracker,
        money: &Money,
        payment_token: &str,
        caller: &CallerIdentity,
    ) -> Result<(Receipt, String), PaymentError> {
        let order_id = tracker.order_id;

        // Step 2
        let decision = self
            .fraud
            .score(&FraudRequest::new(money.amount(), caller))
            .await
            .map_err(unavailable)?;
        if decision.is_blocked() {
            tracing::warn!(score = decision.score, "transaction blocked by fraud engine");
            return Err(PaymentError::FraudBlocked {
                score: decision.score,
            });
        }
        tracker.advance(OrchestrationState::FraudChecked)?;

        // Step 3: advisory only, record_payment is the real guard.
        let fingerprint = fingerprint_token(payment_token);
        let already_used = self
            .repo
            .is_token_used(&fingerprint)
            .await
            .map_err(|e| PaymentError::Persistence(e.to_string()))?;
        if already_used {
            tracing::warn!(fingerprint = fingerprint.short(), "payment token replayed");
            return Err(PaymentError::TokenAlreadyUsed);
        }

        // Step 4
        let plaintext = self
            .crypto
            .decrypt_token(payment_token)
            .await
            .map_err(|e| match e {
                CryptoError::UnsupportedTokenFormat | CryptoError::InvalidToken(_) => {
                    PaymentError::InvalidPaymentToken
                }
                fault => PaymentError::Crypto(fault),
            })?;
        let card = card_from_plaintext(plaintext)?;
        tracker.advance(OrchestrationState::TokenValidated)?;

        // Step 5: never retried.
        let command = ChargeCommand {
            card,
            money: money.clone(),
            expiry: None,
            cvc: None,
        };
        let charge = self
            .psp
            .charge(&command)
            .await
            .map_err(|e| PaymentError::UpstreamChargeFailed(e.to_string()))?;
        if !charge.is_succeeded() {
            return Err(PaymentError::UpstreamChargeFailed(format!(
                "charge {} ended with status {}",
                charge.id, charge.status
            )));
        }
        tracing::info!(psp_reference = %charge.id, "psp charge succeeded");
        tracker.advance(OrchestrationState::Charged)?;

        // Step 6
        let receipt = Receipt {
            order_id,
            amount: money.amount(),
            currency: money.currency().clone(),
            timestamp: Utc::now(),
            status: PaymentStatus::Success,
            provider: self.psp.provider().to_string(),
            psp_reference: charge.id,
            last4: charge.last4,
        };
        let signature = STANDARD.encode(self.crypto.sign(receipt.canonical_json().as_bytes()).await?);
        tracker.advance(OrchestrationState::ReceiptSigned)?;

        // Step 7
        let intent = PaymentIntent::succeeded(order_id, money, signature.clone(), receipt.to_value());
        let used_token = UsedToken::new(fingerprint, order_id);
        self.repo
            .record_payment(&intent, &used_token)
            .await
            .map_err(|e| match e {
                RepoError::Conflict(_) => PaymentError::TokenAlreadyUsed,
                other => PaymentError::Persistence(other.to_string()),
            })?;
        tracing::info!(payment_intent_id = %intent.id, "payment intent persisted");
        tracker.advance(OrchestrationState::Persisted)?;

        Ok((receipt, signature))
    }

    /// Best-effort order status update. Failures are logged, never returned.
    async fn mark_order(&self, order_id: OrderId, status: OrderStatus, caller: &CallerIdentity) {
        if let Err(e) = self.orders.update_status(order_id, status, caller).await {
            tracing::warn!(order_id = %order_id, status = %status, error = %e, "order status update failed");
        }
    }
}

fn unavailable(err: GatewayError) -> PaymentError {
    PaymentError::UpstreamUnavailable {
        service: err.service(),
        reason: err.to_string(),
    }
}

fn card_from_plaintext(plaintext: Vec<u8>) -> Result<CardNumber, PaymentError> {
    let pan = String::from_utf8(plaintext).map_err(|_| PaymentError::InvalidPaymentToken)?;
    CardNumber::parse(&pan).map_err(|_| PaymentError::InvalidPaymentToken)
}
