//! HTTP-level tests for the payment API.
//!
//! The order service and fraud engine are played by a wiremock server; the
//! keystore is the software one and the PSP is the mock provider.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tokio::sync::OnceCell;
use tower::ServiceExt;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use payments_hex::PaymentService;
use payments_hex::inbound::HttpServer;
use payments_hex::outbound::{HttpFraudGateway, HttpOrderGateway, MockPsp, http_client};
use payments_hsm::{HsmService, KeyLabels, SoftKeystore};
use payments_repo::SqliteRepo;
use payments_types::{CryptoProvider, OrderId, QueueError, ReceiptPublisher, SettlementMessage};

static CRYPTO: OnceCell<HsmService<SoftKeystore>> = OnceCell::const_new();

async fn crypto() -> HsmService<SoftKeystore> {
    CRYPTO
        .get_or_init(|| async {
            let service = HsmService::new(SoftKeystore::new(), KeyLabels::default());
            service.ensure_keys().await.unwrap();
            service
        })
        .await
        .clone()
}

#[derive(Default)]
struct RecordingPublisher {
    messages: Mutex<Vec<SettlementMessage>>,
}

#[async_trait]
impl ReceiptPublisher for RecordingPublisher {
    async fn publish(&self, message: &SettlementMessage) -> Result<(), QueueError> {
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }
}

struct TestApp {
    router: Router,
    collaborators: MockServer,
    publisher: Arc<RecordingPublisher>,
}

async fn test_app(requests_per_minute: u32) -> TestApp {
    let collaborators = MockServer::start().await;
    let client = http_client(Duration::from_secs(5)).unwrap();
    let publisher = Arc::new(RecordingPublisher::default());

    let service = PaymentService::new(
        SqliteRepo::new("sqlite::memory:").await.unwrap(),
        Arc::new(crypto().await),
        Arc::new(HttpOrderGateway::new(client.clone(), collaborators.uri())),
        Arc::new(HttpFraudGateway::new(client, collaborators.uri())),
        Arc::new(MockPsp),
        publisher.clone(),
    );
    let router = HttpServer::with_rate_limit(service, requests_per_minute).router();

    TestApp {
        router,
        collaborators,
        publisher,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    async fn mount_order(&self, order_id: OrderId, amount: i64) {
        Mock::given(method("GET"))
            .and(path(format!("/orders/{}", order_id)))
            .and(header("x-user-id", "user-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": order_id.to_string(),
                "amount": amount,
                "currency": "VND",
                "status": "PENDING",
            })))
            .mount(&self.collaborators)
            .await;
        Mock::given(method("PUT"))
            .and(path(format!("/orders/{}/status", order_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&self.collaborators)
            .await;
    }

    async fn mount_fraud(&self, action: &str, score: i64) {
        Mock::given(method("POST"))
            .and(path("/score"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"score": score, "action": action})),
            )
            .mount(&self.collaborators)
            .await;
    }

    async fn status_updates(&self, order_id: OrderId) -> Vec<Value> {
        let status_path = format!("/orders/{}/status", order_id);
        self.collaborators
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == status_path)
            .map(|r| r.body_json::<Value>().unwrap())
            .collect()
    }

    async fn tokenize(&self, pan: &str) -> String {
        let (status, body) = self
            .send(post_json(
                "/payment/tokenize",
                Some("user-1"),
                json!({"pan": pan, "exp_month": 12, "exp_year": 2030, "cvc": "123"}),
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }
}

fn post_json(uri: &str, caller: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(caller) = caller {
        builder = builder.header("x-user-id", caller);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, caller: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(caller) = caller {
        builder = builder.header("x-user-id", caller);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_needs_no_identity() {
    let app = test_app(100).await;

    for uri in ["/health", "/payment/health"] {
        let (status, body) = app.send(get(uri, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok", "provider": "mock"}));
    }
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let app = test_app(100).await;

    let (status, body) = app
        .send(post_json(
            "/payment/tokenize",
            None,
            json!({"pan": "4242424242424242", "exp_month": 12, "exp_year": 2030, "cvc": "123"}),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 401);

    let (status, _) = app.send(get("/public-key", Some("   "))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_tokenize_returns_masked_card() {
    let app = test_app(100).await;

    let (status, body) = app
        .send(post_json(
            "/payment/tokenize",
            Some("user-1"),
            json!({"pan": "4242 4242 4242 4242", "exp_month": 12, "exp_year": 2030, "cvc": "123"}),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().unwrap().starts_with("hsm:v1:"));
    assert_eq!(body["brand"], "visa");
    assert_eq!(body["last4"], "4242");
    assert_eq!(body["mask"], "************4242");
    assert_eq!(body["owner"], "user-1");
    assert!(body.get("pan").is_none());
}

#[tokio::test]
async fn test_tokenize_rejects_invalid_card() {
    let app = test_app(100).await;

    let (status, body) = app
        .send(post_json(
            "/payment/tokenize",
            Some("user-1"),
            json!({"pan": "1234", "exp_month": 12, "exp_year": 2030, "cvc": "123"}),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
}

#[tokio::test]
async fn test_direct_charge() {
    let app = test_app(100).await;
    let token = app.tokenize("5555555555554444").await;

    let (status, body) = app
        .send(post_json(
            "/payment/charge",
            Some("user-1"),
            json!({"token": token, "amount": 2500}),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "succeeded");
    assert_eq!(body["amount"], 2500);
    assert_eq!(body["currency"], "VND");
    assert_eq!(body["last4"], "4444");
    assert_eq!(body["provider"], "mock");
}

#[tokio::test]
async fn test_payment_succeeds_and_replay_conflicts() {
    let app = test_app(100).await;
    let first = OrderId::new();
    let second = OrderId::new();
    app.mount_order(first, 500_000).await;
    app.mount_order(second, 500_000).await;
    app.mount_fraud("ALLOW", 10).await;
    let token = app.tokenize("4242424242424242").await;

    let (status, body) = app
        .send(post_json(
            "/payments",
            Some("user-1"),
            json!({"order_id": first, "payment_token": token}),
        ))
        .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], "SUCCESS");
    assert_eq!(body["settlement_queued"], true);
    assert_eq!(body["receipt"]["amount"], 500000);
    assert_eq!(body["receipt"]["order_id"], first.to_string());
    assert!(!body["signed_receipt"].as_str().unwrap().is_empty());
    assert_eq!(app.status_updates(first).await, vec![json!({"status": "COMPLETED"})]);
    assert_eq!(app.publisher.messages.lock().unwrap().len(), 1);

    let (status, body) = app
        .send(post_json(
            "/payments",
            Some("user-1"),
            json!({"order_id": second, "payment_token": token}),
        ))
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, json!({"error": "payment token already used", "code": 409}));
    assert_eq!(app.status_updates(second).await, vec![json!({"status": "FAILED"})]);
}

#[tokio::test]
async fn test_fraud_block_is_forbidden() {
    let app = test_app(100).await;
    let order_id = OrderId::new();
    app.mount_order(order_id, 9_000_000).await;
    app.mount_fraud("BLOCK", 97).await;
    let token = app.tokenize("4242424242424242").await;

    let (status, body) = app
        .send(post_json(
            "/payments",
            Some("user-1"),
            json!({"order_id": order_id, "payment_token": token}),
        ))
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 403);
    assert_eq!(app.status_updates(order_id).await, vec![json!({"status": "FAILED"})]);
    assert!(app.publisher.messages.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let app = test_app(100).await;
    let order_id = OrderId::new();
    Mock::given(method("GET"))
        .and(path(format!("/orders/{}", order_id)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&app.collaborators)
        .await;
    let token = app.tokenize("4242424242424242").await;

    let (status, body) = app
        .send(post_json(
            "/payments",
            Some("user-1"),
            json!({"order_id": order_id, "payment_token": token}),
        ))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "order not found", "code": 404}));
    assert!(app.status_updates(order_id).await.is_empty());
}

#[tokio::test]
async fn test_fraud_engine_outage_is_bad_gateway() {
    let app = test_app(100).await;
    let order_id = OrderId::new();
    app.mount_order(order_id, 1000).await;
    Mock::given(method("POST"))
        .and(path("/score"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&app.collaborators)
        .await;
    let token = app.tokenize("4242424242424242").await;

    let (status, body) = app
        .send(post_json(
            "/payments",
            Some("user-1"),
            json!({"order_id": order_id, "payment_token": token}),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], 502);
    assert_eq!(app.status_updates(order_id).await, vec![json!({"status": "FAILED"})]);
}

#[tokio::test]
async fn test_invalid_token_is_bad_request() {
    let app = test_app(100).await;
    let order_id = OrderId::new();
    app.mount_order(order_id, 1000).await;
    app.mount_fraud("ALLOW", 1).await;

    let (status, body) = app
        .send(post_json(
            "/payments",
            Some("user-1"),
            json!({"order_id": order_id, "payment_token": "tok_visa"}),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "invalid payment token", "code": 400}));
}

#[tokio::test]
async fn test_sign_and_public_key_aliases() {
    let app = test_app(100).await;

    for uri in ["/sign", "/payment/sign"] {
        let (status, body) = app
            .send(post_json(uri, Some("user-1"), json!({"message": "hello"})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body["signature"].as_str().unwrap().is_empty());
    }

    let (_, first) = app.send(get("/public-key", Some("user-1"))).await;
    let (_, second) = app.send(get("/payment/public-key", Some("user-1"))).await;
    assert_eq!(first, second);
    assert!(!first["public_key"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_rate_limit_per_caller() {
    let app = test_app(2).await;

    for _ in 0..2 {
        let (status, _) = app.send(get("/public-key", Some("alice"))).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = app.send(get("/public-key", Some("alice"))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["error"].as_str().unwrap().contains("Rate limit exceeded"));
    assert!(body["retry_after_seconds"].as_u64().unwrap() >= 1);

    let (status, _) = app.send(get("/public-key", Some("bob"))).await;
    assert_eq!(status, StatusCode::OK);

    for _ in 0..5 {
        let (status, _) = app.send(get("/health", None)).await;
        assert_eq!(status, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_status_update_body_is_sent_to_order_service() {
    let app = test_app(100).await;
    let order_id = OrderId::new();
    // Mounted ahead of the catch-all status mock so it answers first.
    Mock::given(method("PUT"))
        .and(path(format!("/orders/{}/status", order_id)))
        .and(header("x-user-id", "user-1"))
        .and(body_json(json!({"status": "COMPLETED"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&app.collaborators)
        .await;
    app.mount_order(order_id, 700).await;
    app.mount_fraud("review", 40).await;
    let token = app.tokenize("4242424242424242").await;

    let (status, _) = app
        .send(post_json(
            "/payments",
            Some("user-1"),
            json!({"order_id": order_id, "payment_token": token}),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    app.collaborators.verify().await;
}
