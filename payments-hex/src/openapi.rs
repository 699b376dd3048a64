//! OpenAPI specification and documentation.

#![allow(dead_code)] // Path functions are only used by utoipa for documentation generation

use payments_types::domain::{CardBrand, OrderId, PaymentStatus};
use payments_types::dto::{
    ChargeRequest, ChargeResponse, CreatePaymentRequest, ErrorResponse, HealthResponse,
    PaymentResponse, PublicKeyResponse, SignRequest, SignResponse, TokenizeRequest,
    TokenizeResponse,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

// Dummy functions to generate path documentation
// These are not the actual handlers, just for OpenAPI path generation

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
async fn health() {}

/// Tokenize a card
#[utoipa::path(
    post,
    path = "/payment/tokenize",
    tag = "payment",
    request_body = TokenizeRequest,
    security(("caller_id" = [])),
    responses(
        (status = 200, description = "Card tokenized", body = TokenizeResponse),
        (status = 400, description = "Invalid card data", body = ErrorResponse),
        (status = 401, description = "Missing x-user-id header", body = ErrorResponse)
    )
)]
async fn tokenize() {}

/// Charge a tokenized card directly, bypassing order orchestration
#[utoipa::path(
    post,
    path = "/payment/charge",
    tag = "payment",
    request_body = ChargeRequest,
    security(("caller_id" = [])),
    responses(
        (status = 200, description = "PSP charge result", body = ChargeResponse),
        (status = 400, description = "Invalid token or amount", body = ErrorResponse),
        (status = 401, description = "Missing x-user-id header", body = ErrorResponse),
        (status = 502, description = "PSP unavailable", body = ErrorResponse)
    )
)]
async fn charge() {}

/// Pay an order
#[utoipa::path(
    post,
    path = "/payments",
    tag = "payment",
    request_body = CreatePaymentRequest,
    security(("caller_id" = [])),
    responses(
        (status = 200, description = "Payment succeeded; receipt signed", body = PaymentResponse),
        (status = 400, description = "Invalid payment token or order", body = ErrorResponse),
        (status = 401, description = "Missing x-user-id header", body = ErrorResponse),
        (status = 403, description = "Blocked by the fraud engine", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse),
        (status = 409, description = "Payment token already used", body = ErrorResponse),
        (status = 502, description = "PSP charge failed or collaborator unavailable", body = ErrorResponse)
    )
)]
async fn create_payment() {}

/// Sign a message with the HSM signing key
#[utoipa::path(
    post,
    path = "/sign",
    tag = "crypto",
    request_body = SignRequest,
    security(("caller_id" = [])),
    responses(
        (status = 200, description = "Base64 signature", body = SignResponse),
        (status = 401, description = "Missing x-user-id header", body = ErrorResponse)
    )
)]
async fn sign() {}

/// Public half of the signing key
#[utoipa::path(
    get,
    path = "/public-key",
    tag = "crypto",
    security(("caller_id" = [])),
    responses(
        (status = 200, description = "Base64 DER SubjectPublicKeyInfo", body = PublicKeyResponse),
        (status = 401, description = "Missing x-user-id header", body = ErrorResponse)
    )
)]
async fn public_key() {}

/// OpenAPI documentation for the Payment API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Payment Orchestrator API",
        version = "1.0.0",
        description = "Tokenization, direct charges, order payment orchestration and receipt signing.\n\n## Caller identity\n\nEvery endpoint except `/health` requires the caller identity header:\n\n```\nx-user-id: user-123\n```\n\nThe `/payment/health`, `/payment/sign` and `/payment/public-key` aliases behave like their unprefixed routes.",
        license(name = "MIT"),
    ),
    paths(
        health,
        tokenize,
        charge,
        create_payment,
        sign,
        public_key,
    ),
    components(
        schemas(
            TokenizeRequest,
            TokenizeResponse,
            ChargeRequest,
            ChargeResponse,
            CreatePaymentRequest,
            PaymentResponse,
            SignRequest,
            SignResponse,
            PublicKeyResponse,
            HealthResponse,
            ErrorResponse,
            CardBrand,
            OrderId,
            PaymentStatus,
        )
    ),

    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "payment", description = "Tokenization, charges and order payments"),
        (name = "crypto", description = "HSM-backed signing"),
    )
)]
pub struct ApiDoc;

/// Security scheme modifier for the caller identity header.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "caller_id",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("x-user-id"))),
            );
        }
    }
}
