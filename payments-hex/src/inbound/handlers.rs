//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use tracing::Instrument;

use payments_types::{
    AppError, ChargeRequest, CreatePaymentRequest, ErrorResponse, HealthResponse, PaymentError,
    PaymentRepository, SignRequest, TokenizeRequest,
};

use super::identity::Caller;
use crate::PaymentService;

/// Application state shared across handlers.
pub struct AppState<R: PaymentRepository> {
    pub service: PaymentService<R>,
}

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        ApiError(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0 {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: message,
            code: status.as_u16(),
        };

        (status, Json(body)).into_response()
    }
}

/// Health check endpoint.
pub async fn health<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".into(),
        provider: state.service.provider().into(),
    })
}

/// Encrypt a card number into a payment token.
#[tracing::instrument(skip(state, req, caller), fields(owner = %caller))]
pub async fn tokenize<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    Caller(caller): Caller,
    Json(req): Json<TokenizeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.service.tokenize(req, &caller).await?;
    Ok(Json(response))
}

/// Charge a tokenized card directly.
#[tracing::instrument(skip(state, req, caller), fields(owner = %caller, amount = req.amount))]
pub async fn charge<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    Caller(caller): Caller,
    Json(req): Json<ChargeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.service.charge(req, &caller).await?;
    Ok(Json(response))
}

/// Run the full orchestration for an order.
///
/// The pipeline runs on its own task so a client disconnect cannot abandon
/// it half way; the handler only waits for the outcome.
#[tracing::instrument(skip(state, req, caller), fields(owner = %caller, order_id = %req.order_id))]
pub async fn create_payment<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    Caller(caller): Caller,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let task = tokio::spawn(
        async move {
            state
                .service
                .orchestrate_payment(req.order_id, &req.payment_token, &caller)
                .await
        }
        .in_current_span(),
    );

    let outcome = task
        .await
        .map_err(|e| AppError::Internal(format!("orchestration task failed: {}", e)))?;
    Ok(Json(outcome?))
}

/// Sign a message with the HSM signing key.
#[tracing::instrument(skip(state, req, caller), fields(owner = %caller))]
pub async fn sign<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    Caller(caller): Caller,
    Json(req): Json<SignRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.service.sign(&req.message).await?;
    Ok(Json(response))
}

/// Export the public half of the signing key.
#[tracing::instrument(skip(state, caller), fields(owner = %caller))]
pub async fn public_key<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    Caller(caller): Caller,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.service.public_key().await?;
    Ok(Json(response))
}
