//! Outbound adapters
//!
//! Network collaborators the orchestrator drives: the order service and fraud
//! engine over HTTP, the card processor, and the reconciliation queue.

mod amqp;
mod fraud;
mod order;
mod psp;

pub use amqp::{AmqpConsumer, AmqpPublisher, AmqpSettings};
pub use fraud::HttpFraudGateway;
pub use order::HttpOrderGateway;
pub use psp::{MockPsp, StripePsp};

use std::time::Duration;

use payments_types::GatewayError;

/// Header carrying the caller identity to the order service.
pub const CALLER_HEADER: &str = "x-user-id";

/// Builds the shared HTTP client. Every request it sends is bounded by `timeout`.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, GatewayError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| GatewayError::Transport {
            service: "http client",
            message: e.to_string(),
        })
}

fn transport_error(service: &'static str, err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout { service }
    } else {
        GatewayError::Transport {
            service,
            message: err.to_string(),
        }
    }
}

/// Rejects non-2xx answers. 404 and 403 keep their meaning; anything else is
/// reported by status only, never by body.
fn ensure_success(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(match status {
        reqwest::StatusCode::NOT_FOUND => GatewayError::NotFound { service },
        reqwest::StatusCode::FORBIDDEN => GatewayError::Forbidden { service },
        other => GatewayError::Upstream {
            service,
            status: other.as_u16(),
        },
    })
}

async fn decode_json<T: serde::de::DeserializeOwned>(
    service: &'static str,
    response: reqwest::Response,
) -> Result<T, GatewayError> {
    response
        .json::<T>()
        .await
        .map_err(|e| GatewayError::Malformed {
            service,
            message: e.to_string(),
        })
}
