//! Caller identity extraction from the `x-user-id` header.

use axum::{extract::FromRequestParts, http::request::Parts};

use payments_types::{AppError, CallerIdentity};

use super::handlers::ApiError;
use crate::outbound::CALLER_HEADER;

/// The authenticated caller, as asserted by the upstream gateway.
#[derive(Debug, Clone)]
pub struct Caller(pub CallerIdentity);

/// Reads the caller header. Missing, blank or non-ASCII values yield `None`.
pub(crate) fn caller_header(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get(CALLER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = caller_header(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized(format!("{} header required", CALLER_HEADER)))?;
        let identity = CallerIdentity::new(raw).map_err(AppError::from)?;
        Ok(Caller(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    #[test]
    fn test_caller_header_present() {
        let mut headers = HeaderMap::new();
        headers.insert(CALLER_HEADER, HeaderValue::from_static(" user-1 "));
        assert_eq!(caller_header(&headers), Some("user-1"));
    }

    #[test]
    fn test_caller_header_missing_or_blank() {
        let mut headers = HeaderMap::new();
        assert_eq!(caller_header(&headers), None);
        headers.insert(CALLER_HEADER, HeaderValue::from_static("   "));
        assert_eq!(caller_header(&headers), None);
    }
}
