//! Error responses.
//!
//! Every failure reaches the client as a status code plus a JSON body of the
//! form `{"detail": "..."}`. Nothing here retries.

use axum::{
    body::Body,
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::secrets::SecretError;

/// Errors surfaced by the gate's HTTP layer.
#[derive(Debug, Error)]
pub enum GateError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Missing preimage")]
    MissingPreimage,

    #[error("Missing secret")]
    MissingSecret,

    #[error("Invalid secret")]
    InvalidSecret(#[from] SecretError),

    #[error("Request body too large or unreadable")]
    PayloadTooLarge,

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GateError {
    pub fn status(&self) -> StatusCode {
        match self {
            GateError::Ledger(LedgerError::AlreadyExists) => StatusCode::CONFLICT,
            GateError::Ledger(LedgerError::InvalidPreimage(_)) => StatusCode::BAD_REQUEST,
            GateError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GateError::MissingPreimage => StatusCode::UNPROCESSABLE_ENTITY,
            GateError::MissingSecret | GateError::InvalidSecret(_) => StatusCode::FORBIDDEN,
            GateError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            GateError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GateError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client. Storage and internal details stay in
    /// the logs.
    pub fn detail(&self) -> String {
        match self {
            GateError::Ledger(e) if e.is_storage() => "Storage unavailable".to_string(),
            GateError::Upstream(_) => "Upstream request failed".to_string(),
            GateError::Internal(_) => "Internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Request failed");
        }
        (status, Json(json!({ "detail": self.detail() }))).into_response()
    }
}

/// Marker extension on responses produced by the downstream, whose bodies
/// are passed through untouched.
#[derive(Debug, Clone, Copy)]
pub struct DownstreamResponse;

/// Give error responses that did not come from [`GateError`] (body limit,
/// timeout, routing, extractor rejections) the same JSON shape.
pub async fn json_error_body(response: Response) -> Response {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error())
        || response.extensions().get::<DownstreamResponse>().is_some()
    {
        return response;
    }
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if is_json {
        return response;
    }

    let detail = match status {
        StatusCode::PAYLOAD_TOO_LARGE => GateError::PayloadTooLarge.detail(),
        _ => status.canonical_reason().unwrap_or("Request failed").to_string(),
    };
    let (mut parts, _) = response.into_parts();
    parts.headers.remove(CONTENT_LENGTH);
    parts
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Response::from_parts(parts, Body::from(json!({ "detail": detail }).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_plain_error_rewritten() {
        let plain = (StatusCode::PAYLOAD_TOO_LARGE, "length limit exceeded").into_response();
        let res = json_error_body(plain).await;
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(res.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(
            body_json(res).await,
            json!({ "detail": "Request body too large or unreadable" })
        );

        let timeout = json_error_body(StatusCode::REQUEST_TIMEOUT.into_response()).await;
        assert_eq!(body_json(timeout).await, json!({ "detail": "Request Timeout" }));
    }

    #[tokio::test]
    async fn test_other_responses_untouched() {
        let ok = json_error_body((StatusCode::OK, "fine").into_response()).await;
        assert_eq!(ok.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");

        let gate = json_error_body(GateError::MissingSecret.into_response()).await;
        assert_eq!(body_json(gate).await, json!({ "detail": "Missing secret" }));

        let mut downstream = (StatusCode::NOT_FOUND, "no such page").into_response();
        downstream.extensions_mut().insert(DownstreamResponse);
        let res = json_error_body(downstream).await;
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"no such page");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            GateError::from(LedgerError::AlreadyExists).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            GateError::from(LedgerError::InvalidPreimage("empty".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GateError::from(LedgerError::Poisoned).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(GateError::MissingSecret.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            GateError::from(SecretError::Expired).status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_detail_hides_storage_errors() {
        let err = GateError::from(LedgerError::Task("worker panicked".into()));
        assert_eq!(err.detail(), "Storage unavailable");
        assert_eq!(
            GateError::from(LedgerError::AlreadyExists).detail(),
            "Preimage already exists"
        );
        assert_eq!(GateError::from(SecretError::Unknown).detail(), "Invalid secret");
    }
}
