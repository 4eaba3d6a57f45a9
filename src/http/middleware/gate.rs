//! Authorization gate middleware.
//!
//! Runs in front of every route. The submission path passes straight
//! through; everything else needs a secret cookie that the issuer accepts.
//!
//! ```text
//! received ─┬─ path == submission path ──────────────▶ exempt     → next
//!           ├─ no secret cookie ─────────────────────▶ 403 Missing secret
//!           ├─ secret unknown / expired / used ──────▶ 403 Invalid secret
//!           └─ secret accepted ──▶ strip cookie + body field ──▶ authorized → next
//! ```

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{
        header::{CONTENT_LENGTH, TRANSFER_ENCODING},
        HeaderValue, Request,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::GateConfig;
use crate::http::error::GateError;
use crate::observability::metrics;
use crate::secrets::{cookie, SecretIssuer};

/// State required by the gate.
#[derive(Clone)]
pub struct GateState {
    pub issuer: Arc<SecretIssuer>,
    pub submission_path: Arc<str>,
    pub cookie_name: Arc<str>,
    pub strip_field: Arc<str>,
    pub max_body_size: usize,
}

impl GateState {
    pub fn new(config: &GateConfig, issuer: Arc<SecretIssuer>) -> Self {
        Self {
            issuer,
            submission_path: config.gate.submission_path.as_str().into(),
            cookie_name: config.secrets.cookie_name.as_str().into(),
            strip_field: config.gate.strip_field.as_str().into(),
            max_body_size: config.security.max_body_size,
        }
    }
}

pub async fn authorization_gate(
    State(state): State<GateState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    // 1. The submission endpoint is how secrets are obtained in the first place.
    if req.uri().path() == &*state.submission_path {
        metrics::record_decision("exempt");
        return next.run(req).await;
    }

    // 2. Extract the secret cookie
    let token = match cookie::find(req.headers(), &state.cookie_name) {
        Some(t) => t.to_string(),
        None => {
            tracing::warn!(path = %req.uri().path(), "Request without secret");
            metrics::record_decision("unauthenticated");
            return GateError::MissingSecret.into_response();
        }
    };

    // 3. Reject unknown secrets before reading the body
    if !state.issuer.validate(&token) {
        tracing::warn!(path = %req.uri().path(), "Invalid or expired secret");
        metrics::record_decision("rejected");
        return GateError::from(crate::secrets::SecretError::Unknown).into_response();
    }

    // 4. Remove the credential from what downstream will see
    let req = match scrub(req, &state).await {
        Ok(r) => r,
        Err(e) => return e.into_response(),
    };

    // 5. Redeem; under single-use only one concurrent holder gets past here
    if let Err(e) = state.issuer.redeem(&token) {
        tracing::warn!(path = %req.uri().path(), "Secret redeemed concurrently or expired");
        metrics::record_decision("rejected");
        return GateError::from(e).into_response();
    }

    metrics::record_decision("authorized");
    tracing::debug!(path = %req.uri().path(), "Request authorized");
    next.run(req).await
}

/// Drop the secret cookie and the secret body field from `req`.
async fn scrub(req: Request<Body>, state: &GateState) -> Result<Request<Body>, GateError> {
    let (mut parts, body) = req.into_parts();
    cookie::strip(&mut parts.headers, &state.cookie_name);

    let bytes = axum::body::to_bytes(body, state.max_body_size)
        .await
        .map_err(|_| GateError::PayloadTooLarge)?;

    let bytes = match strip_field(&bytes, &state.strip_field) {
        Some(stripped) => {
            parts.headers.remove(TRANSFER_ENCODING);
            parts
                .headers
                .insert(CONTENT_LENGTH, HeaderValue::from(stripped.len()));
            Bytes::from(stripped)
        }
        None => bytes,
    };

    Ok(Request::from_parts(parts, Body::from(bytes)))
}

/// Re-encode `body` without the top-level `field`.
///
/// Returns `None` when the body is not a JSON object or has no such field,
/// in which case it is forwarded untouched.
pub fn strip_field(body: &[u8], field: &str) -> Option<Vec<u8>> {
    let mut value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value.as_object_mut()?.remove(field)?;
    serde_json::to_vec(&value).ok()
}
