//! Preimage submission endpoint.
//!
//! `POST /preimages?preimage=<value>` or a JSON body `{"preimage": "<value>"}`
//! (the query parameter wins when both are present). On success the response
//! is `200` with an empty body and a `Set-Cookie` header carrying a fresh
//! secret. A secret is only issued once the preimage is durably recorded.

use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::{header::SET_COOKIE, StatusCode},
    response::{IntoResponse, Response},
};
use percent_encoding::percent_decode_str;
use serde::Deserialize;

use crate::http::error::GateError;
use crate::http::server::AppState;
use crate::ledger::LedgerError;
use crate::secrets::cookie;

const PREIMAGE_PARAM: &str = "preimage";

#[derive(Debug, Deserialize)]
struct PreimageBody {
    preimage: String,
}

fn invalid(reason: &str) -> GateError {
    GateError::Ledger(LedgerError::InvalidPreimage(reason.to_string()))
}

/// Decode one `application/x-www-form-urlencoded` component, refusing
/// anything that is not UTF-8 once decoded.
fn decode_component(component: &str) -> Option<String> {
    let spaced = component.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}

/// The `preimage` query parameter, decoded byte-exactly.
fn query_preimage(query: Option<&str>) -> Result<Option<String>, GateError> {
    let mut found = None;
    for pair in query.unwrap_or_default().split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if decode_component(key).as_deref() != Some(PREIMAGE_PARAM) {
            continue;
        }
        if found.is_some() {
            return Err(invalid("preimage given more than once"));
        }
        let value = decode_component(value).ok_or_else(|| invalid("not valid UTF-8"))?;
        found = Some(value);
    }
    Ok(found)
}

fn extract_preimage(query: Option<&str>, body: &[u8]) -> Result<String, GateError> {
    if let Some(preimage) = query_preimage(query)? {
        return Ok(preimage);
    }
    serde_json::from_slice::<PreimageBody>(body)
        .map(|b| b.preimage)
        .map_err(|_| GateError::MissingPreimage)
}

pub async fn submit_preimage(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<Response, GateError> {
    let preimage = extract_preimage(query.as_deref(), &body)?;

    let admission = match state.ledger.submit(&preimage).await {
        Ok(a) => a,
        Err(e) => {
            tracing::warn!(error = %e, preimage_bytes = preimage.len(), "Preimage rejected");
            return Err(e.into());
        }
    };

    let token = state.issuer.issue();
    let set_cookie = cookie::set_cookie(
        &state.config.secrets.cookie_name,
        &token,
        state.config.secrets.secure_cookie,
    )
    .map_err(|e| GateError::Internal(e.to_string()))?;

    tracing::info!(
        sequence = admission.sequence,
        evicted = admission.evicted,
        "Preimage accepted, secret issued"
    );

    Ok((StatusCode::OK, [(SET_COOKIE, set_cookie)]).into_response())
}
