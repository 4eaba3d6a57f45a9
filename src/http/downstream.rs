//! Downstream handling for authorized requests.
//!
//! The gate does not interpret authorized traffic. It either hands it to an
//! HTTP upstream (for example the conversational service), to a router
//! supplied by the embedding application, or, with nothing configured, to
//! an echo handler that returns the forwarded JSON body.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{
        header::{CONTENT_TYPE, HOST},
        uri::{Authority, PathAndQuery, Scheme},
        HeaderValue, Request, StatusCode, Uri, Version,
    },
    middleware::map_response,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::DownstreamConfig;
use crate::http::error::{DownstreamResponse, GateError};
use crate::observability::metrics;

/// Where authorized requests are sent.
pub enum Downstream {
    /// Echo the received body at the given path.
    Echo { path: String },
    /// Forward every authorized request to an HTTP upstream.
    Upstream(Upstream),
    /// Application-supplied routes. A route on the submission path is
    /// shadowed by the submission endpoint.
    Router(Router),
}

impl Downstream {
    pub fn from_config(config: &DownstreamConfig) -> Result<Self, GateError> {
        match &config.upstream_url {
            Some(url) => Ok(Downstream::Upstream(Upstream::new(url)?)),
            None => Ok(Downstream::Echo {
                path: config.path.clone(),
            }),
        }
    }

    pub fn into_router(self) -> Router {
        match self {
            Downstream::Echo { path } => Router::new().route(&path, any(echo)),
            Downstream::Upstream(upstream) => Router::new()
                .fallback(forward)
                .with_state(Arc::new(upstream)),
            Downstream::Router(router) => router.layer(map_response(mark_downstream)),
        }
    }
}

async fn mark_downstream(mut response: Response) -> Response {
    response.extensions_mut().insert(DownstreamResponse);
    response
}

/// Returns the body it received, as JSON when it parses as JSON.
pub async fn echo(body: Bytes) -> Response {
    let started = Instant::now();
    let response = match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(value) => axum::Json(value).into_response(),
        Err(_) => (
            StatusCode::OK,
            [(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"))],
            body,
        )
            .into_response(),
    };
    metrics::record_downstream(response.status().as_u16(), started);
    response
}

/// HTTP upstream that receives authorized requests.
pub struct Upstream {
    client: Client<HttpConnector, Body>,
    authority: Authority,
}

impl Upstream {
    /// Build a forwarder for `url` (scheme `http`, host and optional port).
    pub fn new(url: &str) -> Result<Self, GateError> {
        let parsed = url::Url::parse(url).map_err(|e| GateError::Internal(e.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| GateError::Internal(format!("upstream URL {url:?} has no host")))?;
        let port = parsed.port_or_known_default().unwrap_or(80);
        let authority = Authority::from_str(&format!("{host}:{port}"))
            .map_err(|e| GateError::Internal(e.to_string()))?;

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Ok(Self { client, authority })
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Rewrite the request URI onto the upstream and send it.
    pub async fn forward(&self, req: Request<Body>) -> Result<Response, GateError> {
        let started = Instant::now();
        let (mut parts, body) = req.into_parts();

        let mut uri_parts = parts.uri.clone().into_parts();
        uri_parts.scheme = Some(Scheme::HTTP);
        uri_parts.authority = Some(self.authority.clone());
        if uri_parts.path_and_query.is_none() {
            uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
        }
        parts.uri = Uri::from_parts(uri_parts).map_err(|e| GateError::Internal(e.to_string()))?;
        parts.version = Version::HTTP_11;
        parts.headers.remove(HOST);

        tracing::debug!(upstream = %self.authority, path = %parts.uri.path(), "Forwarding request");

        match self.client.request(Request::from_parts(parts, body)).await {
            Ok(response) => {
                metrics::record_downstream(response.status().as_u16(), started);
                let (mut parts, body): (_, Incoming) = response.into_parts();
                parts.extensions.insert(DownstreamResponse);
                Ok(Response::from_parts(parts, Body::new(body)))
            }
            Err(e) => {
                metrics::record_downstream(StatusCode::BAD_GATEWAY.as_u16(), started);
                tracing::error!(upstream = %self.authority, error = %e, "Upstream error");
                Err(GateError::Upstream(e.to_string()))
            }
        }
    }
}

async fn forward(
    State(upstream): State<Arc<Upstream>>,
    req: Request<Body>,
) -> Result<Response, GateError> {
    upstream.forward(req).await
}
