//! HTTP transport for the rate limiter.
//!
//! Thin glue only: classify the caller, ask the engine for a verdict,
//! translate the verdict into a protocol response. The engine never sees
//! a header or a status code.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tracing::{info, warn};

use crate::error::Result;
use crate::ratelimit::{Classification, RateLimitRequest, RateLimiter};

/// Header carrying an API token; presence selects token classification.
const API_KEY_HEADER: &str = "api_key";

/// Headers consulted for the client address, in precedence order.
const IP_HEADERS: [&str; 2] = ["x-forwarded-for", "x-real-ip"];

/// Build the service router with the admission middleware applied.
pub fn router(limiter: Arc<RateLimiter>) -> Router {
    Router::new()
        .route("/", get(index))
        .layer(middleware::from_fn_with_state(limiter, admission))
}

/// Serve the router until the shutdown signal resolves.
pub async fn serve<F>(addr: SocketAddr, limiter: Arc<RateLimiter>, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Starting HTTP server");

    axum::serve(
        listener,
        router(limiter).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    Ok(())
}

async fn index() -> &'static str {
    "Request successful"
}

/// Gate every request on the engine's verdict.
async fn admission(
    State(limiter): State<Arc<RateLimiter>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let rate_request = classify(request.headers(), peer);

    match limiter.is_allowed(&rate_request).await {
        Ok(true) => next.run(request).await,
        Ok(false) => (
            StatusCode::TOO_MANY_REQUESTS,
            "you have reached the maximum number of requests allowed",
        )
            .into_response(),
        Err(err) => {
            warn!(error = %err, "Rate limit check produced no verdict");
            (StatusCode::SERVICE_UNAVAILABLE, "rate limiter unavailable").into_response()
        }
    }
}

/// Build the classified request for a caller.
///
/// A request carrying a non-empty API key header is limited by token;
/// everything else is limited by client address.
fn classify(headers: &HeaderMap, peer: SocketAddr) -> RateLimitRequest {
    if let Some(token) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        if !token.is_empty() {
            return RateLimitRequest::new(token, Classification::Token);
        }
    }

    RateLimitRequest::new(client_ip(headers, peer), Classification::Ip)
}

/// Extract the client address, preferring proxy-supplied headers.
///
/// `X-Forwarded-For` may carry a chain; only the first hop counts.
/// Header values that do not parse as an address are ignored rather than
/// trusted, falling back to the peer address.
fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    for name in IP_HEADERS {
        let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) else {
            continue;
        };
        let Some(first) = value.split(',').next() else {
            continue;
        };

        if let Some(ip) = parse_ip(first.trim()) {
            return ip.to_string();
        }
    }

    peer.ip().to_string()
}

/// Parse an address that may still carry a port.
fn parse_ip(value: &str) -> Option<IpAddr> {
    if let Ok(ip) = value.parse::<IpAddr>() {
        return Some(ip);
    }

    value.parse::<SocketAddr>().ok().map(|addr| addr.ip())
}
