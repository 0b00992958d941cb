//! Core HTTP forwarding handler for the gateway.
//!
//! [`forward_handler`] is the Axum fallback that receives every request
//! not served by the gateway's own health endpoints, asks the decision
//! engine ([`routing`]) which upstream should serve it, and streams it
//! there through the cached [`upstream::UpstreamProxy`]. Header rewriting
//! lives in [`headers`], the shared random source in [`random`].

pub mod headers;
pub mod random;
pub mod routing;
pub mod upstream;

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::ProxyError;
use crate::server::AppState;

pub async fn forward_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    let correlation_id = request
        .headers()
        .get(headers::CORRELATION_ID)
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let decision = routing::decide(&path, &state.config, state.rng.as_ref());

    tracing::info!(
        correlation_id = %correlation_id,
        method = %method,
        path = %path,
        service = %decision.service,
        target = %decision.target,
        "routing request"
    );

    let upstream = state.upstreams.get(decision.service);
    let start = Instant::now();
    let client_ip = addr.ip().to_string();

    match upstream.forward(request, &client_ip, &correlation_id).await {
        Ok(mut response) => {
            state.stats.forwarded.fetch_add(1, Ordering::Relaxed);
            tracing::info!(
                correlation_id = %correlation_id,
                service = %upstream.service(),
                status = response.status().as_u16(),
                latency_ms = elapsed_ms(start),
                "upstream responded"
            );
            if let Ok(val) = HeaderValue::from_str(&correlation_id) {
                response.headers_mut().insert(headers::CORRELATION_ID, val);
            }
            response
        }
        Err(e) => {
            state.stats.failed.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                correlation_id = %correlation_id,
                service = %upstream.service(),
                target = %upstream.base(),
                error = %e,
                latency_ms = elapsed_ms(start),
                "upstream request failed"
            );
            let status = match e {
                ProxyError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                ProxyError::Upstream { .. } | ProxyError::InvalidUpstreamUri(_) => {
                    StatusCode::BAD_GATEWAY
                }
            };
            let body = ErrorBody {
                status: "error",
                message: format!("{} unavailable: {e}", upstream.service()),
            };
            let mut response = (status, Json(body)).into_response();
            if let Ok(val) = HeaderValue::from_str(&correlation_id) {
                response.headers_mut().insert(headers::CORRELATION_ID, val);
            }
            response
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}

#[allow(clippy::cast_possible_truncation)]
fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
