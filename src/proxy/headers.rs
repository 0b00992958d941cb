//! Header rewriting for proxied requests and responses.
//!
//! [`build_forwarded_headers`] keeps every end-to-end header of the client
//! request, drops hop-by-hop headers (the fixed set plus anything named in
//! `Connection`), rewrites `Host` for the upstream, and adds proxy metadata
//! (`X-Forwarded-For`, `X-Forwarded-Proto`, `X-Forwarded-Host`, `Via`,
//! `X-Correlation-Id`).

use std::sync::LazyLock;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

static HOP_BY_HOP: LazyLock<Vec<HeaderName>> = LazyLock::new(|| {
    [
        "connection",
        "keep-alive",
        "proxy-connection",
        "transfer-encoding",
        "te",
        "trailer",
        "upgrade",
        "proxy-authorization",
        "proxy-authenticate",
    ]
    .iter()
    .filter_map(|name| name.parse::<HeaderName>().ok())
    .collect()
});

pub const CORRELATION_ID: &str = "x-correlation-id";

/// Remove hop-by-hop headers, including any named in `Connection`.
///
/// Used on upstream responses too; `content-length` is kept since bodies
/// are streamed through unchanged.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(hyper::header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|token| token.trim().parse::<HeaderName>().ok())
        .collect();
    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

pub fn build_forwarded_headers(
    original: &HeaderMap,
    client_ip: &str,
    target_url: &url::Url,
    correlation_id: &str,
) -> HeaderMap {
    let mut headers = original.clone();
    strip_hop_by_hop(&mut headers);

    // Rewrite Host
    if let Some(host) = target_url.host_str() {
        let host_value = target_url
            .port()
            .map_or_else(|| host.to_string(), |port| format!("{host}:{port}"));
        if let Ok(val) = HeaderValue::from_str(&host_value) {
            headers.insert(hyper::header::HOST, val);
        }
    }

    // X-Forwarded-For: append to chain
    let xff = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map_or_else(
            || client_ip.to_string(),
            |existing| format!("{existing}, {client_ip}"),
        );
    if let Ok(val) = HeaderValue::from_str(&xff) {
        headers.insert("x-forwarded-for", val);
    }

    let proto = if target_url.scheme() == "https" {
        "https"
    } else {
        "http"
    };
    headers.insert("x-forwarded-proto", HeaderValue::from_static(proto));

    // Original Host the client targeted
    if let Some(original_host) = original.get(hyper::header::HOST) {
        headers.insert("x-forwarded-host", original_host.clone());
    }

    headers.insert(hyper::header::VIA, HeaderValue::from_static("1.1 strangler"));

    if let Ok(val) = HeaderValue::from_str(correlation_id) {
        headers.insert(CORRELATION_ID, val);
    }

    headers
}
