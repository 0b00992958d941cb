//! One forwarding object per upstream service.
//!
//! [`Upstreams`] is built once at startup and holds an [`UpstreamProxy`]
//! for the monolith, the movies service and the events service. Each proxy
//! rewrites the request URI onto its base URL and streams the request and
//! response bodies through the shared pooled client.

use std::time::Duration;

use axum::body::Body;
use axum::http::uri::{PathAndQuery, Uri};
use axum::http::{Request, Response, Version};
use url::Url;

use super::headers::{build_forwarded_headers, strip_hop_by_hop};
use super::routing::{target_for, Service};
use crate::config::model::GatewayConfig;
use crate::error::ProxyError;
use crate::server::HttpClient;

#[derive(Clone)]
pub struct UpstreamProxy {
    service: Service,
    base: Url,
    client: HttpClient,
    timeout: Duration,
}

impl UpstreamProxy {
    #[must_use]
    pub const fn new(service: Service, base: Url, client: HttpClient, timeout: Duration) -> Self {
        Self {
            service,
            base,
            client,
            timeout,
        }
    }

    #[must_use]
    pub const fn service(&self) -> Service {
        self.service
    }

    #[must_use]
    pub const fn base(&self) -> &Url {
        &self.base
    }

    /// Forward `request` upstream and hand back the upstream response with
    /// its body still streaming.
    ///
    /// The timeout covers connecting and receiving the response head.
    pub async fn forward(
        &self,
        request: Request<Body>,
        client_ip: &str,
        correlation_id: &str,
    ) -> Result<Response<Body>, ProxyError> {
        let (mut parts, body) = request.into_parts();
        parts.uri = rewrite_uri(&self.base, &parts.uri)?;
        parts.headers = build_forwarded_headers(&parts.headers, client_ip, &self.base, correlation_id);
        // The pooled client speaks HTTP/1.1 only
        parts.version = Version::HTTP_11;

        let upstream_request = Request::from_parts(parts, body);

        match tokio::time::timeout(self.timeout, self.client.request(upstream_request)).await {
            Ok(Ok(response)) => {
                let (mut parts, body) = response.into_parts();
                strip_hop_by_hop(&mut parts.headers);
                Ok(Response::from_parts(parts, Body::new(body)))
            }
            Ok(Err(e)) => Err(ProxyError::Upstream {
                source: Box::new(e),
            }),
            Err(_) => Err(ProxyError::Timeout(
                u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        }
    }
}

pub struct Upstreams {
    monolith: UpstreamProxy,
    movies_service: UpstreamProxy,
    events_service: UpstreamProxy,
}

impl Upstreams {
    #[must_use]
    pub fn from_config(config: &GatewayConfig, client: &HttpClient) -> Self {
        let build = |service| {
            UpstreamProxy::new(
                service,
                target_for(config, service).clone(),
                client.clone(),
                config.upstream_timeout,
            )
        };
        Self {
            monolith: build(Service::Monolith),
            movies_service: build(Service::MoviesService),
            events_service: build(Service::EventsService),
        }
    }

    #[must_use]
    pub const fn get(&self, service: Service) -> &UpstreamProxy {
        match service {
            Service::Monolith => &self.monolith,
            Service::MoviesService => &self.movies_service,
            Service::EventsService => &self.events_service,
        }
    }
}

/// Point `uri` at `base`: take scheme and authority from the base, join the
/// paths with exactly one slash, and concatenate the query strings.
pub fn rewrite_uri(base: &Url, uri: &Uri) -> Result<Uri, ProxyError> {
    let path = join_paths(base.path(), uri.path());
    let query = match (base.query().filter(|q| !q.is_empty()), uri.query()) {
        (Some(b), Some(r)) if !r.is_empty() => Some(format!("{b}&{r}")),
        (Some(b), _) => Some(b.to_string()),
        (None, r) => r.map(String::from),
    };
    let path_and_query = match query {
        Some(q) => format!("{path}?{q}"),
        None => path,
    };

    let host = base.host_str().unwrap_or("localhost");
    let authority = base
        .port()
        .map_or_else(|| host.to_string(), |port| format!("{host}:{port}"));

    Ok(Uri::builder()
        .scheme(base.scheme())
        .authority(authority)
        .path_and_query(path_and_query.parse::<PathAndQuery>().map_err(http::Error::from)?)
        .build()?)
}

fn join_paths(base: &str, request: &str) -> String {
    match (base.ends_with('/'), request.starts_with('/')) {
        (true, true) => format!("{base}{}", &request[1..]),
        (false, false) => format!("{base}/{request}"),
        _ => format!("{base}{request}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite(base: &str, uri: &str) -> String {
        let base = Url::parse(base).unwrap();
        let uri: Uri = uri.parse().unwrap();
        rewrite_uri(&base, &uri).unwrap().to_string()
    }

    #[test]
    fn root_base_keeps_request_path() {
        assert_eq!(
            rewrite("http://monolith:8080", "/api/movies/7"),
            "http://monolith:8080/api/movies/7"
        );
    }

    #[test]
    fn base_path_is_prefixed_with_single_slash() {
        assert_eq!(
            rewrite("http://movies:8081/v2/", "/api/movies"),
            "http://movies:8081/v2/api/movies"
        );
        assert_eq!(
            rewrite("http://movies:8081/v2", "/api/movies"),
            "http://movies:8081/v2/api/movies"
        );
    }

    #[test]
    fn query_strings_are_merged() {
        assert_eq!(
            rewrite("http://monolith:8080/?tenant=a", "/api/users?page=2"),
            "http://monolith:8080/api/users?tenant=a&page=2"
        );
        assert_eq!(
            rewrite("http://monolith:8080", "/api/users?page=2"),
            "http://monolith:8080/api/users?page=2"
        );
        assert_eq!(
            rewrite("http://monolith:8080/?tenant=a", "/api/users"),
            "http://monolith:8080/api/users?tenant=a"
        );
    }

    #[test]
    fn https_default_port_is_implicit() {
        assert_eq!(
            rewrite("https://events.internal", "/api/events/movie"),
            "https://events.internal/api/events/movie"
        );
    }

    #[test]
    fn join_paths_variants() {
        assert_eq!(join_paths("/", "/a"), "/a");
        assert_eq!(join_paths("/base", "a"), "/base/a");
        assert_eq!(join_paths("/base/", "a"), "/base/a");
        assert_eq!(join_paths("/base", "/a"), "/base/a");
    }
}
