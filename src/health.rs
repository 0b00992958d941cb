//! Health endpoint handlers for both processes.
//!
//! The gateway answers `GET /health` and `GET /api/health` locally (never
//! proxied); the event service answers `GET /api/events/health`. Payload
//! shapes are fixed because container health checks and dashboards parse them.

use axum::Json;
use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const GATEWAY_SERVICE: &str = "strangler-fig-proxy";
pub const EVENTS_SERVICE: &str = "events-service";

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    /// RFC 3339, second precision.
    pub datetime: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventsHealthResponse {
    pub status: bool,
    pub service: String,
    pub timestamp: DateTime<Utc>,
}

pub async fn gateway_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: GATEWAY_SERVICE.to_string(),
        datetime: Local::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    })
}

pub async fn events_health() -> Json<EventsHealthResponse> {
    Json(EventsHealthResponse {
        status: true,
        service: EVENTS_SERVICE.to_string(),
        timestamp: Utc::now(),
    })
}
