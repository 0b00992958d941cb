//! HTTP ingestion surface of the event service.
//!
//! Each `POST /api/events/{movie,user,payment}` decodes and validates its
//! body, publishes it to the matching topic and answers `201`. Anything the
//! caller got wrong is a `400`; a broker failure is a `500`. Other methods on
//! those paths get a JSON `405`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, MethodRouter};
use axum::{Json, Router};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::events::model::EventKind;
use crate::events::publisher::MessagePublisher;
use crate::health::events_health;

pub struct EventsState {
    pub publisher: MessagePublisher,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusBody {
    pub status: String,
    pub message: String,
}

impl StatusBody {
    fn reply(code: StatusCode, status: &str, message: impl Into<String>) -> Response {
        let body = Self {
            status: status.to_string(),
            message: message.into(),
        };
        (code, Json(body)).into_response()
    }
}

pub fn build_router(state: Arc<EventsState>, max_body: usize) -> Router {
    Router::new()
        .route("/api/events/movie", ingest(EventKind::Movie))
        .route("/api/events/user", ingest(EventKind::User))
        .route("/api/events/payment", ingest(EventKind::Payment))
        .route("/api/events/health", get(events_health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(max_body)),
        )
        .with_state(state)
}

fn ingest(kind: EventKind) -> MethodRouter<Arc<EventsState>> {
    post(move |state: State<Arc<EventsState>>, body: Bytes| handle_event(kind, state, body))
        .fallback(method_not_allowed)
}

async fn handle_event(
    kind: EventKind,
    State(state): State<Arc<EventsState>>,
    body: Bytes,
) -> Response {
    let published = match kind.decode(&body) {
        Ok(event) => state.publisher.publish(&event).await,
        Err(e) => Err(e),
    };

    match published {
        Ok(payload) => {
            tracing::info!(
                topic = kind.topic(),
                payload = %String::from_utf8_lossy(&payload),
                "event published"
            );
            StatusBody::reply(StatusCode::CREATED, "success", "event processed")
        }
        Err(e) if e.is_client_error() => {
            tracing::warn!(kind = kind.name(), error = %e, "rejected event");
            StatusBody::reply(StatusCode::BAD_REQUEST, "error", e.to_string())
        }
        Err(e) => {
            tracing::error!(topic = kind.topic(), error = %e, "failed to publish event");
            StatusBody::reply(StatusCode::INTERNAL_SERVER_ERROR, "error", e.to_string())
        }
    }
}

async fn method_not_allowed() -> Response {
    StatusBody::reply(
        StatusCode::METHOD_NOT_ALLOWED,
        "error",
        "method not allowed",
    )
}
