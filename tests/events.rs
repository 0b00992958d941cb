//! Integration tests for the event ingestion routes and the shared publisher.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use strangler::broker::memory::MemoryBroker;
use strangler::broker::{Broker, MessageReader, MessageWriter};
use strangler::error::EventError;
use strangler::events::server::{build_router, EventsState, StatusBody};
use strangler::events::{Event, MessagePublisher, MovieEvent};
use strangler::health::EventsHealthResponse;

async fn start_events_server(
    broker: Arc<dyn Broker>,
    max_body: usize,
) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
    let state = Arc::new(EventsState {
        publisher: MessagePublisher::new(broker),
    });
    let router = build_router(state, max_body);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .unwrap();
    });

    (addr, shutdown_tx)
}

async fn post(addr: SocketAddr, kind: &str, body: impl Into<reqwest::Body>) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://{addr}/api/events/{kind}"))
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await
        .unwrap()
}

fn decode(payload: &[u8]) -> Value {
    serde_json::from_slice(payload).unwrap()
}

#[tokio::test]
async fn movie_event_is_published_to_its_topic() {
    let broker = MemoryBroker::new();
    let (addr, shutdown) = start_events_server(Arc::new(broker.clone()), 1_048_576).await;

    let event = json!({"movie_id": 1, "title": "Dune", "action": "viewed", "user_id": 42});
    let resp = post(addr, "movie", event.to_string()).await;
    assert_eq!(resp.status(), 201);
    let body: StatusBody = resp.json().await.unwrap();
    assert_eq!(body.status, "success");
    assert!(!body.message.is_empty());

    let messages = broker.messages("movie-events");
    assert_eq!(messages.len(), 1);
    assert_eq!(decode(&messages[0]), event);
    assert!(broker.messages("user-events").is_empty());

    let _ = shutdown.send(());
}

#[tokio::test]
async fn user_and_payment_events_use_their_own_topics() {
    let broker = MemoryBroker::new();
    let (addr, shutdown) = start_events_server(Arc::new(broker.clone()), 1_048_576).await;

    let user = json!({
        "user_id": 7,
        "username": "paul",
        "action": "login",
        "timestamp": "2024-05-01T10:00:00Z"
    });
    assert_eq!(post(addr, "user", user.to_string()).await.status(), 201);

    let payment = json!({
        "payment_id": 3,
        "user_id": 7,
        "amount": 9.99,
        "status": "completed",
        "timestamp": "2024-05-01T10:00:00Z"
    });
    assert_eq!(post(addr, "payment", payment.to_string()).await.status(), 201);

    let users = broker.messages("user-events");
    assert_eq!(users.len(), 1);
    assert_eq!(decode(&users[0])["username"], "paul");

    let payments = broker.messages("payment-events");
    assert_eq!(payments.len(), 1);
    assert_eq!(decode(&payments[0])["amount"], 9.99);
    assert!(broker.messages("movie-events").is_empty());

    let _ = shutdown.send(());
}

#[tokio::test]
async fn missing_fields_are_rejected_without_publishing() {
    let broker = MemoryBroker::new();
    let (addr, shutdown) = start_events_server(Arc::new(broker.clone()), 1_048_576).await;

    let resp = post(addr, "movie", r#"{"title":"Dune"}"#).await;
    assert_eq!(resp.status(), 400);
    let body: StatusBody = resp.json().await.unwrap();
    assert_eq!(body.status, "error");
    assert!(body.message.contains("movie_id"), "{}", body.message);

    let resp = post(addr, "user", r#"{"user_id":7,"username":"paul","action":"login"}"#).await;
    assert_eq!(resp.status(), 400);

    assert!(broker.messages("movie-events").is_empty());
    assert!(broker.messages("user-events").is_empty());

    let _ = shutdown.send(());
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let broker = MemoryBroker::new();
    let (addr, shutdown) = start_events_server(Arc::new(broker.clone()), 1_048_576).await;

    for body in ["{", "", "[1,2]", r#"{"movie_id":"one"}"#] {
        assert_eq!(post(addr, "movie", body).await.status(), 400, "{body:?}");
    }
    assert!(broker.messages("movie-events").is_empty());

    let _ = shutdown.send(());
}

#[tokio::test]
async fn non_post_methods_are_not_allowed() {
    let (addr, shutdown) = start_events_server(Arc::new(MemoryBroker::new()), 1_048_576).await;
    let client = reqwest::Client::new();

    for kind in ["movie", "user", "payment"] {
        let url = format!("http://{addr}/api/events/{kind}");
        let resp = client.get(&url).send().await.unwrap();
        assert_eq!(resp.status(), 405);
        let body: StatusBody = resp.json().await.unwrap();
        assert_eq!(body.status, "error");

        assert_eq!(client.put(&url).send().await.unwrap().status(), 405);
        assert_eq!(client.delete(&url).send().await.unwrap().status(), 405);
    }

    let _ = shutdown.send(());
}

#[tokio::test]
async fn health_reports_service_and_instant() {
    let (addr, shutdown) = start_events_server(Arc::new(MemoryBroker::new()), 1_048_576).await;

    let resp = reqwest::get(format!("http://{addr}/api/events/health"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let health: EventsHealthResponse = resp.json().await.unwrap();
    assert!(health.status);
    assert_eq!(health.service, "events-service");
    assert!((chrono::Utc::now() - health.timestamp).num_seconds().abs() < 60);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn broker_failure_is_internal_error() {
    let broker = MemoryBroker::new();
    let (addr, shutdown) = start_events_server(Arc::new(broker.clone()), 1_048_576).await;
    broker.close();

    let event = json!({"movie_id": 1, "title": "Dune", "action": "viewed", "user_id": 42});
    let resp = post(addr, "movie", event.to_string()).await;
    assert_eq!(resp.status(), 500);
    let body: StatusBody = resp.json().await.unwrap();
    assert_eq!(body.status, "error");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let broker = MemoryBroker::new();
    let (addr, shutdown) = start_events_server(Arc::new(broker.clone()), 64).await;

    let title = "x".repeat(256);
    let event = json!({"movie_id": 1, "title": title, "action": "viewed", "user_id": 42});
    let resp = post(addr, "movie", event.to_string()).await;
    assert_eq!(resp.status(), 413);
    assert!(broker.messages("movie-events").is_empty());

    let _ = shutdown.send(());
}

/// Counts writer connections and makes each one slow, so concurrent first
/// publishes overlap.
struct CountingBroker {
    inner: MemoryBroker,
    writers: AtomicUsize,
}

#[async_trait]
impl Broker for CountingBroker {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn connect_writer(&self) -> Result<Box<dyn MessageWriter>, EventError> {
        self.writers.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.inner.connect_writer().await
    }

    async fn connect_reader(
        &self,
        topic: &str,
        group: &str,
    ) -> Result<Box<dyn MessageReader>, EventError> {
        self.inner.connect_reader(topic, group).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_publishes_connect_once() {
    let inner = MemoryBroker::new();
    let broker = Arc::new(CountingBroker {
        inner: inner.clone(),
        writers: AtomicUsize::new(0),
    });
    let publisher = Arc::new(MessagePublisher::new(broker.clone()));

    let tasks: Vec<_> = (1..=64)
        .map(|i| {
            let publisher = Arc::clone(&publisher);
            tokio::spawn(async move {
                let event = Event::Movie(MovieEvent {
                    movie_id: i,
                    title: "Dune".into(),
                    action: "viewed".into(),
                    user_id: 42,
                });
                publisher.publish(&event).await
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(broker.writers.load(Ordering::SeqCst), 1);
    assert_eq!(inner.messages("movie-events").len(), 64);
    assert!(publisher.is_connected());
}

#[tokio::test]
async fn concurrent_requests_share_one_writer() {
    let inner = MemoryBroker::new();
    let broker = Arc::new(CountingBroker {
        inner: inner.clone(),
        writers: AtomicUsize::new(0),
    });
    let (addr, shutdown) = start_events_server(broker.clone(), 1_048_576).await;

    let requests: Vec<_> = (1..=16)
        .map(|i| {
            let body = json!({"movie_id": i, "title": "Dune", "action": "viewed", "user_id": 42});
            tokio::spawn(async move { post(addr, "movie", body.to_string()).await.status() })
        })
        .collect();
    for request in requests {
        assert_eq!(request.await.unwrap(), 201);
    }

    assert_eq!(broker.writers.load(Ordering::SeqCst), 1);
    assert_eq!(inner.messages("movie-events").len(), 16);

    let _ = shutdown.send(());
}
