//! `strangler events`: start the event service.
//!
//! Opens the broker, spawns one consumer per topic, and serves the ingestion
//! routes. On Ctrl+C / SIGTERM the HTTP server drains, the consumers are
//! told to stop and the publisher is flushed.

use std::sync::Arc;

use crate::broker;
use crate::cli::EventsArgs;
use crate::config;
use crate::error::StranglerError;
use crate::events::consumer::{ConsumerExit, ConsumerPool};
use crate::events::publisher::MessagePublisher;
use crate::events::server::{build_router, EventsState};
use crate::logging;
use crate::server::shutdown_signal;

pub async fn execute(args: EventsArgs) -> Result<(), StranglerError> {
    logging::init(&args.log);

    let config = config::load_events(&args)?;
    let broker = broker::from_config(&config)?;

    tracing::info!(
        addr = %config.listen,
        broker = broker.name(),
        bootstrap_servers = %config.bootstrap_servers(),
        consumer_group = %config.consumer_group,
        max_restarts = config.restart_policy.max_restarts,
        "event service configuration loaded"
    );

    // Dropping shutdown_tx also stops the consumers
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let pool = ConsumerPool::spawn(
        &broker,
        &config.consumer_group,
        config.restart_policy,
        &shutdown_rx,
    );
    drop(shutdown_rx);

    let state = Arc::new(EventsState {
        publisher: MessagePublisher::new(Arc::clone(&broker)),
    });
    let router = build_router(Arc::clone(&state), config.max_body);

    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    tracing::info!(
        addr = %config.listen,
        topics = ?pool.topics().collect::<Vec<_>>(),
        "event service started"
    );

    let graceful_shutdown = async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(graceful_shutdown)
        .await?;

    for (topic, exit) in pool.join().await {
        match exit {
            ConsumerExit::Shutdown => tracing::debug!(topic, "consumer exited"),
            ConsumerExit::Failed(e) => {
                tracing::warn!(topic, error = %e, "consumer had already terminated");
            }
        }
    }

    if let Err(e) = state.publisher.close().await {
        tracing::error!(error = %e, "failed to flush publisher");
    }

    tracing::info!("event service stopped");
    Ok(())
}
