//! `strangler proxy`: start the strangler-fig gateway.
//!
//! Builds the configuration snapshot, the cached upstream proxies and the
//! shared random source, then serves until Ctrl+C / SIGTERM.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::cli::ProxyArgs;
use crate::config;
use crate::error::StranglerError;
use crate::logging;
use crate::proxy::random::SharedRng;
use crate::server::{self, AppState};

pub async fn execute(args: ProxyArgs) -> Result<(), StranglerError> {
    logging::init(&args.log);

    let config = config::load_gateway(&args)?;
    let addr = config.listen;

    tracing::info!(
        addr = %addr,
        monolith = %config.monolith_url,
        movies_service = %config.movies_service_url,
        events_service = %config.events_service_url,
        gradual_migration = config.gradual_migration,
        migration_percent = config.migration_percent,
        upstream_timeout_ms = args.upstream_timeout,
        "gateway configuration loaded"
    );

    let state = Arc::new(AppState::new(config, Arc::new(SharedRng::from_entropy())));
    let router = server::build_router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "strangler-fig gateway started");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(server::shutdown_signal())
    .await?;

    tracing::info!(
        forwarded = state.stats.forwarded.load(Ordering::Relaxed),
        failed = state.stats.failed.load(Ordering::Relaxed),
        uptime_secs = state.start_time.elapsed().as_secs(),
        "strangler-fig gateway stopped"
    );
    Ok(())
}
