//! Immutable configuration snapshots for the two processes.
//!
//! [`GatewayConfig`] drives routing and proxying, [`EventsConfig`] drives
//! the event service and its consumers. Both are built once at startup by
//! [`crate::config::load_gateway`] / [`crate::config::load_events`] and
//! shared read-only behind an `Arc` afterwards.

use std::net::SocketAddr;
use std::time::Duration;

use url::Url;

use crate::cli::BrokerKind;

pub const DEFAULT_KAFKA_BROKERS: &str = "localhost:9092";

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub listen: SocketAddr,
    pub monolith_url: Url,
    pub movies_service_url: Url,
    pub events_service_url: Url,
    pub gradual_migration: bool,
    /// Always within `0..=100`; coerced at load time.
    pub migration_percent: u8,
    pub upstream_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct EventsConfig {
    pub listen: SocketAddr,
    pub broker: BrokerKind,
    pub kafka_brokers: Vec<String>,
    pub consumer_group: String,
    pub restart_policy: RestartPolicy,
    pub max_body: usize,
}

impl EventsConfig {
    #[must_use]
    pub fn bootstrap_servers(&self) -> String {
        self.kafka_brokers.join(",")
    }
}

/// How a topic consumer reacts to a read failure.
///
/// `max_restarts == 0` stops the consumer for good on its first error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    pub max_restarts: u32,
    pub backoff: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_restarts: 0,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RestartPolicy {
    /// Backoff before restart number `attempt` (1-based), doubling each time
    /// and capped at one minute.
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.backoff
            .saturating_mul(factor)
            .min(Duration::from_secs(60))
    }
}
