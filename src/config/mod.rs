//! Configuration loading for the gateway and the event service.
//!
//! Raw values arrive through clap (flags with environment fallbacks) and
//! are turned into the immutable snapshots in [`model`]. Validation of the
//! individual values lives in [`validation`].

pub mod model;
pub mod validation;

use std::net::SocketAddr;
use std::time::Duration;

use crate::cli::{EventsArgs, ProxyArgs};
use crate::error::StranglerError;
use model::{EventsConfig, GatewayConfig, RestartPolicy};

/// Build the gateway snapshot. Fails on malformed upstream URLs or listen
/// address; a bad migration percentage is logged and treated as `0`.
pub fn load_gateway(args: &ProxyArgs) -> Result<GatewayConfig, StranglerError> {
    let listen: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;

    let monolith_url = upstream("MONOLITH_URL", &args.monolith_url)?;
    let movies_service_url = upstream("MOVIES_SERVICE_URL", &args.movies_service_url)?;
    let events_service_url = upstream("EVENTS_SERVICE_URL", &args.events_service_url)?;

    let migration_percent = validation::parse_migration_percent(&args.movies_migration_percent)
        .unwrap_or_else(|fallback| {
            tracing::warn!(
                value = %args.movies_migration_percent,
                fallback,
                "invalid MOVIES_MIGRATION_PERCENT, using fallback"
            );
            fallback
        });

    Ok(GatewayConfig {
        listen,
        monolith_url,
        movies_service_url,
        events_service_url,
        gradual_migration: validation::parse_gate(&args.gradual_migration),
        migration_percent,
        upstream_timeout: Duration::from_millis(args.upstream_timeout),
    })
}

pub fn load_events(args: &EventsArgs) -> Result<EventsConfig, StranglerError> {
    let listen: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;

    let consumer_group = args.consumer_group.trim();
    if consumer_group.is_empty() {
        return Err(StranglerError::Config {
            var: "CONSUMER_GROUP",
            message: "consumer group cannot be empty".into(),
        });
    }

    Ok(EventsConfig {
        listen,
        broker: args.broker,
        kafka_brokers: validation::parse_broker_list(&args.kafka_brokers),
        consumer_group: consumer_group.to_string(),
        restart_policy: RestartPolicy {
            max_restarts: args.consumer_max_restarts,
            backoff: Duration::from_millis(args.consumer_restart_backoff),
        },
        max_body: args.max_body,
    })
}

fn upstream(var: &'static str, raw: &str) -> Result<url::Url, StranglerError> {
    validation::parse_upstream_url(raw).map_err(|message| StranglerError::Config { var, message })
}
