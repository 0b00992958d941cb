//! Command-line interface definitions using clap derive macros.
//!
//! Contains the top-level [`Cli`] parser, the [`Commands`] enum for the two
//! processes of the system (proxy, events) and their argument structs.
//! Every flag has an environment variable equivalent for container
//! deployments; the variable names are the ones the deployment manifests use.

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "strangler",
    version,
    about = "Strangler-fig migration gateway and domain event pipeline",
    propagate_version = true,
    after_help = "\x1b[1mQuick start:\x1b[0m\n  \
        strangler proxy                      Start the gateway on :8000\n  \
        strangler events --broker memory     Start the event service without Kafka"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the strangler-fig gateway
    Proxy(Box<ProxyArgs>),

    /// Start the event ingestion service and topic consumers
    Events(Box<EventsArgs>),
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        strangler proxy                                          Everything to the monolith\n  \
        GRADUAL_MIGRATION=true MOVIES_MIGRATION_PERCENT=25 \\\n    \
        strangler proxy --pretty                                 25% of /api/movies to the new service")]
pub struct ProxyArgs {
    /// Listen port
    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Listen address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    // -- Upstreams --
    /// Monolith base URL
    #[arg(
        long,
        env = "MONOLITH_URL",
        default_value = "http://localhost:8080",
        help_heading = "Upstreams"
    )]
    pub monolith_url: String,

    /// Movies service base URL
    #[arg(
        long,
        env = "MOVIES_SERVICE_URL",
        default_value = "http://localhost:8081",
        help_heading = "Upstreams"
    )]
    pub movies_service_url: String,

    /// Events service base URL
    #[arg(
        long,
        env = "EVENTS_SERVICE_URL",
        default_value = "http://localhost:8082",
        help_heading = "Upstreams"
    )]
    pub events_service_url: String,

    // -- Migration --
    /// Enable the probabilistic split for /api/movies ("true" enables)
    #[arg(
        long,
        env = "GRADUAL_MIGRATION",
        default_value = "false",
        help_heading = "Migration"
    )]
    pub gradual_migration: String,

    /// Share of /api/movies traffic sent to the movies service (0-100)
    #[arg(
        long,
        env = "MOVIES_MIGRATION_PERCENT",
        default_value = "0",
        help_heading = "Migration"
    )]
    pub movies_migration_percent: String,

    // -- Tuning --
    /// Upstream response timeout in milliseconds
    #[arg(
        long = "upstream-timeout",
        env = "UPSTREAM_TIMEOUT_MS",
        default_value_t = 30_000,
        help_heading = "Tuning"
    )]
    pub upstream_timeout: u64,

    #[command(flatten)]
    pub log: LogArgs,
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        strangler events --broker kafka                    Kafka on localhost:9092\n  \
        strangler events --kafka-brokers k1:9092,k2:9092   Explicit broker list\n  \
        strangler events --broker memory --pretty          In-process broker for local dev")]
pub struct EventsArgs {
    /// Listen port
    #[arg(short, long, env = "PORT", default_value_t = 8082)]
    pub port: u16,

    /// Listen address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    // -- Broker --
    /// Broker backend (defaults to kafka when built with the `kafka` feature)
    #[arg(
        long,
        env = "BROKER",
        value_enum,
        default_value_t = BrokerKind::default(),
        help_heading = "Broker"
    )]
    pub broker: BrokerKind,

    /// Comma-separated Kafka broker addresses
    #[arg(
        long,
        env = "KAFKA_BROKERS",
        default_value = "localhost:9092",
        help_heading = "Broker"
    )]
    pub kafka_brokers: String,

    /// Consumer group shared by all topic consumers
    #[arg(
        long,
        env = "CONSUMER_GROUP",
        default_value = "cinemaabyss-events-consumer-group",
        help_heading = "Broker"
    )]
    pub consumer_group: String,

    /// Times a failed topic consumer is reopened (0 = stop on first error)
    #[arg(
        long,
        env = "CONSUMER_MAX_RESTARTS",
        default_value_t = 0,
        help_heading = "Broker"
    )]
    pub consumer_max_restarts: u32,

    /// Initial consumer restart backoff in milliseconds (doubles per attempt)
    #[arg(
        long = "consumer-restart-backoff",
        env = "CONSUMER_RESTART_BACKOFF_MS",
        default_value_t = 1000,
        help_heading = "Broker"
    )]
    pub consumer_restart_backoff: u64,

    // -- Tuning --
    /// Max request body size in bytes
    #[arg(
        long,
        env = "MAX_BODY_SIZE",
        default_value_t = 1_048_576,
        help_heading = "Tuning"
    )]
    pub max_body: usize,

    #[command(flatten)]
    pub log: LogArgs,
}

#[derive(Args)]
pub struct LogArgs {
    /// Log level
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Force pretty (human-readable) log output
    #[arg(long)]
    pub pretty: bool,

    /// Force JSON log output (overrides TTY detection)
    #[arg(long, conflicts_with = "pretty")]
    pub json: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BrokerKind {
    Kafka,
    Memory,
}

impl Default for BrokerKind {
    /// Kafka when this build can talk to it, the in-process broker otherwise.
    fn default() -> Self {
        if cfg!(feature = "kafka") {
            Self::Kafka
        } else {
            Self::Memory
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_defaults() {
        let cli = Cli::try_parse_from(["strangler", "proxy"]).unwrap();
        let Some(Commands::Proxy(args)) = cli.command else {
            panic!("expected proxy subcommand");
        };
        assert_eq!(args.monolith_url, "http://localhost:8080");
        assert_eq!(args.movies_service_url, "http://localhost:8081");
        assert_eq!(args.events_service_url, "http://localhost:8082");
        assert_eq!(args.gradual_migration, "false");
        assert_eq!(args.movies_migration_percent, "0");
    }

    #[test]
    fn events_defaults() {
        let cli = Cli::try_parse_from(["strangler", "events"]).unwrap();
        let Some(Commands::Events(args)) = cli.command else {
            panic!("expected events subcommand");
        };
        assert_eq!(args.broker, BrokerKind::default());
        assert_eq!(args.kafka_brokers, "localhost:9092");
        assert_eq!(args.consumer_group, "cinemaabyss-events-consumer-group");
        assert_eq!(args.consumer_max_restarts, 0);
    }

    #[test]
    fn default_broker_matches_build() {
        let expected = if cfg!(feature = "kafka") {
            BrokerKind::Kafka
        } else {
            BrokerKind::Memory
        };
        assert_eq!(BrokerKind::default(), expected);
    }

    #[test]
    fn pretty_and_json_conflict() {
        let result = Cli::try_parse_from(["strangler", "proxy", "--pretty", "--json"]);
        assert!(result.is_err());
    }
}
