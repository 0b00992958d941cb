//! Strangler is a strangler-fig migration gateway plus a small domain event
//! pipeline.
//!
//! The gateway sits in front of a legacy monolith and, per request, sends
//! movie traffic either to the monolith or to the new movies service
//! according to a configurable percentage. Event traffic goes to the event
//! service, which validates domain events, publishes them to per-kind topics
//! and runs one logging consumer per topic.
//!
//! # Architecture
//!
//! - [`cli`]: command-line argument parsing with clap derive macros.
//! - [`cmd`]: subcommand dispatch (`proxy`, `events`).
//! - [`config`]: immutable configuration snapshots and value validation.
//! - [`error`]: unified error types using `thiserror`.
//! - [`health`]: health endpoint handlers for both processes.
//! - [`logging`]: structured tracing setup with JSON and pretty-print output.
//! - [`proxy`]: routing decisions, header rewriting and upstream forwarding.
//! - [`server`]: gateway state, router, HTTP client and graceful shutdown.
//! - [`broker`]: broker traits with Kafka and in-memory backends.
//! - [`events`]: event model, publisher, consumers and ingestion routes.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `kafka` | Kafka broker backend via `rdkafka` |

// Binary crate: public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod broker;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod events;
pub mod health;
pub mod logging;
pub mod proxy;
pub mod server;
