//! Event ingestion and consumption.
//!
//! - [`model`]: event kinds, payload structs and validation
//! - [`publisher`]: lazily connected, shared broker writer
//! - [`consumer`]: one logging consumer task per topic
//! - [`server`]: the HTTP ingestion routes

pub mod consumer;
pub mod model;
pub mod publisher;
pub mod server;

pub use model::{Event, EventKind, MovieEvent, PaymentEvent, UserEvent};
pub use publisher::MessagePublisher;
