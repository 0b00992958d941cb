//! Message broker abstraction.
//!
//! The event pipeline talks to the broker only through the [`Broker`],
//! [`MessageWriter`] and [`MessageReader`] traits. Two backends exist:
//!
//! - [`kafka::KafkaBroker`] (cargo feature `kafka`, via `rdkafka`)
//! - [`memory::MemoryBroker`], an in-process broker for local runs and tests

#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::cli::BrokerKind;
use crate::config::model::EventsConfig;
use crate::error::{EventError, StranglerError};

/// A message as delivered to a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Vec<u8>,
}

// async_trait is required here because the broker is used as Arc<dyn Broker>
// and native async fn in traits does not support dyn dispatch.
#[async_trait]
pub trait Broker: Send + Sync {
    fn name(&self) -> &'static str;

    /// Open a write connection. Safe to share between concurrent writers.
    async fn connect_writer(&self) -> Result<Box<dyn MessageWriter>, EventError>;

    /// Open a read connection bound to one topic and consumer group.
    async fn connect_reader(
        &self,
        topic: &str,
        group: &str,
    ) -> Result<Box<dyn MessageReader>, EventError>;
}

#[async_trait]
pub trait MessageWriter: Send + Sync {
    /// Write one message with no key and no headers.
    async fn write(&self, topic: &str, payload: &[u8]) -> Result<(), EventError>;

    /// Wait for buffered messages to be delivered.
    async fn flush(&self) -> Result<(), EventError> {
        Ok(())
    }
}

#[async_trait]
pub trait MessageReader: Send {
    /// Block until the next message is available. Cancel-safe.
    async fn read(&mut self) -> Result<BrokerMessage, EventError>;
}

pub fn from_config(config: &EventsConfig) -> Result<Arc<dyn Broker>, StranglerError> {
    match config.broker {
        BrokerKind::Memory => Ok(Arc::new(memory::MemoryBroker::new())),

        #[cfg(feature = "kafka")]
        BrokerKind::Kafka => Ok(Arc::new(kafka::KafkaBroker::new(
            config.bootstrap_servers(),
            kafka::DEFAULT_CLIENT_ID,
        ))),

        #[cfg(not(feature = "kafka"))]
        BrokerKind::Kafka => Err(StranglerError::UnsupportedBroker(
            "kafka (this build lacks the `kafka` feature; rebuild with --features kafka or use --broker memory)"
                .into(),
        )),
    }
}
