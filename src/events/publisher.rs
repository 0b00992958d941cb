//! Broker publisher shared by every ingestion request.
//!
//! The write connection is opened lazily on the first publish and at most
//! once for the life of the publisher: concurrent first callers wait on the
//! same `OnceCell` initialization instead of racing to connect. A failed
//! attempt leaves the cell empty so a later call can try again. Publishing
//! never retries.

use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::broker::{Broker, MessageWriter};
use crate::error::EventError;
use crate::events::model::Event;

pub struct MessagePublisher {
    broker: Arc<dyn Broker>,
    writer: OnceCell<Box<dyn MessageWriter>>,
}

impl MessagePublisher {
    #[must_use]
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self {
            broker,
            writer: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.writer.initialized()
    }

    async fn writer(&self) -> Result<&dyn MessageWriter, EventError> {
        let writer = self
            .writer
            .get_or_try_init(|| async {
                let writer = self.broker.connect_writer().await?;
                tracing::info!(broker = self.broker.name(), "message writer connected");
                Ok::<_, EventError>(writer)
            })
            .await?;
        Ok(writer.as_ref())
    }

    /// Serialize `event` and write it to its kind's topic.
    ///
    /// Returns the payload that was written.
    pub async fn publish(&self, event: &Event) -> Result<Vec<u8>, EventError> {
        let payload = event.to_bytes()?;
        let topic = event.kind().topic();
        self.writer().await?.write(topic, &payload).await?;
        Ok(payload)
    }

    /// Flush outstanding messages if a writer was ever opened.
    pub async fn close(&self) -> Result<(), EventError> {
        match self.writer.get() {
            Some(writer) => writer.flush().await,
            None => Ok(()),
        }
    }
}
