//! In-process broker.
//!
//! Each topic is an append-only log with a single partition. Readers in the
//! same consumer group share one cursor per topic, so they split messages
//! between them; different groups each see every message. [`MemoryBroker`]
//! is cheap to clone and all clones share the same logs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{Broker, BrokerMessage, MessageReader, MessageWriter};
use crate::error::EventError;

#[derive(Debug, Default)]
struct Logs {
    topics: HashMap<String, Vec<Vec<u8>>>,
    cursors: HashMap<(String, String), usize>,
    closed: bool,
}

#[derive(Debug, Default)]
struct Shared {
    logs: Mutex<Logs>,
    appended: Notify,
}

impl Shared {
    fn logs(&self) -> MutexGuard<'_, Logs> {
        self.logs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    shared: Arc<Shared>,
}

impl MemoryBroker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every payload written to `topic`, in write order.
    #[must_use]
    pub fn messages(&self, topic: &str) -> Vec<Vec<u8>> {
        self.shared
            .logs()
            .topics
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }

    /// Stop the broker. Pending and future reads and writes fail with
    /// [`EventError::BrokerClosed`].
    pub fn close(&self) {
        self.shared.logs().closed = true;
        self.shared.appended.notify_waiters();
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn connect_writer(&self) -> Result<Box<dyn MessageWriter>, EventError> {
        if self.shared.logs().closed {
            return Err(EventError::BrokerClosed);
        }
        Ok(Box::new(MemoryWriter {
            shared: Arc::clone(&self.shared),
        }))
    }

    async fn connect_reader(
        &self,
        topic: &str,
        group: &str,
    ) -> Result<Box<dyn MessageReader>, EventError> {
        if self.shared.logs().closed {
            return Err(EventError::BrokerClosed);
        }
        Ok(Box::new(MemoryReader {
            shared: Arc::clone(&self.shared),
            topic: topic.to_string(),
            group: group.to_string(),
        }))
    }
}

struct MemoryWriter {
    shared: Arc<Shared>,
}

#[async_trait]
impl MessageWriter for MemoryWriter {
    async fn write(&self, topic: &str, payload: &[u8]) -> Result<(), EventError> {
        {
            let mut logs = self.shared.logs();
            if logs.closed {
                return Err(EventError::BrokerClosed);
            }
            logs.topics
                .entry(topic.to_string())
                .or_default()
                .push(payload.to_vec());
        }
        self.shared.appended.notify_waiters();
        Ok(())
    }
}

struct MemoryReader {
    shared: Arc<Shared>,
    topic: String,
    group: String,
}

impl MemoryReader {
    fn try_take(&self) -> Result<Option<BrokerMessage>, EventError> {
        let mut logs = self.shared.logs();
        if logs.closed {
            return Err(EventError::BrokerClosed);
        }
        let Logs {
            topics, cursors, ..
        } = &mut *logs;
        let Some(log) = topics.get(&self.topic) else {
            return Ok(None);
        };
        let cursor = cursors
            .entry((self.group.clone(), self.topic.clone()))
            .or_insert(0);
        let Some(payload) = log.get(*cursor) else {
            return Ok(None);
        };
        let message = BrokerMessage {
            topic: self.topic.clone(),
            partition: 0,
            offset: i64::try_from(*cursor).unwrap_or(i64::MAX),
            payload: payload.clone(),
        };
        *cursor += 1;
        Ok(Some(message))
    }
}

#[async_trait]
impl MessageReader for MemoryReader {
    async fn read(&mut self) -> Result<BrokerMessage, EventError> {
        loop {
            // Register interest before checking, so an append between the
            // check and the await still wakes us.
            let notified = self.shared.appended.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(message) = self.try_take()? {
                return Ok(message);
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn reader_sees_messages_in_order() {
        let broker = MemoryBroker::new();
        let writer = broker.connect_writer().await.unwrap();
        let mut reader = broker.connect_reader("movie-events", "g").await.unwrap();

        writer.write("movie-events", b"one").await.unwrap();
        writer.write("movie-events", b"two").await.unwrap();

        let first = reader.read().await.unwrap();
        let second = reader.read().await.unwrap();
        assert_eq!((first.offset, first.payload.as_slice()), (0, &b"one"[..]));
        assert_eq!((second.offset, second.payload.as_slice()), (1, &b"two"[..]));
        assert_eq!(second.topic, "movie-events");
    }

    #[tokio::test]
    async fn blocked_reader_wakes_on_write() {
        let broker = MemoryBroker::new();
        let mut reader = broker.connect_reader("user-events", "g").await.unwrap();

        let pending = tokio::spawn(async move { reader.read().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let writer = broker.connect_writer().await.unwrap();
        writer.write("user-events", b"hello").await.unwrap();

        let message = tokio::time::timeout(Duration::from_secs(2), pending)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(message.payload, b"hello");
    }

    #[tokio::test]
    async fn groups_have_independent_cursors() {
        let broker = MemoryBroker::new();
        let writer = broker.connect_writer().await.unwrap();
        writer.write("payment-events", b"p").await.unwrap();

        let mut a = broker.connect_reader("payment-events", "a").await.unwrap();
        let mut a2 = broker.connect_reader("payment-events", "a").await.unwrap();
        let mut b = broker.connect_reader("payment-events", "b").await.unwrap();

        assert_eq!(a.read().await.unwrap().payload, b"p");
        assert_eq!(b.read().await.unwrap().payload, b"p");
        // Same group: already consumed
        let second = tokio::time::timeout(Duration::from_millis(50), a2.read()).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn close_fails_pending_reads_and_writes() {
        let broker = MemoryBroker::new();
        let writer = broker.connect_writer().await.unwrap();
        let mut reader = broker.connect_reader("movie-events", "g").await.unwrap();

        let pending = tokio::spawn(async move { reader.read().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        broker.close();

        let result = tokio::time::timeout(Duration::from_secs(2), pending)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(EventError::BrokerClosed)));
        assert!(matches!(
            writer.write("movie-events", b"x").await,
            Err(EventError::BrokerClosed)
        ));
        assert!(broker.connect_writer().await.is_err());
    }
}
