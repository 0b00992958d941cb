//! Kafka backend built on `rdkafka`.
//!
//! Writers are `FutureProducer`s; messages carry no key and no headers, so
//! partitioning is left to the producer's default partitioner. Readers are
//! `StreamConsumer`s subscribed to a single topic inside the shared
//! consumer group, starting from the earliest offset with auto-commit.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::Message;
use tracing::{debug, info};

use super::{Broker, BrokerMessage, MessageReader, MessageWriter};
use crate::error::EventError;

pub const DEFAULT_CLIENT_ID: &str = "strangler-events";

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct KafkaBroker {
    bootstrap_servers: String,
    client_id: String,
}

impl KafkaBroker {
    pub fn new(bootstrap_servers: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            bootstrap_servers: bootstrap_servers.into(),
            client_id: client_id.into(),
        }
    }

    fn base_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("client.id", &self.client_id);
        config
    }

    fn connection_failed(&self, e: &rdkafka::error::KafkaError) -> EventError {
        EventError::ConnectionFailed {
            brokers: self.bootstrap_servers.clone(),
            cause: e.to_string(),
        }
    }
}

#[async_trait]
impl Broker for KafkaBroker {
    fn name(&self) -> &'static str {
        "kafka"
    }

    async fn connect_writer(&self) -> Result<Box<dyn MessageWriter>, EventError> {
        let producer: FutureProducer = self
            .base_config()
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| self.connection_failed(&e))?;

        info!(
            bootstrap_servers = %self.bootstrap_servers,
            client_id = %self.client_id,
            "kafka producer created"
        );
        Ok(Box::new(KafkaWriter { producer }))
    }

    async fn connect_reader(
        &self,
        topic: &str,
        group: &str,
    ) -> Result<Box<dyn MessageReader>, EventError> {
        let consumer: StreamConsumer = self
            .base_config()
            .set("group.id", group)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "true")
            .set("session.timeout.ms", "30000")
            .create()
            .map_err(|e| self.connection_failed(&e))?;

        consumer
            .subscribe(&[topic])
            .map_err(|e| EventError::ConsumeFailed {
                topic: topic.to_string(),
                cause: e.to_string(),
            })?;

        info!(topic = %topic, consumer_group = %group, "kafka consumer subscribed");
        Ok(Box::new(KafkaReader {
            consumer,
            topic: topic.to_string(),
        }))
    }
}

struct KafkaWriter {
    producer: FutureProducer,
}

#[async_trait]
impl MessageWriter for KafkaWriter {
    async fn write(&self, topic: &str, payload: &[u8]) -> Result<(), EventError> {
        let record = FutureRecord::<(), [u8]>::to(topic).payload(payload);
        let (partition, offset) = self
            .producer
            .send(record, SEND_TIMEOUT)
            .await
            .map_err(|(err, _)| EventError::PublishFailed {
                topic: topic.to_string(),
                cause: err.to_string(),
            })?;
        debug!(topic = %topic, partition, offset, "kafka delivery confirmed");
        Ok(())
    }

    async fn flush(&self) -> Result<(), EventError> {
        let flush_failed = |cause: String| EventError::PublishFailed {
            topic: "*".to_string(),
            cause,
        };
        // librdkafka's flush polls synchronously until the queue drains
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || producer.flush(SEND_TIMEOUT))
            .await
            .map_err(|e| flush_failed(e.to_string()))?
            .map_err(|e| flush_failed(e.to_string()))
    }
}

struct KafkaReader {
    consumer: StreamConsumer,
    topic: String,
}

#[async_trait]
impl MessageReader for KafkaReader {
    async fn read(&mut self) -> Result<BrokerMessage, EventError> {
        let message = self
            .consumer
            .recv()
            .await
            .map_err(|e| EventError::ConsumeFailed {
                topic: self.topic.clone(),
                cause: e.to_string(),
            })?;
        Ok(BrokerMessage {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            payload: message.payload().unwrap_or_default().to_vec(),
        })
    }
}
