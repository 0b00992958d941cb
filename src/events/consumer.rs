//! One long-running consumer task per event topic.
//!
//! Every task walks the same states:
//!
//! - **initializing**: open a read connection for its topic in the shared
//!   consumer group
//! - **running**: read messages one at a time and log topic, partition,
//!   offset and payload, in the order the broker returns them
//! - **terminated**: a read (or connect) error ends the task
//!
//! With the default [`RestartPolicy`] a single error stops that topic's
//! consumption for the rest of the process. A non-zero `max_restarts`
//! reopens the reader after an exponential backoff instead, but only for
//! transient broker errors; a closed broker always ends the task.
//! Consumption is observational: nothing is acknowledged explicitly,
//! filtered or forwarded.
//!
//! All tasks watch a shutdown channel; sending `true` or dropping the
//! sender stops them at their next wait point.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::broker::Broker;
use crate::config::model::RestartPolicy;
use crate::error::EventError;
use crate::events::model::EventKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Initializing,
    Running,
    Terminated,
}

impl ConsumerState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Terminated => "terminated",
        }
    }
}

#[derive(Debug)]
pub enum ConsumerExit {
    Shutdown,
    Failed(EventError),
}

#[derive(Debug)]
pub struct ConsumerStats {
    consumed: AtomicU64,
    last_offset: AtomicI64,
}

impl Default for ConsumerStats {
    fn default() -> Self {
        Self {
            consumed: AtomicU64::new(0),
            last_offset: AtomicI64::new(-1),
        }
    }
}

impl ConsumerStats {
    #[must_use]
    pub fn consumed(&self) -> u64 {
        self.consumed.load(Ordering::Relaxed)
    }

    /// Offset of the last message read, `None` before the first one.
    #[must_use]
    pub fn last_offset(&self) -> Option<i64> {
        let offset = self.last_offset.load(Ordering::Relaxed);
        (offset >= 0).then_some(offset)
    }

    fn record(&self, offset: i64) {
        self.consumed.fetch_add(1, Ordering::Relaxed);
        self.last_offset.store(offset, Ordering::Relaxed);
    }
}

struct TopicConsumer {
    topic: &'static str,
    stats: Arc<ConsumerStats>,
    handle: JoinHandle<ConsumerExit>,
}

pub struct ConsumerPool {
    consumers: Vec<TopicConsumer>,
}

impl ConsumerPool {
    /// Start one consumer per topic in [`EventKind::ALL`].
    #[must_use]
    pub fn spawn(
        broker: &Arc<dyn Broker>,
        group: &str,
        policy: RestartPolicy,
        shutdown: &watch::Receiver<bool>,
    ) -> Self {
        let consumers = EventKind::ALL
            .into_iter()
            .map(|kind| {
                let topic = kind.topic();
                let stats = Arc::new(ConsumerStats::default());
                let task = TopicTask {
                    broker: Arc::clone(broker),
                    topic,
                    group: group.to_string(),
                    policy,
                    stats: Arc::clone(&stats),
                    shutdown: shutdown.clone(),
                };
                TopicConsumer {
                    topic,
                    stats,
                    handle: tokio::spawn(task.run()),
                }
            })
            .collect();
        Self { consumers }
    }

    pub fn topics(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.consumers.iter().map(|c| c.topic)
    }

    #[must_use]
    pub fn stats(&self, topic: &str) -> Option<Arc<ConsumerStats>> {
        self.consumers
            .iter()
            .find(|c| c.topic == topic)
            .map(|c| Arc::clone(&c.stats))
    }

    /// Whether the task for `topic` has ended.
    #[must_use]
    pub fn is_finished(&self, topic: &str) -> bool {
        self.consumers
            .iter()
            .find(|c| c.topic == topic)
            .is_some_and(|c| c.handle.is_finished())
    }

    /// Wait for every task to end and collect how each one ended.
    pub async fn join(self) -> Vec<(&'static str, ConsumerExit)> {
        let mut exits = Vec::with_capacity(self.consumers.len());
        for consumer in self.consumers {
            let exit = match consumer.handle.await {
                Ok(exit) => exit,
                Err(join_err) => {
                    error!(topic = consumer.topic, error = %join_err, "consumer task panicked");
                    ConsumerExit::Failed(EventError::ConsumeFailed {
                        topic: consumer.topic.to_string(),
                        cause: join_err.to_string(),
                    })
                }
            };
            exits.push((consumer.topic, exit));
        }
        exits
    }
}

struct TopicTask {
    broker: Arc<dyn Broker>,
    topic: &'static str,
    group: String,
    policy: RestartPolicy,
    stats: Arc<ConsumerStats>,
    shutdown: watch::Receiver<bool>,
}

impl TopicTask {
    async fn run(mut self) -> ConsumerExit {
        let mut restarts = 0;
        loop {
            let error = match self.consume().await {
                ConsumerExit::Shutdown => {
                    self.log_state(ConsumerState::Terminated, "consumer stopped by shutdown");
                    return ConsumerExit::Shutdown;
                }
                ConsumerExit::Failed(e) => e,
            };

            if !error.is_transient() || restarts >= self.policy.max_restarts {
                error!(
                    topic = self.topic,
                    consumer_group = %self.group,
                    state = ConsumerState::Terminated.as_str(),
                    restarts,
                    error = %error,
                    "consumer terminated, no further messages will be read from this topic"
                );
                return ConsumerExit::Failed(error);
            }

            restarts += 1;
            let delay = self.policy.backoff_for(restarts);
            warn!(
                topic = self.topic,
                error = %error,
                restart = restarts,
                max_restarts = self.policy.max_restarts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "consumer failed, restarting after backoff"
            );
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = wait_for_shutdown(&mut self.shutdown) => {
                    self.log_state(ConsumerState::Terminated, "consumer stopped by shutdown");
                    return ConsumerExit::Shutdown;
                }
            }
        }
    }

    /// One connection lifetime: initializing, then running until an error
    /// or shutdown.
    async fn consume(&mut self) -> ConsumerExit {
        self.log_state(ConsumerState::Initializing, "opening reader");

        let connect = self.broker.connect_reader(self.topic, &self.group);
        let mut reader = tokio::select! {
            result = connect => match result {
                Ok(reader) => reader,
                Err(e) => return ConsumerExit::Failed(e),
            },
            () = wait_for_shutdown(&mut self.shutdown) => return ConsumerExit::Shutdown,
        };

        self.log_state(ConsumerState::Running, "consumer started");

        loop {
            tokio::select! {
                biased;
                () = wait_for_shutdown(&mut self.shutdown) => return ConsumerExit::Shutdown,
                result = reader.read() => match result {
                    Ok(message) => {
                        self.stats.record(message.offset);
                        info!(
                            topic = %message.topic,
                            partition = message.partition,
                            offset = message.offset,
                            payload = %String::from_utf8_lossy(&message.payload),
                            "consumed message"
                        );
                    }
                    Err(e) => return ConsumerExit::Failed(e),
                },
            }
        }
    }

    fn log_state(&self, state: ConsumerState, message: &str) {
        info!(
            topic = self.topic,
            consumer_group = %self.group,
            state = state.as_str(),
            "{message}"
        );
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    // A closed channel counts as shutdown
    let _ = shutdown.wait_for(|stop| *stop).await;
}
