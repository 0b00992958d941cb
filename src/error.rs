//! Unified error types for Strangler.
//!
//! Defines [`StranglerError`] (process-level startup and runtime failures),
//! [`ProxyError`] (a single forwarding attempt) and [`EventError`] (the
//! event ingestion / broker pipeline). All use `thiserror` for `Display`
//! and `Error` derives. Error messages name the offending setting or topic.

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StranglerError {
    #[error("Invalid {var}: {message}")]
    Config { var: &'static str, message: String },

    #[error("Invalid address: {0}")]
    AddressParse(#[from] std::net::AddrParseError),

    #[error("Unsupported broker backend: '{0}'")]
    UnsupportedBroker(String),

    #[error("{0}")]
    Event(#[from] EventError),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Invalid upstream URI: {0}")]
    InvalidUpstreamUri(#[from] http::Error),

    #[error("Upstream request failed: {source}")]
    Upstream {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Upstream timed out after {0} ms")]
    Timeout(u64),
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    // Client errors (4xx, never retried)
    #[error("Invalid event payload: {0}")]
    InvalidPayload(#[source] serde_json::Error),

    #[error("Missing required field '{field}'")]
    MissingField { field: &'static str },

    // Publishing errors (5xx)
    #[error("Failed to serialize {kind} event: {cause}")]
    SerializationFailed { kind: &'static str, cause: String },

    #[error("Connection to broker {brokers} failed: {cause}")]
    ConnectionFailed { brokers: String, cause: String },

    #[error("Failed to publish to topic {topic}: {cause}")]
    PublishFailed { topic: String, cause: String },

    // Consuming errors
    #[error("Failed to consume from topic {topic}: {cause}")]
    ConsumeFailed { topic: String, cause: String },

    #[error("Broker is closed")]
    BrokerClosed,
}

impl EventError {
    /// The caller sent something unusable; answer 4xx and do not log it as a fault.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidPayload(_) | Self::MissingField { .. })
    }

    /// Broker-side failure that could succeed on a later attempt.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::PublishFailed { .. } | Self::ConsumeFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_classified() {
        let missing = EventError::MissingField { field: "title" };
        assert!(missing.is_client_error());
        assert!(!missing.is_transient());

        let decode = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(EventError::InvalidPayload(decode).is_client_error());
    }

    #[test]
    fn broker_errors_are_transient() {
        let err = EventError::PublishFailed {
            topic: "movie-events".into(),
            cause: "broker down".into(),
        };
        assert!(err.is_transient());
        assert!(!err.is_client_error());
        assert!(!EventError::BrokerClosed.is_transient());
    }

    #[test]
    fn config_error_names_the_variable() {
        let err = StranglerError::Config {
            var: "MONOLITH_URL",
            message: "'ftp://x' uses unsupported scheme 'ftp'".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid MONOLITH_URL: 'ftp://x' uses unsupported scheme 'ftp'"
        );
    }
}
