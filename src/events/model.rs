//! Domain events and the fixed event-kind to topic table.
//!
//! Decoding is two steps: `serde_json` fills the variant struct, with every
//! absent field left at its zero value, then [`Event::validate`] rejects
//! any zero or empty required field. A timestamp at the Unix epoch or at
//! `0001-01-01T00:00:00Z` counts as zero. Decoding alone never guarantees a
//! usable event.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EventError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Movie,
    User,
    Payment,
}

impl EventKind {
    pub const ALL: [Self; 3] = [Self::Movie, Self::User, Self::Payment];

    #[must_use]
    pub const fn topic(self) -> &'static str {
        match self {
            Self::Movie => "movie-events",
            Self::User => "user-events",
            Self::Payment => "payment-events",
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::User => "user",
            Self::Payment => "payment",
        }
    }

    /// Decode a JSON body as this kind's event and validate it.
    pub fn decode(self, body: &[u8]) -> Result<Event, EventError> {
        let event = match self {
            Self::Movie => Event::Movie(parse(body)?),
            Self::User => Event::User(parse(body)?),
            Self::Payment => Event::Payment(parse(body)?),
        };
        event.validate()?;
        Ok(event)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn parse<T: for<'de> Deserialize<'de>>(body: &[u8]) -> Result<T, EventError> {
    serde_json::from_slice(body).map_err(EventError::InvalidPayload)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovieEvent {
    pub movie_id: i64,
    pub title: String,
    pub action: String,
    pub user_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserEvent {
    pub user_id: i64,
    pub username: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentEvent {
    pub payment_id: i64,
    pub user_id: i64,
    pub amount: f64,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// Serializes as the bare variant struct; that JSON is the canonical
/// broker payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Event {
    Movie(MovieEvent),
    User(UserEvent),
    Payment(PaymentEvent),
}

impl Event {
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Movie(_) => EventKind::Movie,
            Self::User(_) => EventKind::User,
            Self::Payment(_) => EventKind::Payment,
        }
    }

    /// Every declared field is required and must be non-zero / non-empty.
    pub fn validate(&self) -> Result<(), EventError> {
        match self {
            Self::Movie(e) => {
                require_id("movie_id", e.movie_id)?;
                require_text("title", &e.title)?;
                require_text("action", &e.action)?;
                require_id("user_id", e.user_id)
            }
            Self::User(e) => {
                require_id("user_id", e.user_id)?;
                require_text("username", &e.username)?;
                require_text("action", &e.action)?;
                require_instant("timestamp", &e.timestamp)
            }
            Self::Payment(e) => {
                require_id("payment_id", e.payment_id)?;
                require_id("user_id", e.user_id)?;
                if e.amount == 0.0 || !e.amount.is_finite() {
                    return Err(EventError::MissingField { field: "amount" });
                }
                require_text("status", &e.status)?;
                require_instant("timestamp", &e.timestamp)
            }
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, EventError> {
        serde_json::to_vec(self).map_err(|e| EventError::SerializationFailed {
            kind: self.kind().name(),
            cause: e.to_string(),
        })
    }
}

const fn require_id(field: &'static str, value: i64) -> Result<(), EventError> {
    if value == 0 {
        Err(EventError::MissingField { field })
    } else {
        Ok(())
    }
}

fn require_text(field: &'static str, value: &str) -> Result<(), EventError> {
    if value.is_empty() {
        Err(EventError::MissingField { field })
    } else {
        Ok(())
    }
}

/// `0001-01-01T00:00:00Z`, the zero instant some producers send for an
/// unset timestamp.
const YEAR_ONE_SECS: i64 = -62_135_596_800;

/// Both the Unix epoch and year one count as "not set".
fn require_instant(field: &'static str, value: &DateTime<Utc>) -> Result<(), EventError> {
    let year_one = value.timestamp() == YEAR_ONE_SECS && value.timestamp_subsec_nanos() == 0;
    if *value == DateTime::<Utc>::default() || year_one {
        Err(EventError::MissingField { field })
    } else {
        Ok(())
    }
}
