//! Persisted record codec.
//!
//! One `Message` is stored as one flat JSON string:
//!
//! ```text
//! { "isUser": <bool>, "message": <string>, "date": <ISO-8601 string> }
//! ```
//!
//! All three fields are required; extra fields are ignored on read.

use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SerializationError;
use crate::message::{Message, Role};

const NAIVE_ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRecord {
    #[serde(rename = "isUser")]
    pub is_user: bool,
    pub message: String,
    pub date: String,
}

impl From<&Message> for PersistedRecord {
    fn from(message: &Message) -> Self {
        Self {
            is_user: message.is_user(),
            message: message.text().to_string(),
            date: message
                .timestamp()
                .to_rfc3339_opts(SecondsFormat::AutoSi, true),
        }
    }
}

impl TryFrom<PersistedRecord> for Message {
    type Error = SerializationError;

    fn try_from(record: PersistedRecord) -> Result<Self, Self::Error> {
        let timestamp = parse_timestamp(&record.date)?;
        let role = if record.is_user {
            Role::User
        } else {
            Role::Assistant
        };
        Ok(Self::new(role, record.message, timestamp))
    }
}

pub fn encode_message(message: &Message) -> Result<String, SerializationError> {
    Ok(serde_json::to_string(&PersistedRecord::from(message))?)
}

pub fn decode_message(raw: &str) -> Result<Message, SerializationError> {
    let record: PersistedRecord = serde_json::from_str(raw)?;
    Message::try_from(record)
}

/// RFC 3339 with an offset, or a naive ISO-8601 date-time taken as local time.
fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, SerializationError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(value, NAIVE_ISO_FORMAT)
        .ok()
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| SerializationError::InvalidTimestamp {
            value: value.to_string(),
        })
}
