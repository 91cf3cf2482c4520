//! Message envelope and its JSON wire codec.
//!
//! The wire contract is deliberately lenient on the header: missing
//! `messageId`/`messageType` decode as empty strings, a missing version
//! defaults to `v1`, and a missing or malformed timestamp falls back to the
//! current time. Only unparseable JSON is a decode failure.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

use crate::error::DecodeError;

pub const ENVELOPE_VERSION: &str = "v1";

/// Routing and tracing metadata for a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageHeader {
    pub message_id: String,
    pub message_type: String,
    pub version: String,
    #[serde(
        serialize_with = "serialize_timestamp",
        deserialize_with = "deserialize_timestamp"
    )]
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Option<String>,
    pub source: Option<String>,
}

impl Default for MessageHeader {
    fn default() -> Self {
        Self {
            message_id: String::new(),
            message_type: String::new(),
            version: ENVELOPE_VERSION.to_string(),
            timestamp: Utc::now(),
            correlation_id: None,
            source: None,
        }
    }
}

/// Opaque structured payload carried by a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageBody {
    pub payload: Value,
}

/// The header+payload envelope, immutable once constructed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    pub header: MessageHeader,
    pub body: MessageBody,
}

impl Message {
    /// Build a new message with a generated id and the current timestamp.
    pub fn new(
        message_type: impl Into<String>,
        payload: Value,
        source: impl Into<String>,
        correlation_id: Option<String>,
    ) -> Self {
        Self {
            header: MessageHeader {
                message_id: Uuid::new_v4().to_string(),
                message_type: message_type.into(),
                version: ENVELOPE_VERSION.to_string(),
                timestamp: Utc::now(),
                correlation_id,
                source: Some(source.into()),
            },
            body: MessageBody { payload },
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn encode(&self) -> Result<Vec<u8>, DecodeError> {
        Ok(serde_json::to_vec(self)?)
    }
}

fn serialize_timestamp<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    // A present-but-malformed timestamp falls back to the current time.
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        _ => Utc::now(),
    })
}
