//! Typed projection between [`MessageRecord`] and the stored point payload.
//!
//! The field list is fixed and versioned. Bump [`PAYLOAD_VERSION`] whenever a
//! field is added, renamed or changes representation.

use chrono::DateTime;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{MessageEntity, MessageRecord, Provenance, Role};

pub const PAYLOAD_VERSION: i64 = 2;

/// Payload as exchanged with the index.
pub type Payload = Map<String, Value>;

/// Payload keys.
pub mod field {
    pub const VERSION: &str = "payload_version";
    pub const SCOPE_ID: &str = "scope_id";
    pub const RECORD_ID: &str = "record_id";
    pub const TEXT: &str = "text";
    pub const TIMESTAMP: &str = "timestamp";
    /// Sub-second part of the timestamp, omitted when zero.
    pub const TIMESTAMP_NANOS: &str = "timestamp_nanos";
    pub const SENDER_ID: &str = "sender_id";
    pub const SENDER_NAME: &str = "sender_name";
    pub const REPLY_TO_ID: &str = "reply_to_id";
    pub const ROLE: &str = "role";
    pub const PROVENANCE: &str = "provenance";
    pub const ENTITIES: &str = "entities";
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload is missing mandatory field '{0}'")]
    MissingField(&'static str),

    #[error("payload field '{field}' is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Project a record into its stored payload.
///
/// Entities are stored as a JSON string so the index never has to understand
/// nested structures.
pub fn project(record: &MessageRecord) -> Payload {
    let mut payload = Map::new();
    payload.insert(field::VERSION.into(), PAYLOAD_VERSION.into());
    payload.insert(field::SCOPE_ID.into(), record.scope_id.into());
    payload.insert(field::RECORD_ID.into(), record.record_id.into());
    payload.insert(field::TEXT.into(), record.text.clone().into());
    payload.insert(field::TIMESTAMP.into(), record.timestamp.timestamp().into());
    let nanos = record.timestamp.timestamp_subsec_nanos();
    if nanos != 0 {
        payload.insert(field::TIMESTAMP_NANOS.into(), nanos.into());
    }
    payload.insert(field::SENDER_ID.into(), record.sender_id.into());
    payload.insert(field::SENDER_NAME.into(), record.sender_name.clone().into());
    if let Some(reply_to_id) = record.reply_to_id {
        payload.insert(field::REPLY_TO_ID.into(), reply_to_id.into());
    }
    payload.insert(
        field::ROLE.into(),
        record.role.unwrap_or_default().to_string().into(),
    );
    payload.insert(field::PROVENANCE.into(), record.provenance.to_string().into());
    if !record.entities.is_empty() {
        // Vec<MessageEntity> has only string and integer fields.
        if let Ok(encoded) = serde_json::to_string(&record.entities) {
            payload.insert(field::ENTITIES.into(), encoded.into());
        }
    }
    payload
}

/// Rebuild a record from a stored payload.
///
/// `text`, `record_id` and `timestamp` are mandatory. Other fields fall back
/// to their defaults when absent or unreadable.
pub fn restore(payload: &Payload) -> Result<MessageRecord, PayloadError> {
    let text = payload
        .get(field::TEXT)
        .and_then(Value::as_str)
        .ok_or(PayloadError::MissingField(field::TEXT))?;
    let record_id = payload
        .get(field::RECORD_ID)
        .and_then(Value::as_i64)
        .ok_or(PayloadError::MissingField(field::RECORD_ID))?;
    let seconds = payload
        .get(field::TIMESTAMP)
        .and_then(Value::as_i64)
        .ok_or(PayloadError::MissingField(field::TIMESTAMP))?;

    let int = |key: &str| payload.get(key).and_then(Value::as_i64);
    let string = |key: &str| payload.get(key).and_then(Value::as_str);

    let nanos = int(field::TIMESTAMP_NANOS)
        .and_then(|n| u32::try_from(n).ok())
        .filter(|&n| n < 1_000_000_000)
        .unwrap_or(0);
    let timestamp = DateTime::from_timestamp(seconds, nanos).ok_or_else(|| PayloadError::InvalidField {
        field: field::TIMESTAMP,
        reason: format!("{} is out of range", seconds),
    })?;

    Ok(MessageRecord {
        scope_id: int(field::SCOPE_ID).unwrap_or_default(),
        record_id,
        text: text.to_string(),
        timestamp,
        sender_id: int(field::SENDER_ID).unwrap_or_default(),
        sender_name: string(field::SENDER_NAME).unwrap_or_default().to_string(),
        reply_to_id: int(field::REPLY_TO_ID),
        entities: string(field::ENTITIES)
            .and_then(|raw| serde_json::from_str::<Vec<MessageEntity>>(raw).ok())
            .unwrap_or_default(),
        role: Some(
            string(field::ROLE)
                .and_then(|raw| raw.parse::<Role>().ok())
                .unwrap_or_default(),
        ),
        provenance: string(field::PROVENANCE)
            .and_then(|raw| raw.parse::<Provenance>().ok())
            .unwrap_or_default(),
    })
}
