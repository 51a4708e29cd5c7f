use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::MemoryError;
use crate::identity::ContentAddress;
use crate::payload::Payload;

/// Who authored a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Model,
}

/// How a message entered memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Provenance {
    Live,
    #[default]
    Batch,
}

/// Formatting span inside a message text (mention, link, code...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub offset: u32,
    pub length: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A single chat message as remembered by the store.
///
/// Import files carry these as JSON objects. `scope_id` and `provenance` are
/// stamped by the store on ingestion, so exports may omit them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    #[serde(default)]
    pub scope_id: i64,
    #[serde(default, alias = "id", alias = "message_id")]
    pub record_id: i64,
    #[serde(default)]
    pub text: String,
    #[serde(with = "chrono::serde::ts_seconds", alias = "date")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub sender_id: i64,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<MessageEntity>,
    /// Unset means "classify by sender".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default)]
    pub provenance: Provenance,
}

impl MessageRecord {
    pub fn new(scope_id: i64, record_id: i64, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            scope_id,
            record_id,
            text: text.into(),
            timestamp,
            sender_id: 0,
            sender_name: String::new(),
            reply_to_id: None,
            entities: Vec::new(),
            role: None,
            provenance: Provenance::Live,
        }
    }

    pub fn with_sender(mut self, sender_id: i64, sender_name: impl Into<String>) -> Self {
        self.sender_id = sender_id;
        self.sender_name = sender_name.into();
        self
    }

    pub fn with_reply_to(mut self, reply_to_id: i64) -> Self {
        self.reply_to_id = Some(reply_to_id);
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_entities(mut self, entities: Vec<MessageEntity>) -> Self {
        self.entities = entities;
        self
    }

    /// Text is present and the record id is usable as an identity.
    pub fn is_storable(&self) -> bool {
        self.record_id != 0 && !self.text.trim().is_empty()
    }
}

/// A point as written to the index.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorPoint {
    pub id: ContentAddress,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

/// A search hit as returned by the index, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: Payload,
}

/// Nearest-neighbour query restricted to one scope.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub vector: Vec<f32>,
    pub scope_id: i64,
    pub limit: u64,
    pub with_payload: bool,
}

/// Parameters applied when the collection is first created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: String,
    pub dimension: u64,
    /// Keep raw vectors on disk instead of RAM.
    pub on_disk: bool,
    /// int8 scalar quantization.
    pub quantization: bool,
}

/// Whether a write returns before or after the index acknowledges it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Durability {
    Wait,
    NoWait,
}

impl Durability {
    pub fn waits(&self) -> bool {
        matches!(self, Durability::Wait)
    }
}

/// Outcome of a streaming import.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: u64,
    pub skipped: u64,
    /// First failure seen during the run, if any.
    pub first_error: Option<MemoryError>,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.skipped == 0 && self.first_error.is_none()
    }
}
