//! Content addressing for stored messages.
//!
//! A message is stored under a version-5 UUID derived from its scope and
//! record id. The same pair always maps to the same address, so writing a
//! message twice overwrites the first copy instead of duplicating it.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MemoryError, MemoryResult};

/// Namespace all message addresses are derived under.
pub const MESSAGE_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2b7e_93a4_4d0f_8e55_1a3c_9b42_d7e1);

/// Storage key of a message in the vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentAddress(Uuid);

impl ContentAddress {
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl From<ContentAddress> for String {
    fn from(address: ContentAddress) -> Self {
        address.to_string()
    }
}

/// Derive the address of `(scope_id, record_id)`.
///
/// `record_id` must be non-zero; zero is how upstream exports mark a missing id.
pub fn content_address(scope_id: i64, record_id: i64) -> MemoryResult<ContentAddress> {
    if record_id == 0 {
        return Err(MemoryError::Validation(format!(
            "record id must be non-zero (scope {})",
            scope_id
        )));
    }

    let name = format!("{}:{}", scope_id, record_id);
    Ok(ContentAddress(Uuid::new_v5(&MESSAGE_NAMESPACE, name.as_bytes())))
}
