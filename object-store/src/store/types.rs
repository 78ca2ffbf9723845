use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a stored object.
///
/// Download URLs carry this id with no further authorization check, so it has
/// to be unguessable: it is a random v4 UUID (122 random bits), rendered as 32
/// lowercase hex characters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(Uuid);

impl ObjectId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for ObjectId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl TryFrom<String> for ObjectId {
    type Error = uuid::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.to_string()
    }
}

/// Metadata record describing one stored object and its chunk layout.
/// Written once, after every chunk of the object is durable, and never modified.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub id: ObjectId,
    /// Filename as supplied by the uploader
    pub name: String,
    /// Total length of the object in bytes
    pub length: u64,
    /// Size every chunk but the last one was cut to
    pub chunk_size: u64,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
    /// Hex encoded SHA-256 of the whole content
    pub sha256: String,
    /// Caller-defined metadata, opaque to the store
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl Manifest {
    /// Number of chunks the object was split into.
    pub fn chunk_count(&self) -> u64 {
        if self.chunk_size == 0 {
            return 0;
        }
        self.length.div_ceil(self.chunk_size)
    }

    /// Length the chunk at `sequence` must have for the object to add up to `length`.
    pub fn expected_chunk_len(&self, sequence: u64) -> u64 {
        let offset = sequence.saturating_mul(self.chunk_size);
        self.length.saturating_sub(offset).min(self.chunk_size)
    }
}

/// Key a chunk is stored under in every chunk backend.
/// The sequence is zero padded so keys of one object sort in sequence order.
pub fn chunk_id(object: &ObjectId, sequence: u64) -> String {
    format!("{}.{:010}", object, sequence)
}

/// Inverse of [`chunk_id`]. Returns `None` for keys that were not produced by it.
pub fn parse_chunk_id(chunk_id: &str) -> Option<(ObjectId, u64)> {
    let (object, sequence) = chunk_id.split_once('.')?;
    Some((object.parse().ok()?, sequence.parse().ok()?))
}
