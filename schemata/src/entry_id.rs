use std::{fmt, hash, str::FromStr};

use uuid::Uuid;

use crate::{Error, Result};

/// Unique identity of a catalog entry.
///
/// Entries are addressed by a random 128-bit identifier that is minted by
/// whoever publishes the entry and never reused. On the wire it travels as
/// a hyphenated UUID string.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    hash::Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn value(&self) -> u128 {
        self.0.as_u128()
    }
}

impl From<Uuid> for EntryId {
    fn from(value: Uuid) -> Self {
        EntryId(value)
    }
}

impl From<u128> for EntryId {
    fn from(value: u128) -> Self {
        EntryId(Uuid::from_u128(value))
    }
}

impl From<EntryId> for Uuid {
    fn from(value: EntryId) -> Self {
        value.0
    }
}

impl FromStr for EntryId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s).map(EntryId).map_err(Error::external)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for EntryId {
    fn default() -> Self {
        EntryId::new()
    }
}
