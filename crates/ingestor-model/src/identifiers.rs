//! Identifier newtypes shared by every canonical schema.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// The internal numeric identifier for an instrument, unique across venues.
///
/// `instrument_id` must resolve against the definitions table for any
/// user-facing symbol query, but need not be resolvable at ingest time —
/// definitions may arrive in a separate job (design §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentId(pub u32);

impl Display for InstrumentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for InstrumentId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// A vendor-facing symbol string, as typed by a user or stored in a job
/// configuration. Distinct from `InstrumentId`, which is the internal,
/// storage-facing numeric key resolved by the query builder (design §4.8).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(pub String);

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Symbol {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
