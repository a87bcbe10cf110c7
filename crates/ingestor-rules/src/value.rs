//! A dynamically-typed field value, the currency the rule engine operates
//! on before a record has been cast into its canonical, statically-typed
//! shape (design §4.3).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One field of a vendor record, as decoded off the wire but before any
/// mapping has been applied.
///
/// `Null` is a first-class variant, not the field's absence — the
/// evaluation context built from a [`SourceRecord`] always includes every
/// field the schema declares, null or not, so `is null` checks behave
/// correctly even when a vendor omits a field entirely (design §4.3,
/// testable property #6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Decimal(Decimal),
    Str(String),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            FieldValue::Decimal(d) => Some(*d),
            FieldValue::Int(i) => Some(Decimal::from(*i)),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

/// A flat map of field name to value, representing one vendor record
/// before it has been mapped into a canonical shape.
pub type SourceRecord = BTreeMap<String, FieldValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_distinguished_from_absence() {
        let mut record: SourceRecord = SourceRecord::new();
        record.insert("bid_px_00".to_string(), FieldValue::Null);
        assert!(record.get("bid_px_00").unwrap().is_null());
        assert!(record.get("ask_px_00").is_none());
    }
}
