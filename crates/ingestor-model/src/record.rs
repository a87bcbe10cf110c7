//! The schema enum and canonical-record envelope, design §3.

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::definition::Definition;
use crate::identifiers::InstrumentId;
use crate::ohlcv::Ohlcv;
use crate::statistics::Statistics;
use crate::tbbo::Tbbo;
use crate::trade::Trade;

/// The five canonical schemas a job may ingest, query, or quarantine
/// against (design §2/§3). This is the identifier that threads through
/// job configuration, storage table selection, and quarantine file
/// naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Schema {
    Ohlcv,
    Trades,
    Tbbo,
    Statistics,
    Definitions,
}

impl Schema {
    /// All schemas, in the order the pipeline documentation lists them.
    #[must_use]
    pub fn all() -> [Schema; 5] {
        [
            Schema::Ohlcv,
            Schema::Trades,
            Schema::Tbbo,
            Schema::Statistics,
            Schema::Definitions,
        ]
    }

    /// The storage table name backing this schema.
    #[must_use]
    pub fn table_name(self) -> &'static str {
        match self {
            Schema::Ohlcv => "ohlcv",
            Schema::Trades => "trades",
            Schema::Tbbo => "tbbo",
            Schema::Statistics => "statistics",
            Schema::Definitions => "definitions",
        }
    }
}

impl Display for Schema {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table_name())
    }
}

/// A single record in one of the five canonical schemas, as it flows
/// between the rule engine, validator, storage loader, and query
/// builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "schema", rename_all = "snake_case")]
pub enum CanonicalRecord {
    Ohlcv(Ohlcv),
    Trade(Trade),
    Tbbo(Tbbo),
    Statistics(Statistics),
    Definition(Definition),
}

impl CanonicalRecord {
    /// The schema this record belongs to.
    #[must_use]
    pub fn schema(&self) -> Schema {
        match self {
            CanonicalRecord::Ohlcv(_) => Schema::Ohlcv,
            CanonicalRecord::Trade(_) => Schema::Trades,
            CanonicalRecord::Tbbo(_) => Schema::Tbbo,
            CanonicalRecord::Statistics(_) => Schema::Statistics,
            CanonicalRecord::Definition(_) => Schema::Definitions,
        }
    }

    /// The instrument this record refers to.
    #[must_use]
    pub fn instrument_id(&self) -> InstrumentId {
        match self {
            CanonicalRecord::Ohlcv(record) => record.instrument_id,
            CanonicalRecord::Trade(record) => record.instrument_id,
            CanonicalRecord::Tbbo(record) => record.instrument_id,
            CanonicalRecord::Statistics(record) => record.instrument_id,
            CanonicalRecord::Definition(record) => record.instrument_id,
        }
    }

    /// The event timestamp used for ordering and range queries.
    ///
    /// Definitions order on `activation` rather than an `ts_event`
    /// field, since a definition describes a period of applicability
    /// rather than a point-in-time event.
    #[must_use]
    pub fn ts_event(&self) -> DateTime<Utc> {
        match self {
            CanonicalRecord::Ohlcv(record) => record.ts_event,
            CanonicalRecord::Trade(record) => record.ts_event,
            CanonicalRecord::Tbbo(record) => record.ts_event,
            CanonicalRecord::Statistics(record) => record.ts_event,
            CanonicalRecord::Definition(record) => record.activation,
        }
    }

    /// Delegates to the wrapped record's `check_invariants`.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when an invariant does not hold.
    pub fn check_invariants(&self) -> Result<(), String> {
        match self {
            CanonicalRecord::Ohlcv(record) => record.check_invariants(),
            CanonicalRecord::Trade(record) => record.check_invariants(),
            CanonicalRecord::Tbbo(record) => record.check_invariants(),
            CanonicalRecord::Statistics(record) => record.check_invariants(),
            CanonicalRecord::Definition(record) => record.check_invariants(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stubs::ohlcv_stub;
    use rstest::rstest;

    #[rstest]
    fn schema_round_trips_through_canonical_record() {
        let record = CanonicalRecord::Ohlcv(ohlcv_stub());
        assert_eq!(record.schema(), Schema::Ohlcv);
        assert_eq!(record.schema().table_name(), "ohlcv");
    }

    #[rstest]
    fn all_lists_every_schema_once() {
        let all = Schema::all();
        assert_eq!(all.len(), 5);
        assert!(all.contains(&Schema::Definitions));
    }
}
