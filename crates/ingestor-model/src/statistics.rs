//! The Statistics canonical schema, design §3.

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enums::{StatType, UpdateAction};
use crate::identifiers::InstrumentId;

/// A single venue-published statistic (settlement price, open interest,
/// cleared volume, and similar), design §3.
///
/// Natural key: `(instrument_id, ts_event, stat_type)`. `price` and
/// `quantity` are mutually exclusive depending on `stat_type` — a
/// `cleared_volume` record carries `quantity` and leaves `price` unset,
/// while a `settlement_price` record is the reverse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub instrument_id: InstrumentId,
    pub ts_event: DateTime<Utc>,
    pub ts_recv: Option<DateTime<Utc>>,
    pub stat_type: StatType,
    pub update_action: UpdateAction,
    pub price: Option<Decimal>,
    pub quantity: Option<Decimal>,
}

impl Statistics {
    /// Checks the structural/business invariant from design §3: at least
    /// one of `price`/`quantity` is present, and whichever is present is
    /// non-negative.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when an invariant does not hold.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.price.is_none() && self.quantity.is_none() {
            return Err("statistics record carries neither price nor quantity".to_string());
        }
        if let Some(price) = self.price {
            ingestor_core::correctness::check_non_negative(price, "price")?;
        }
        if let Some(quantity) = self.quantity {
            ingestor_core::correctness::check_non_negative(quantity, "quantity")?;
        }
        Ok(())
    }
}

impl Display for Statistics {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{:?},{:?},price={:?},qty={:?}",
            self.instrument_id, self.stat_type, self.update_action, self.price, self.quantity
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stubs::statistics_stub;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    fn happy_path_invariants_hold() {
        let stat = statistics_stub();
        assert!(stat.check_invariants().is_ok());
    }

    #[rstest]
    fn neither_price_nor_quantity_is_rejected() {
        let mut stat = statistics_stub();
        stat.price = None;
        stat.quantity = None;
        assert!(stat.check_invariants().is_err());
    }

    #[rstest]
    fn negative_price_is_rejected() {
        let mut stat = statistics_stub();
        stat.price = Some(dec!(-1));
        assert!(stat.check_invariants().is_err());
    }
}
