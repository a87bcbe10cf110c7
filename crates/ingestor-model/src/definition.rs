//! The Definitions canonical schema, design §3.

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enums::InstrumentClass;
use crate::identifiers::InstrumentId;

/// A single instrument definition, as published by the venue.
///
/// Natural key: `(instrument_id, activation)` — a definition is
/// revision-controlled: an instrument whose contract terms change
/// (for example a strike adjustment) publishes a new definition with a
/// later `activation`, rather than mutating the previous one in place
/// (design §3, "Ownership and lifecycle").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    pub instrument_id: InstrumentId,
    pub raw_symbol: String,
    pub instrument_class: InstrumentClass,
    pub exchange: String,
    pub asset: String,
    pub activation: DateTime<Utc>,
    pub expiration: DateTime<Utc>,
    pub min_price_increment: Decimal,
    pub contract_multiplier: Decimal,
    pub strike_price: Option<Decimal>,
    pub leg_count: u32,
    pub leg_instrument_ids: Vec<InstrumentId>,
    pub leg_ratios: Vec<Decimal>,
}

impl Definition {
    /// Checks the structural/business invariants from design §3:
    /// `expiration > activation`, `min_price_increment > 0`,
    /// `contract_multiplier > 0`, and the leg fields are present
    /// exactly when `leg_count > 0` and agree in length with it.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when an invariant does not hold.
    pub fn check_invariants(&self) -> Result<(), String> {
        ingestor_core::correctness::check_nonempty_string(&self.raw_symbol, "raw_symbol")?;
        if self.expiration <= self.activation {
            return Err(format!(
                "expiration {} does not follow activation {}",
                self.expiration, self.activation
            ));
        }
        ingestor_core::correctness::check_positive(
            self.min_price_increment,
            "min_price_increment",
        )?;
        ingestor_core::correctness::check_positive(
            self.contract_multiplier,
            "contract_multiplier",
        )?;

        if self.leg_instrument_ids.len() != self.leg_count as usize {
            return Err(format!(
                "leg_instrument_ids has {} entries, expected leg_count {}",
                self.leg_instrument_ids.len(),
                self.leg_count
            ));
        }
        if self.leg_ratios.len() != self.leg_count as usize {
            return Err(format!(
                "leg_ratios has {} entries, expected leg_count {}",
                self.leg_ratios.len(),
                self.leg_count
            ));
        }
        Ok(())
    }
}

impl Display for Definition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{:?},{}",
            self.instrument_id, self.raw_symbol, self.instrument_class, self.exchange
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stubs::definition_stub;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    fn happy_path_invariants_hold() {
        let def = definition_stub();
        assert!(def.check_invariants().is_ok());
    }

    #[rstest]
    fn expiration_before_activation_is_rejected() {
        let mut def = definition_stub();
        def.expiration = def.activation - chrono::Duration::days(1);
        assert!(def.check_invariants().is_err());
    }

    #[rstest]
    fn zero_min_price_increment_is_rejected() {
        let mut def = definition_stub();
        def.min_price_increment = dec!(0);
        assert!(def.check_invariants().is_err());
    }

    #[rstest]
    fn leg_count_mismatch_is_rejected() {
        let mut def = definition_stub();
        def.leg_count = 2;
        def.leg_instrument_ids = vec![InstrumentId(1)];
        def.leg_ratios = vec![dec!(1), dec!(-1)];
        assert!(def.check_invariants().is_err());
    }

    #[rstest]
    fn legs_matching_leg_count_are_accepted_regardless_of_instrument_class() {
        let mut def = definition_stub();
        def.leg_count = 2;
        def.leg_instrument_ids = vec![InstrumentId(1), InstrumentId(2)];
        def.leg_ratios = vec![dec!(1), dec!(-1)];
        assert!(def.check_invariants().is_ok());
    }
}
