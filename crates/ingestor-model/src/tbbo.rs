//! The TBBO (trade + best bid/offer) canonical schema, design §3.

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enums::TradeSide;
use crate::identifiers::InstrumentId;

/// A trade paired with the top-of-book quote in effect at the time of the
/// trade.
///
/// Natural key: `(instrument_id, ts_event, sequence)`. Either side of the
/// quote may be absent (`null`) when a venue has no resting interest on
/// that side at the moment of the trade — this is a legitimate market
/// state, not missing data, so the bid/ask fields are optional and the
/// ordering invariant below only applies when both are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tbbo {
    pub instrument_id: InstrumentId,
    pub ts_event: DateTime<Utc>,
    pub ts_recv: Option<DateTime<Utc>>,
    pub price: Decimal,
    pub size: Decimal,
    pub side: TradeSide,
    pub sequence: u64,
    pub bid_px_00: Option<Decimal>,
    pub ask_px_00: Option<Decimal>,
    pub bid_sz_00: Option<Decimal>,
    pub ask_sz_00: Option<Decimal>,
}

impl Tbbo {
    /// Checks the structural/business invariants from design §3: trade
    /// price and size strictly positive, and `bid_px_00 <= ask_px_00`
    /// whenever both sides of the quote are present.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when an invariant does not hold.
    pub fn check_invariants(&self) -> Result<(), String> {
        ingestor_core::correctness::check_positive(self.price, "price")?;
        ingestor_core::correctness::check_positive(self.size, "size")?;

        if let (Some(bid), Some(ask)) = (self.bid_px_00, self.ask_px_00) {
            if bid > ask {
                return Err(format!("bid_px_00 {bid} exceeds ask_px_00 {ask}"));
            }
        }
        for (name, value) in [
            ("bid_sz_00", self.bid_sz_00),
            ("ask_sz_00", self.ask_sz_00),
        ] {
            if let Some(value) = value {
                ingestor_core::correctness::check_non_negative(value, name)?;
            }
        }
        Ok(())
    }
}

impl Display for Tbbo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},bid={:?},ask={:?}",
            self.instrument_id, self.price, self.size, self.bid_px_00, self.ask_px_00
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stubs::tbbo_stub;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    fn happy_path_invariants_hold() {
        let quote = tbbo_stub();
        assert!(quote.check_invariants().is_ok());
    }

    #[rstest]
    fn crossed_quote_is_rejected() {
        let mut quote = tbbo_stub();
        quote.bid_px_00 = Some(dec!(100));
        quote.ask_px_00 = Some(dec!(90));
        assert!(quote.check_invariants().is_err());
    }

    /// A resting-interest gap on one side is a legitimate market state,
    /// not a validation failure.
    #[rstest]
    fn one_sided_quote_passes() {
        let mut quote = tbbo_stub();
        quote.bid_px_00 = None;
        quote.ask_px_00 = Some(dec!(10));
        assert!(quote.check_invariants().is_ok());
    }
}
