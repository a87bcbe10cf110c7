//! The Trades canonical schema, design §3.

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enums::TradeSide;
use crate::identifiers::InstrumentId;

/// A single executed trade (tick).
///
/// Natural key: `(instrument_id, ts_event, sequence)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub instrument_id: InstrumentId,
    pub ts_event: DateTime<Utc>,
    pub ts_recv: Option<DateTime<Utc>>,
    pub price: Decimal,
    pub size: Decimal,
    pub side: TradeSide,
    pub sequence: u64,
}

impl Trade {
    /// Checks the structural/business invariants from design §3: price
    /// strictly positive, size strictly positive.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when an invariant does not hold.
    pub fn check_invariants(&self) -> Result<(), String> {
        ingestor_core::correctness::check_positive(self.price, "price")?;
        ingestor_core::correctness::check_positive(self.size, "size")?;
        Ok(())
    }
}

impl Display for Trade {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.instrument_id,
            self.price,
            self.size,
            self.side.code()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stubs::trade_stub;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    fn happy_path_invariants_hold() {
        let trade = trade_stub();
        assert!(trade.check_invariants().is_ok());
    }

    #[rstest]
    #[case(dec!(0))]
    #[case(dec!(-1))]
    fn non_positive_price_is_rejected(#[case] price: Decimal) {
        let mut trade = trade_stub();
        trade.price = price;
        assert!(trade.check_invariants().is_err());
    }

    #[rstest]
    #[case(dec!(0))]
    #[case(dec!(-1))]
    fn non_positive_size_is_rejected(#[case] size: Decimal) {
        let mut trade = trade_stub();
        trade.size = size;
        assert!(trade.check_invariants().is_err());
    }

    #[rstest]
    fn side_with_no_reported_aggressor_is_none() {
        assert_eq!(TradeSide::from_code(None), TradeSide::None);
        assert_eq!(TradeSide::from_code(Some("X")), TradeSide::None);
    }
}
