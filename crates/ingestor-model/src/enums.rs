//! Enumerations shared by the canonical schemas (design §3).

use serde::{Deserialize, Serialize};

/// The bar interval of an OHLCV record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Granularity {
    /// One-second bars (intraday).
    Second,
    /// One-minute bars (intraday).
    Minute,
    /// One-hour bars (intraday).
    Hour,
    /// One-day bars (daily).
    Day,
}

/// The side of a trade's aggressor, per design §3. `None` (`∅`) covers
/// venues that don't report an aggressor side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeSide {
    /// Trade was aggressed by the Ask side (a seller hit the bid).
    Ask,
    /// Trade was aggressed by the Bid side (a buyer lifted the offer).
    Bid,
    /// No side information was provided.
    None,
}

impl TradeSide {
    /// Parses the single-letter vendor code used in the natural key
    /// (`A`, `B`, `N`, or absent).
    #[must_use]
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some("A") => Self::Ask,
            Some("B") => Self::Bid,
            _ => Self::None,
        }
    }

    /// The single-letter vendor code for this side.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Ask => "A",
            Self::Bid => "B",
            Self::None => "N",
        }
    }
}

/// The kind of venue statistic a `Statistics` record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatType {
    OpeningPrice,
    IndicativeOpeningPrice,
    SettlementPrice,
    TradingSessionLowPrice,
    TradingSessionHighPrice,
    ClearedVolume,
    LowestOffer,
    HighestBid,
    OpenInterest,
    FixingPrice,
    Unknown,
}

/// Whether a statistic record adds, replaces, or clears a previously
/// reported value (vendor-defined update semantics).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateAction {
    Add,
    Delete,
}

/// The instrument class of a `Definitions` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentClass {
    Stock,
    Future,
    Option,
    FutureSpread,
    OptionSpread,
    MixedSpread,
    Fx,
    Bond,
    Other,
}
