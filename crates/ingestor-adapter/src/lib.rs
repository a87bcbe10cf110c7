//! The vendor market-data adapter (design §4.2).
//!
//! Owns the session boundary to the vendor ([`client`]), symbol-notation
//! handling including the `definitions`-schema fetch-all quirk
//! ([`symbology`]), structural decoding of vendor wire records into the
//! rule engine's dynamic value model ([`decode`]), and the historical
//! range fetch that ties them together as a bounded, lazy record stream
//! ([`historical`]).

#![deny(unsafe_code)]
#![deny(nonstandard_style)]

pub mod client;
pub mod decode;
pub mod historical;
pub mod symbology;

pub use client::{FakeVendorClient, HttpVendorClient, PageRequest, VendorClient, VendorPage};
pub use historical::{FetchParams, HistoricalAdapter};
