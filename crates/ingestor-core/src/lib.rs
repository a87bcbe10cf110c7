//! Shared foundation for the market-data ingestion engine.
//!
//! The `ingestor-core` crate provides the componentry every other crate in
//! this workspace builds on: the error taxonomy (§7 of the design), a
//! generic retry helper for the retry taxonomy, date-chunking for job
//! ranges, symbol-notation validation, and `design by contract`-style
//! correctness checks used throughout the validator and rule engine.
//!
//! None of these types are specific to a single pipeline stage; keeping
//! them here (rather than duplicated in the adapter, storage, and
//! validator crates) keeps every other crate in the workspace building
//! on one shared foundation instead of each re-deriving its own.

#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![warn(clippy::missing_errors_doc)]

pub mod cancellation;
pub mod correctness;
pub mod error;
pub mod retry;
pub mod symbols;
pub mod time;

pub use cancellation::ShutdownSignal;
pub use error::IngestError;
