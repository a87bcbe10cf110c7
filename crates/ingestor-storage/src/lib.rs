//! Hypertable storage, chunk progress tracking, and the quarantine sink
//! (design §4.5–§4.7).

#![deny(unsafe_code)]
#![deny(nonstandard_style)]

pub mod loader;
pub mod pg;
pub mod progress;
pub mod quarantine;
pub mod schema_map;

pub use loader::{LoadStats, StorageLoader};
pub use pg::{connect_pg, resolve_connect_options, PostgresConnectOptions};
pub use progress::{ChunkGuard, ChunkStats, ProgressStatus, ProgressTracker};
pub use quarantine::{QuarantineEntry, QuarantineSink};
