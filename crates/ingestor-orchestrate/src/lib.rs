//! The pipeline orchestrator (C7, design §4.1) and the system/job
//! configuration it is driven by.
//!
//! Ties together every other crate in the workspace: the vendor adapter
//! (`ingestor-adapter`), the rule engine (`ingestor-rules`), the
//! validator (`ingestor-validate`), and storage (`ingestor-storage`), in
//! one finite, job-scoped driving loop.

#![deny(unsafe_code)]
#![deny(nonstandard_style)]

pub mod config;
pub mod orchestrator;
pub mod stats;

pub use config::{DbConfig, JobConfig, JobsFile, LogFormat, LoggingConfig, SystemConfig};
pub use orchestrator::{list_jobs, PipelineOrchestrator, StatusCheck, StatusReport};
pub use stats::PipelineStats;
