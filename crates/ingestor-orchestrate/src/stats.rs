//! The final summary an ingestion job reports (design §4.1's
//! `execute_ingestion` return value, §7's "final structured summary").

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Running counters for one job execution, accumulated chunk by chunk and
/// batch by batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStats {
    pub records_fetched: u64,
    pub records_transformed: u64,
    pub records_validated: u64,
    pub records_stored: u64,
    pub records_skipped_as_duplicate: u64,
    pub records_quarantined: u64,
    pub chunks_done: u64,
    pub chunks_failed: u64,
    /// Count of failures per [`ingestor_core::IngestError`] variant name,
    /// for the "compact list of the top failure reasons" design §7 calls
    /// for.
    pub error_counts: HashMap<String, u64>,
    #[serde(skip)]
    pub stage_wall_clock: HashMap<&'static str, Duration>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_error(&mut self, kind: &str) {
        *self.error_counts.entry(kind.to_string()).or_insert(0) += 1;
    }

    pub fn add_stage_duration(&mut self, stage: &'static str, elapsed: Duration) {
        *self.stage_wall_clock.entry(stage).or_insert(Duration::ZERO) += elapsed;
    }

    /// The top `n` failure reasons by count, descending, for the
    /// human-readable summary.
    #[must_use]
    pub fn top_failure_reasons(&self, n: usize) -> Vec<(String, u64)> {
        let mut reasons: Vec<(String, u64)> = self
            .error_counts
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        reasons.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        reasons.truncate(n);
        reasons
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_failure_reasons_sorts_descending_and_truncates() {
        let mut stats = PipelineStats::new();
        stats.record_error("transformation");
        stats.record_error("transformation");
        stats.record_error("validation");
        stats.record_error("validation");
        stats.record_error("validation");
        stats.record_error("auth");

        let top = stats.top_failure_reasons(2);
        assert_eq!(top, vec![("validation".to_string(), 3), ("transformation".to_string(), 2)]);
    }
}
