//! The error taxonomy shared by every component (see design §7).

use std::time::Duration;

/// A structured error crossing a component boundary.
///
/// Record-level failures (`VendorSchemaMismatch`, `Transformation`,
/// `Validation`) never abort the pipeline on their own; the orchestrator
/// routes the offending record to quarantine and continues. The remaining
/// variants are job- or chunk-level and are handled by the orchestrator's
/// retry and failure policy.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Malformed or missing configuration, detected at startup. Fatal.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Vendor or database credentials were rejected. Fatal for the job.
    #[error("authentication error: {0}")]
    Auth(String),

    /// A network timeout or dropped connection while talking to the vendor.
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// HTTP 429 or an equivalent vendor rate-limit response.
    #[error("rate limited, retry after {retry_after:?}: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    /// A fetched vendor record could not be instantiated as its declared
    /// schema (structural validation, §4.4 Stage A).
    #[error("vendor record did not match schema {schema}: {reason}")]
    VendorSchemaMismatch { schema: String, reason: String },

    /// A rule-engine mapping referenced a missing field or an expression
    /// failed to evaluate.
    #[error("transformation error on field '{field}': {reason}")]
    Transformation { field: String, reason: String },

    /// A business-rule check failed with `error` severity (§4.4 Stage B).
    #[error("validation rule '{rule}' failed: {reason}")]
    Validation { rule: String, reason: String },

    /// A storage operation failed for a reason expected to clear on retry
    /// (deadlock, dropped connection).
    #[error("transient storage error: {0}")]
    StorageTransient(String),

    /// A storage operation hit the natural-key uniqueness constraint. This
    /// is not a failure — callers treat it as a duplicate-skip, never as a
    /// reason to retry or quarantine.
    #[error("storage constraint violation (duplicate natural key): {0}")]
    StorageConstraint(String),

    /// One or more user-supplied symbols could not be resolved to an
    /// `instrument_id`.
    #[error("unresolved symbols: {0:?}")]
    SymbolResolution(Vec<String>),

    /// A lower-level error that doesn't fit a more specific variant above.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IngestError {
    /// Returns the process exit code the CLI driver should use for an error
    /// of this kind (see spec §6's exit-code table).
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) | Self::Auth(_) => 3,
            Self::SymbolResolution(_) => 1,
            _ => 1,
        }
    }

    /// True if this error is on the retry taxonomy (§4.1): network timeout,
    /// 5xx/429, DB deadlock, transient connection drop. Authentication
    /// failures, other 4xx, schema mismatches, and validation failures are
    /// never retried — they quarantine or abort instead.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransientNetwork(_) | Self::RateLimited { .. } | Self::StorageTransient(_)
        )
    }

    /// True if this error should route the offending record to quarantine
    /// rather than consume retry budget or abort the chunk.
    #[must_use]
    pub fn is_quarantine_worthy(&self) -> bool {
        matches!(
            self,
            Self::VendorSchemaMismatch { .. } | Self::Transformation { .. } | Self::Validation { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(IngestError::Configuration("bad yaml".into()), 3)]
    #[case(IngestError::Auth("bad key".into()), 3)]
    #[case(IngestError::SymbolResolution(vec!["ZZZ".into()]), 1)]
    fn exit_codes_match_spec_table(#[case] err: IngestError, #[case] expected: i32) {
        assert_eq!(err.exit_code(), expected);
    }

    #[rstest]
    #[case(IngestError::TransientNetwork("timeout".into()), true)]
    #[case(IngestError::RateLimited { message: "429".into(), retry_after: None }, true)]
    #[case(IngestError::StorageTransient("deadlock".into()), true)]
    #[case(IngestError::Auth("bad key".into()), false)]
    #[case(IngestError::Validation { rule: "high_ge_low".into(), reason: "x".into() }, false)]
    fn retryable_matches_taxonomy(#[case] err: IngestError, #[case] expected: bool) {
        assert_eq!(err.is_retryable(), expected);
    }

    #[rstest]
    fn quarantine_worthy_never_retryable() {
        let cases = [
            IngestError::VendorSchemaMismatch {
                schema: "ohlcv-1d".into(),
                reason: "missing field".into(),
            },
            IngestError::Transformation {
                field: "close_price".into(),
                reason: "null".into(),
            },
            IngestError::Validation {
                rule: "high_ge_low".into(),
                reason: "100 < 150".into(),
            },
        ];
        for err in cases {
            assert!(err.is_quarantine_worthy());
            assert!(!err.is_retryable());
        }
    }
}
