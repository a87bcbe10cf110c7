//! The historical-range adapter: owns the vendor session, chunks a job's
//! date range, and streams decoded records back as a bounded, lazy
//! sequence (design §4.2, §5's channel-based concurrency model).
//!
//! One struct wraps a vendor session with one method per logical fetch,
//! generalized over [`VendorClient`] instead of a concrete vendor SDK, and
//! expressed as a `tokio::sync::mpsc` producer rather than an
//! async-decoder loop, since this adapter has no vendor-native streaming
//! decoder to drive.

use std::sync::Arc;

use chrono::NaiveDate;
use ingestor_core::retry::{retry_with, RetryPolicy};
use ingestor_core::symbols::SymbolType;
use ingestor_core::time::chunk_date_range;
use ingestor_core::IngestError;
use ingestor_model::Schema;
use ingestor_rules::SourceRecord;
use tokio::sync::mpsc;

use crate::client::{PageRequest, VendorClient};
use crate::decode::{decode_record, filter_definitions};
use crate::symbology::{request_symbols_for_schema, validate_symbols};

/// The channel depth between the adapter's producer task and whatever is
/// consuming records (the rule engine, batched upstream of it). Bounded so
/// a slow consumer applies backpressure to the fetch loop instead of the
/// adapter buffering an unbounded number of vendor pages in memory.
const CHANNEL_CAPACITY: usize = 256;

/// A single historical-range fetch request, defined in the adapter (not
/// `ingestor-model`) so job-orchestration concepts like batch size and
/// retry policy stay out of this crate, avoiding an adapter → orchestrator
/// dependency cycle.
#[derive(Debug, Clone)]
pub struct FetchParams {
    pub dataset: String,
    pub schema: Schema,
    pub symbols: Vec<String>,
    pub symbol_type: SymbolType,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub chunk_days: Option<u32>,
}

/// Drives one vendor session across the lifetime of a job.
///
/// `connect`/`disconnect` bracket every call the orchestrator makes to
/// [`HistoricalAdapter::fetch`]; `fetch` itself performs the scoped
/// per-chunk I/O and always releases its channel sender on every exit
/// path (including early error), regardless of whether the consumer has
/// finished draining it.
pub struct HistoricalAdapter<C: VendorClient> {
    client: Arc<C>,
    retry_policy: RetryPolicy,
}

impl<C: VendorClient + 'static> HistoricalAdapter<C> {
    #[must_use]
    pub fn new(client: Arc<C>, retry_policy: RetryPolicy) -> Self {
        Self { client, retry_policy }
    }

    /// Establishes the vendor session. Safe to call more than once.
    ///
    /// # Errors
    ///
    /// Propagates [`IngestError::Auth`] or [`IngestError::TransientNetwork`]
    /// from the underlying [`VendorClient::connect`].
    pub async fn connect(&self) -> Result<(), IngestError> {
        self.client.connect().await
    }

    /// Tears down the vendor session.
    pub async fn disconnect(&self) {
        self.client.disconnect().await;
    }

    /// Validates a job's requested symbols before any fetch is attempted,
    /// so symbol-resolution failures surface immediately rather than
    /// after spending a vendor round trip (design §4.2).
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::SymbolResolution`] naming every symbol that
    /// failed character-set validation.
    pub fn validate_job_symbols(params: &FetchParams) -> Result<(), IngestError> {
        validate_symbols(&params.symbols)
    }

    /// Streams decoded records for `params` as a bounded, lazy sequence.
    ///
    /// The returned receiver yields one item per decoded vendor record, in
    /// chunk order, date-ascending. A record-level decode failure is sent
    /// as an `Err` item rather than aborting the stream, so the consumer
    /// can route that single record to quarantine and keep draining the
    /// rest (design §4.4). A chunk-level failure (after retry budget is
    /// exhausted) is sent as a single `Err` item and ends the stream.
    pub fn fetch(
        &self,
        params: FetchParams,
    ) -> mpsc::Receiver<Result<SourceRecord, IngestError>> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let client = Arc::clone(&self.client);
        let retry_policy = self.retry_policy;

        tokio::spawn(async move {
            if let Err(e) = run_fetch(client, retry_policy, params, &tx).await {
                let _ = tx.send(Err(e)).await;
            }
        });

        rx
    }
}

async fn run_fetch<C: VendorClient>(
    client: Arc<C>,
    retry_policy: RetryPolicy,
    params: FetchParams,
    tx: &mpsc::Sender<Result<SourceRecord, IngestError>>,
) -> Result<(), IngestError> {
    let chunks = chunk_date_range(params.start, params.end, params.chunk_days)
        .map_err(IngestError::Configuration)?;

    let (request_symbols, stype_in) =
        request_symbols_for_schema(params.schema, &params.symbols, params.symbol_type);

    for chunk in chunks {
        let mut cursor: Option<String> = None;
        loop {
            let request = PageRequest {
                dataset: params.dataset.clone(),
                schema: params.schema.table_name().to_string(),
                symbols: request_symbols.clone(),
                stype_in: stype_in.to_string(),
                start: chunk.start.to_string(),
                end: chunk.end.to_string(),
                cursor: cursor.clone(),
            };

            let page = retry_with(
                &retry_policy,
                || {
                    let client = Arc::clone(&client);
                    let request = request.clone();
                    async move { client.fetch_page(&request).await }
                },
                IngestError::is_retryable,
            )
            .await?;

            let mut records = Vec::with_capacity(page.records.len());
            for raw in &page.records {
                match decode_record(params.schema, raw) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        // A single malformed record never ends the stream
                        // (design §4.2): it is handed to the consumer as
                        // an `Err` item so it can be quarantined, and the
                        // rest of the page is still decoded.
                        if tx.send(Err(e)).await.is_err() {
                            return Ok(());
                        }
                    }
                }
            }
            if params.schema == Schema::Definitions {
                records = filter_definitions(records, &params.symbols);
            }

            for record in records {
                if tx.send(Ok(record)).await.is_err() {
                    // Consumer dropped the receiver; nothing left to do.
                    return Ok(());
                }
            }

            if !page.has_more {
                break;
            }
            cursor = Some(format!("{}:{}", chunk.end, page.records.len()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::FakeVendorClient;
    use rstest::rstest;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[tokio::test]
    async fn fetch_streams_every_decoded_record_in_order() {
        let vendor = Arc::new(FakeVendorClient::new());
        vendor.seed(
            "ohlcv",
            vec![json!({"instrument_id": 1}), json!({"instrument_id": 2})],
        );
        let adapter = HistoricalAdapter::new(vendor, RetryPolicy::default());

        let params = FetchParams {
            dataset: "GLBX.MDP3".to_string(),
            schema: Schema::Ohlcv,
            symbols: vec!["ES.c.0".to_string()],
            symbol_type: SymbolType::Continuous,
            start: date(2024, 1, 15),
            end: date(2024, 1, 15),
            chunk_days: None,
        };

        let mut rx = adapter.fetch(params);
        let mut seen = Vec::new();
        while let Some(item) = rx.recv().await {
            seen.push(item.unwrap());
        }
        assert_eq!(seen.len(), 2);
    }

    #[rstest]
    #[tokio::test]
    async fn a_malformed_record_is_reported_without_ending_the_stream() {
        let vendor = Arc::new(FakeVendorClient::new());
        vendor.seed(
            "ohlcv",
            vec![json!([1, 2, 3]), json!({"instrument_id": 1})],
        );
        let adapter = HistoricalAdapter::new(vendor, RetryPolicy::default());

        let params = FetchParams {
            dataset: "GLBX.MDP3".to_string(),
            schema: Schema::Ohlcv,
            symbols: vec!["ES.c.0".to_string()],
            symbol_type: SymbolType::Continuous,
            start: date(2024, 1, 15),
            end: date(2024, 1, 15),
            chunk_days: None,
        };

        let mut rx = adapter.fetch(params);
        let mut ok_count = 0;
        let mut err_count = 0;
        while let Some(item) = rx.recv().await {
            match item {
                Ok(_) => ok_count += 1,
                Err(IngestError::VendorSchemaMismatch { .. }) => err_count += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(ok_count, 1);
        assert_eq!(err_count, 1);
    }

    #[rstest]
    fn validate_job_symbols_rejects_bad_characters() {
        let params = FetchParams {
            dataset: "GLBX.MDP3".to_string(),
            schema: Schema::Ohlcv,
            symbols: vec!["bad symbol".to_string()],
            symbol_type: SymbolType::Continuous,
            start: date(2024, 1, 1),
            end: date(2024, 1, 1),
            chunk_days: None,
        };
        assert!(HistoricalAdapter::<FakeVendorClient>::validate_job_symbols(&params).is_err());
    }
}
