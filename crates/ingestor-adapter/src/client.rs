//! The session-oriented vendor client boundary.
//!
//! The vendor's own client library is an external collaborator (design
//! §1, out of scope for this crate) — what belongs here is the thin
//! trait the rest of the adapter programs against, plus the one
//! production implementation that speaks the vendor's REST API with
//! `reqwest`. Tests substitute [`FakeVendorClient`] so the adapter's
//! chunking, retry, and structural-decode logic is exercised without a
//! network dependency.

use async_trait::async_trait;
use ingestor_core::IngestError;
use serde_json::Value;

/// One page of raw vendor records for a single `(schema, symbols,
/// date-chunk)` request, still in vendor wire shape.
#[derive(Debug, Clone, Default)]
pub struct VendorPage {
    pub records: Vec<Value>,
    /// True when the vendor indicates more pages remain for this chunk.
    pub has_more: bool,
}

/// Parameters for a single page fetch against the vendor's historical
/// range endpoint.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub dataset: String,
    pub schema: String,
    pub symbols: Vec<String>,
    pub stype_in: String,
    pub start: String,
    pub end: String,
    pub cursor: Option<String>,
}

/// The session boundary the historical adapter drives.
///
/// `connect`/`disconnect` are safe to call repeatedly (design §4.2);
/// `fetch_page` performs one bounded unit of I/O so the caller can wrap
/// it in the shared retry helper.
#[async_trait]
pub trait VendorClient: Send + Sync {
    /// Establishes the session (e.g. validates the API key). Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Auth`] if credentials are rejected, or
    /// [`IngestError::TransientNetwork`] on a connection failure.
    async fn connect(&self) -> Result<(), IngestError>;

    /// Tears down the session. Idempotent, never fails.
    async fn disconnect(&self);

    /// Fetches a single page of raw vendor records.
    ///
    /// # Errors
    ///
    /// Returns a retryable error per the §4.1 taxonomy on transient
    /// failure, [`IngestError::Auth`] on credential rejection, or
    /// [`IngestError::RateLimited`] on HTTP 429.
    async fn fetch_page(&self, request: &PageRequest) -> Result<VendorPage, IngestError>;
}

/// Production [`VendorClient`] speaking the vendor's REST API over HTTPS.
pub struct HttpVendorClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpVendorClient {
    #[must_use]
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl VendorClient for HttpVendorClient {
    async fn connect(&self) -> Result<(), IngestError> {
        let url = format!("{}/v1/metadata/ping", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| IngestError::TransientNetwork(e.to_string()))?;
        classify_status(response.status())
    }

    async fn disconnect(&self) {}

    async fn fetch_page(&self, request: &PageRequest) -> Result<VendorPage, IngestError> {
        let url = format!("{}/v1/timeseries/get_range", self.base_url);
        let mut query = vec![
            ("dataset", request.dataset.clone()),
            ("schema", request.schema.clone()),
            ("symbols", request.symbols.join(",")),
            ("stype_in", request.stype_in.clone()),
            ("start", request.start.clone()),
            ("end", request.end.clone()),
        ];
        if let Some(cursor) = &request.cursor {
            query.push(("cursor", cursor.clone()));
        }

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(&query)
            .send()
            .await
            .map_err(|e| IngestError::TransientNetwork(e.to_string()))?;

        if let Some(retry_after) = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
        {
            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(IngestError::RateLimited {
                    message: "vendor rate limit".to_string(),
                    retry_after: Some(std::time::Duration::from_secs(retry_after)),
                });
            }
        }
        classify_status(response.status())?;

        #[derive(serde::Deserialize)]
        struct PageBody {
            #[serde(default)]
            records: Vec<Value>,
            #[serde(default)]
            next_cursor: Option<String>,
        }

        let body: PageBody = response
            .json()
            .await
            .map_err(|e| IngestError::TransientNetwork(e.to_string()))?;

        Ok(VendorPage {
            has_more: body.next_cursor.is_some(),
            records: body.records,
        })
    }
}

fn classify_status(status: reqwest::StatusCode) -> Result<(), IngestError> {
    if status.is_success() {
        return Ok(());
    }
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(IngestError::Auth(format!("vendor rejected credentials: {status}")));
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(IngestError::RateLimited {
            message: format!("vendor rate limited request: {status}"),
            retry_after: None,
        });
    }
    if status.is_server_error() {
        return Err(IngestError::TransientNetwork(format!(
            "vendor server error: {status}"
        )));
    }
    Err(IngestError::Other(anyhow::anyhow!(
        "vendor request failed: {status}"
    )))
}

/// A deterministic, in-memory [`VendorClient`] for tests — pages are
/// pre-seeded per `(schema, symbols)` key rather than fetched over the
/// network, so the orchestrator and adapter's chunking/retry logic can be
/// exercised without a live vendor session.
#[derive(Default)]
pub struct FakeVendorClient {
    pages: std::sync::Mutex<std::collections::HashMap<String, Vec<Value>>>,
}

impl FakeVendorClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the records returned for a given schema, regardless of the
    /// requested symbols or date range — sufficient for exercising the
    /// pipeline's shape without modeling the vendor's full query surface.
    pub fn seed(&self, schema: &str, records: Vec<Value>) {
        self.pages
            .lock()
            .expect("fake vendor client mutex poisoned")
            .insert(schema.to_string(), records);
    }
}

#[async_trait]
impl VendorClient for FakeVendorClient {
    async fn connect(&self) -> Result<(), IngestError> {
        Ok(())
    }

    async fn disconnect(&self) {}

    async fn fetch_page(&self, request: &PageRequest) -> Result<VendorPage, IngestError> {
        let pages = self.pages.lock().expect("fake vendor client mutex poisoned");
        let records = pages.get(&request.schema).cloned().unwrap_or_default();
        Ok(VendorPage {
            records,
            has_more: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[tokio::test]
    async fn fake_client_returns_seeded_records() {
        let client = FakeVendorClient::new();
        client.seed("ohlcv", vec![json!({"a": 1}), json!({"a": 2})]);

        let request = PageRequest {
            dataset: "GLBX.MDP3".to_string(),
            schema: "ohlcv".to_string(),
            symbols: vec!["ES.c.0".to_string()],
            stype_in: "continuous".to_string(),
            start: "2024-01-15".to_string(),
            end: "2024-01-16".to_string(),
            cursor: None,
        };
        let page = client.fetch_page(&request).await.unwrap();
        assert_eq!(page.records.len(), 2);
        assert!(!page.has_more);
    }
}
