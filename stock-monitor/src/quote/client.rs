//! HTTP quote client with sentinel-sliced payload decoding

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::record::QuoteRecord;
use super::source::{QuoteSource, XueqiuSource};
use crate::error::FetchFailure;

/// Per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const USER_AGENT: &str = concat!("stock-monitor/", env!("CARGO_PKG_VERSION"));

/// Result of fetching one symbol
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Record(QuoteRecord),
    Failure(FetchFailure),
}

impl FetchOutcome {
    pub fn is_record(&self) -> bool {
        matches!(self, FetchOutcome::Record(_))
    }

    pub fn into_record(self) -> Option<QuoteRecord> {
        match self {
            FetchOutcome::Record(record) => Some(record),
            FetchOutcome::Failure(_) => None,
        }
    }
}

impl From<Result<QuoteRecord, FetchFailure>> for FetchOutcome {
    fn from(value: Result<QuoteRecord, FetchFailure>) -> Self {
        match value {
            Ok(record) => FetchOutcome::Record(record),
            Err(failure) => FetchOutcome::Failure(failure),
        }
    }
}

/// Client for a single quote vendor
#[derive(Debug, Clone)]
pub struct QuoteClient {
    http: reqwest::Client,
    source: Arc<dyn QuoteSource>,
    timeout: Duration,
}

impl QuoteClient {
    /// Create a client for the default (Xueqiu) vendor
    pub fn new() -> Self {
        Self::with_source(Arc::new(XueqiuSource))
    }

    pub fn with_source(source: Arc<dyn QuoteSource>) -> Self {
        Self {
            http: build_http_client(),
            source,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Copy of this client with its own connection pool.
    ///
    /// Background workers use a detached client so nothing is shared with
    /// the foreground.
    pub fn detached(&self) -> Self {
        Self {
            http: build_http_client(),
            source: Arc::clone(&self.source),
            timeout: self.timeout,
        }
    }

    /// Fetch the quote for `symbol`. Never fails loudly: every error becomes
    /// [`FetchOutcome::Failure`].
    pub async fn fetch(&self, symbol: &str) -> FetchOutcome {
        let outcome = FetchOutcome::from(self.try_fetch(symbol).await);
        if let FetchOutcome::Failure(failure) = &outcome {
            warn!(%symbol, %failure, "Quote fetch failed");
        }
        outcome
    }

    async fn try_fetch(&self, symbol: &str) -> Result<QuoteRecord, FetchFailure> {
        let url = self.source.url_for(symbol);
        debug!(%symbol, %url, "Fetching quote");

        let response = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(FetchFailure::Status(response.status().as_u16()));
        }

        let body = response.bytes().await?;
        decode_payload(&body, self.source.as_ref())
    }
}

impl Default for QuoteClient {
    fn default() -> Self {
        Self::new()
    }
}

fn build_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_default()
}

/// Locate the record array inside `body` and decode its first element.
///
/// The sentinel must end with the array's opening bracket; everything from
/// that bracket onward is handed to the JSON parser, which stops after the
/// first complete value so trailing envelope bytes are ignored.
pub fn decode_payload(body: &[u8], source: &dyn QuoteSource) -> Result<QuoteRecord, FetchFailure> {
    let text = String::from_utf8_lossy(body);
    let sentinel = source.payload_sentinel();

    let position = find_subslice(text.as_bytes(), sentinel).ok_or(FetchFailure::SentinelMissing)?;
    let array_start = position + sentinel.len().saturating_sub(1);
    let payload = &text[array_start..];

    let records = serde_json::Deserializer::from_str(payload)
        .into_iter::<Vec<Value>>()
        .next()
        .ok_or_else(|| FetchFailure::Decode("empty payload".to_string()))?
        .map_err(|e| FetchFailure::Decode(e.to_string()))?;

    let first = records.into_iter().next().ok_or(FetchFailure::EmptyPayload)?;
    match first {
        Value::Object(fields) => Ok(canonicalise(fields, source)),
        other => Err(FetchFailure::Decode(format!(
            "expected a record object, found {other}"
        ))),
    }
}

/// Rename vendor keys to canonical names, dropping fields the formatter never reads
fn canonicalise(mut fields: Map<String, Value>, source: &dyn QuoteSource) -> QuoteRecord {
    let mut record = QuoteRecord::default();
    for (canonical, vendor) in source.field_map() {
        if let Some(value) = fields.remove(vendor) {
            record.insert(canonical, value);
        }
    }
    record
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
