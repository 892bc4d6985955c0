//! Delivery transport
//!
//! The wire contract between the SDK and the ingestion server. The trait
//! seam exists so tests can record transmissions without a network.

use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use url::Url;

use crate::error::{Error, Result};
use crate::models::{TraceRecord, TraceUpdate};

/// Header carrying the opaque API key
pub const API_KEY_HEADER: &str = "X-API-Key";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One-shot delivery of trace payloads. Implementations are called only
/// from the background sender; each call is a single attempt with no
/// retry.
pub trait Transport: Send + Sync {
    /// Create a new trace on the server
    fn create_trace(&self, record: &TraceRecord) -> Result<()>;

    /// Apply a partial update to an existing trace
    fn update_trace(&self, trace_id: &str, update: &TraceUpdate) -> Result<()>;

    /// Submit multiple traces in one request
    fn create_batch(&self, records: &[TraceRecord]) -> Result<()>;
}

/// HTTP transport implementing the ingestion wire contract
pub struct HttpTransport {
    endpoint: String,
    http: HttpClient,
}

impl HttpTransport {
    /// Build a transport for `endpoint` authenticating with `api_key`
    pub fn new(endpoint: &str, api_key: &str) -> Result<Self> {
        Url::parse(endpoint)
            .map_err(|e| Error::config(format!("invalid endpoint '{endpoint}': {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            API_KEY_HEADER,
            HeaderValue::from_str(api_key)
                .map_err(|_| Error::config("API key contains invalid header characters"))?,
        );

        let http = HttpClient::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn check(response: reqwest::blocking::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Error::Status(status.as_u16()))
        }
    }
}

impl Transport for HttpTransport {
    fn create_trace(&self, record: &TraceRecord) -> Result<()> {
        let url = format!("{}/api/v1/ingest/trace", self.endpoint);
        Self::check(self.http.post(url).json(record).send()?)
    }

    fn update_trace(&self, trace_id: &str, update: &TraceUpdate) -> Result<()> {
        let url = format!("{}/api/v1/ingest/trace/{}", self.endpoint, trace_id);
        Self::check(self.http.patch(url).json(update).send()?)
    }

    fn create_batch(&self, records: &[TraceRecord]) -> Result<()> {
        let url = format!("{}/api/v1/ingest/batch", self.endpoint);
        let body = serde_json::json!({ "traces": records });
        Self::check(self.http.post(url).json(&body).send()?)
    }
}
