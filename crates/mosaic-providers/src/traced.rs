//! Traced transport: correlation enforcement and exchange capture.
//!
//! Wraps any [`HttpTransport`]. Every request must carry `x-correlation-id`;
//! after a complete exchange the response is tagged with the same id and the
//! pair is stored in a [`CorrelationCache`] for later audit lookup.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::{debug, warn};

use mosaic_core::config::TransportConfig;
use mosaic_core::utils::truncate_string;

use crate::cache::{CapturedRequest, CapturedResponse, CorrelationCache, CorrelationRecord};
use crate::error::{LlmError, LlmResult};
use crate::traits::HttpTransport;
use crate::transport::{HttpRequest, HttpResponse, ReqwestTransport, CORRELATION_ID_HEADER};

/// Headers whose values never reach the cache.
const REDACTED_HEADERS: &[&str] = &[
    "authorization",
    "api-key",
    "x-api-key",
    "x-portkey-api-key",
    "x-portkey-virtual-key",
];

const REDACTED: &str = "[REDACTED]";

/// Transport decorator that records every exchange by correlation id.
pub struct TracedTransport {
    inner: Arc<dyn HttpTransport>,
    cache: CorrelationCache,
}

impl std::fmt::Debug for TracedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracedTransport")
            .field("cache", &self.cache)
            .finish()
    }
}

impl TracedTransport {
    /// Wrap `inner` with a cache of `capacity` records kept for `ttl`.
    pub fn new(inner: Arc<dyn HttpTransport>, capacity: usize, ttl: Duration) -> Self {
        TracedTransport {
            inner,
            cache: CorrelationCache::new(capacity, ttl),
        }
    }

    /// A traced `reqwest` transport sized from the config file.
    pub fn from_config(config: &TransportConfig) -> LlmResult<Self> {
        let inner = ReqwestTransport::new(config.request_timeout())?;
        Ok(Self::new(
            Arc::new(inner),
            config.cache_capacity,
            config.cache_ttl(),
        ))
    }

    pub fn cache(&self) -> &CorrelationCache {
        &self.cache
    }

    /// Captured request and response for `correlation_id`, or `(None, None)`.
    pub fn get(&self, correlation_id: &str) -> (Option<CapturedRequest>, Option<CapturedResponse>) {
        self.cache.get(correlation_id)
    }

    /// Proactively drop expired records. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.cache.sweep_expired()
    }
}

#[async_trait]
impl HttpTransport for TracedTransport {
    async fn send(&self, request: HttpRequest) -> LlmResult<HttpResponse> {
        let correlation_id = match request.correlation_id() {
            Some(id) => id.to_string(),
            None => {
                warn!(url = %request.url, "Refusing to send request without correlation id");
                return Err(LlmError::MissingCorrelationId);
            }
        };

        let captured_request = capture_request(&request);
        let mut response = self.inner.send(request).await?;

        if !response.headers.contains_key(CORRELATION_ID_HEADER) {
            if let Ok(value) = HeaderValue::from_str(&correlation_id) {
                response.headers.insert(CORRELATION_ID_HEADER, value);
            }
        }

        debug!(
            correlation_id = %correlation_id,
            status = %response.status,
            body = %truncate_string(&response.text(), 200),
            "Captured exchange"
        );

        self.cache.insert(CorrelationRecord {
            correlation_id,
            request: captured_request,
            response: capture_response(&response),
            captured_at: Utc::now(),
        });

        Ok(response)
    }
}

// ─────────────────────────────────────────────
// Capture helpers
// ─────────────────────────────────────────────

fn capture_request(request: &HttpRequest) -> CapturedRequest {
    CapturedRequest {
        method: request.method.to_string(),
        url: request.url.clone(),
        headers: capture_headers(&request.headers),
        body: parse_body(&request.body),
    }
}

fn capture_response(response: &HttpResponse) -> CapturedResponse {
    CapturedResponse {
        status: response.status.as_u16(),
        headers: capture_headers(&response.headers),
        body: parse_body(&response.body),
    }
}

/// Flatten headers to `name → value`, joining repeats and redacting secrets.
fn capture_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut captured = BTreeMap::new();
    for name in headers.keys() {
        let value = if REDACTED_HEADERS.contains(&name.as_str()) {
            REDACTED.to_string()
        } else {
            headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join(", ")
        };
        captured.insert(name.as_str().to_string(), value);
    }
    captured
}

/// JSON if the body decodes, raw text otherwise, `null` when empty.
fn parse_body(body: &[u8]) -> serde_json::Value {
    if body.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(body).into_owned()))
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
