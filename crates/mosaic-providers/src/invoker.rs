//! Completion invoker: per-call overrides, correlation, timing, audit.

use std::collections::BTreeMap;
use std::time::Instant;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use mosaic_core::{ConfigError, Message, ProviderSettings};

use crate::audit::{AuditData, Completion};
use crate::client::Client;
use crate::error::{LlmError, LlmResult};
use crate::recipes::PORTKEY_METADATA_HEADER;
use crate::structured::{self, StructuredCall};
use crate::transport::{CORRELATION_ID_HEADER, TRACE_ID_HEADER};

// ─────────────────────────────────────────────
// Options
// ─────────────────────────────────────────────

/// Per-call overrides. Unset fields fall back to the provider settings.
#[derive(Clone, Debug, Default)]
pub struct CompletionOptions {
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub max_retries: Option<u32>,
    /// Extra request headers. A caller-supplied `x-correlation-id` is reused.
    pub headers: HeaderMap,
    /// Gateway metadata for this call only. Replaces the factory's metadata
    /// header when non-empty; ignored by direct providers.
    pub metadata: Option<BTreeMap<String, String>>,
}

impl CompletionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Add a request header. Invalid names or values are skipped with a warning.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => warn!("Invalid header: {}={}", name, value),
        }
        self
    }

    pub fn metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Tag the call with a caller-chosen correlation id.
    pub fn correlation_id(self, id: &str) -> Self {
        self.header(CORRELATION_ID_HEADER, id)
    }
}

/// Effective parameters after applying overrides to settings defaults.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionParams {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    pub max_retries: u32,
}

impl CompletionParams {
    pub fn resolve(settings: &ProviderSettings, options: &CompletionOptions) -> Self {
        CompletionParams {
            model: options
                .model
                .clone()
                .unwrap_or_else(|| settings.default_model.clone()),
            temperature: options.temperature.unwrap_or(settings.temperature),
            max_tokens: options.max_tokens.or(settings.max_tokens),
            max_retries: options.max_retries.unwrap_or(settings.max_retries),
        }
    }
}

// ─────────────────────────────────────────────
// complete
// ─────────────────────────────────────────────

/// Issue one structured completion and attach its audit record.
///
/// Every attempt of the call shares one correlation id, so the audit record
/// holds the last exchange.
pub async fn complete<T>(
    client: &Client,
    messages: Vec<Message>,
    options: CompletionOptions,
) -> LlmResult<Completion<T>>
where
    T: DeserializeOwned + JsonSchema,
{
    let params = CompletionParams::resolve(client.settings(), &options);
    let mut headers = options.headers;

    let correlation_id = headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let id_value = HeaderValue::from_str(&correlation_id)
        .map_err(|e| LlmError::Serialization(format!("invalid correlation id: {e}")))?;
    headers.insert(CORRELATION_ID_HEADER, id_value.clone());
    headers.insert(TRACE_ID_HEADER, id_value);

    if let Some(metadata) = options.metadata.filter(|m| !m.is_empty()) {
        if client.provider().is_gateway() {
            headers.insert(PORTKEY_METADATA_HEADER, metadata_header(client, &metadata)?);
        } else {
            debug!(provider = %client.provider(), "Ignoring gateway metadata for direct provider");
        }
    }

    debug!(
        provider = %client.provider(),
        correlation_id = %correlation_id,
        model = %params.model,
        temperature = params.temperature,
        max_retries = params.max_retries,
        "Starting structured completion"
    );

    let call = StructuredCall {
        messages,
        model: params.model,
        temperature: params.temperature,
        max_tokens: params.max_tokens,
        max_retries: params.max_retries,
        headers,
    };

    let started = Instant::now();
    let result = structured::create::<T>(client, call).await;
    let request_duration = started.elapsed();
    let value = result?;

    let (http_request, http_response) = client.transport().get(&correlation_id);
    if http_request.is_none() {
        warn!(correlation_id = %correlation_id, "No captured exchange for completion");
    }
    debug!(
        correlation_id = %correlation_id,
        duration_ms = request_duration.as_millis() as u64,
        "Structured completion finished"
    );

    Ok(Completion::with_audit(
        value,
        AuditData {
            correlation_id,
            request_duration,
            http_request,
            http_response,
        },
    ))
}

fn metadata_header(client: &Client, metadata: &BTreeMap<String, String>) -> LlmResult<HeaderValue> {
    let json = serde_json::to_string(metadata)?;
    HeaderValue::from_str(&json).map_err(|_| {
        ConfigError::Invalid {
            provider: client.provider(),
            reason: "metadata contains characters not allowed in an HTTP header".into(),
        }
        .into()
    })
}
