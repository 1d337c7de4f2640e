//! Backend recipes: one constructor per [`ProviderIdentity`] variant.
//!
//! | provider | URL | auth | mode |
//! |---|---|---|---|
//! | openai | `{base}/chat/completions` | Bearer | tools |
//! | anthropic | `{base}/messages` | `x-api-key` | Anthropic tools |
//! | llama | `{base_url}/chat/completions` | Bearer | JSON |
//! | azure_openai | `{base}/openai/deployments/{model}/…` | `api-key` | tools |
//! | portkey_azure_openai | `{gateway}/chat/completions` | Portkey headers | tools |
//! | portkey_anthropic | `{gateway}/messages` | Portkey headers | Anthropic tools |

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tracing::info;

use mosaic_core::{ConfigError, ProviderEndpoint, ProviderIdentity, ProviderSettings};

use crate::client::{Client, Route, StructuredMode};
use crate::error::LlmResult;
use crate::traced::TracedTransport;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub const PORTKEY_API_KEY_HEADER: &str = "x-portkey-api-key";
pub const PORTKEY_PROVIDER_HEADER: &str = "x-portkey-provider";
pub const PORTKEY_VIRTUAL_KEY_HEADER: &str = "x-portkey-virtual-key";
pub const PORTKEY_METADATA_HEADER: &str = "x-portkey-metadata";

/// Build the client for `settings.provider`.
///
/// `metadata` only matters for gateway providers, where it is forwarded as
/// JSON in `x-portkey-metadata`.
pub fn build_client(
    settings: Arc<ProviderSettings>,
    transport: Arc<TracedTransport>,
    metadata: &BTreeMap<String, String>,
) -> LlmResult<Client> {
    let client = match settings.provider {
        ProviderIdentity::OpenAi => openai(settings, transport)?,
        ProviderIdentity::Anthropic => anthropic(settings, transport)?,
        ProviderIdentity::Llama => llama(settings, transport)?,
        ProviderIdentity::AzureOpenAi => azure_openai(settings, transport)?,
        ProviderIdentity::PortkeyAzureOpenAi => portkey_azure_openai(settings, transport, metadata)?,
        ProviderIdentity::PortkeyAnthropic => portkey_anthropic(settings, transport, metadata)?,
    };
    info!(
        provider = %client.provider,
        model = %client.settings.default_model,
        mode = ?client.mode,
        "Built LLM client"
    );
    Ok(client)
}

// ─────────────────────────────────────────────
// Direct backends
// ─────────────────────────────────────────────

fn openai(settings: Arc<ProviderSettings>, transport: Arc<TracedTransport>) -> LlmResult<Client> {
    let base = direct_base(&settings)?;
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, bearer(&settings)?);
    Ok(Client {
        provider: ProviderIdentity::OpenAi,
        route: Route::Fixed(join(&base, "chat/completions")),
        settings,
        transport,
        headers,
        mode: StructuredMode::OpenAiTools,
    })
}

fn anthropic(settings: Arc<ProviderSettings>, transport: Arc<TracedTransport>) -> LlmResult<Client> {
    let base = direct_base(&settings)?;
    let mut headers = HeaderMap::new();
    headers.insert("x-api-key", header_value(&settings, &settings.api_key)?);
    headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
    Ok(Client {
        provider: ProviderIdentity::Anthropic,
        route: Route::Fixed(join(&base, "messages")),
        settings,
        transport,
        headers,
        mode: StructuredMode::AnthropicTools,
    })
}

/// Ollama and other OpenAI-compatible local servers; JSON mode since most
/// local models do not support forced tool calls.
fn llama(settings: Arc<ProviderSettings>, transport: Arc<TracedTransport>) -> LlmResult<Client> {
    let base_url = match &settings.endpoint {
        ProviderEndpoint::Local { base_url } => base_url.clone(),
        other => return Err(endpoint_mismatch(&settings, other)),
    };
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, bearer(&settings)?);
    Ok(Client {
        provider: ProviderIdentity::Llama,
        route: Route::Fixed(join(&base_url, "chat/completions")),
        settings,
        transport,
        headers,
        mode: StructuredMode::OpenAiJson,
    })
}

fn azure_openai(settings: Arc<ProviderSettings>, transport: Arc<TracedTransport>) -> LlmResult<Client> {
    let route = match &settings.endpoint {
        ProviderEndpoint::Azure {
            api_base,
            api_version,
        } => Route::Deployment {
            api_base: api_base.clone(),
            api_version: api_version.clone(),
        },
        other => return Err(endpoint_mismatch(&settings, other)),
    };
    let mut headers = HeaderMap::new();
    headers.insert("api-key", header_value(&settings, &settings.api_key)?);
    Ok(Client {
        provider: ProviderIdentity::AzureOpenAi,
        route,
        settings,
        transport,
        headers,
        mode: StructuredMode::OpenAiTools,
    })
}

// ─────────────────────────────────────────────
// Gateway backends (Portkey)
// ─────────────────────────────────────────────

fn portkey_azure_openai(
    settings: Arc<ProviderSettings>,
    transport: Arc<TracedTransport>,
    metadata: &BTreeMap<String, String>,
) -> LlmResult<Client> {
    let (gateway_url, headers) = gateway_headers(&settings, "azure-openai", metadata)?;
    Ok(Client {
        provider: ProviderIdentity::PortkeyAzureOpenAi,
        route: Route::Fixed(join(&gateway_url, "chat/completions")),
        settings,
        transport,
        headers,
        mode: StructuredMode::OpenAiTools,
    })
}

fn portkey_anthropic(
    settings: Arc<ProviderSettings>,
    transport: Arc<TracedTransport>,
    metadata: &BTreeMap<String, String>,
) -> LlmResult<Client> {
    let (gateway_url, mut headers) = gateway_headers(&settings, "anthropic", metadata)?;
    headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
    Ok(Client {
        provider: ProviderIdentity::PortkeyAnthropic,
        route: Route::Fixed(join(&gateway_url, "messages")),
        settings,
        transport,
        headers,
        mode: StructuredMode::AnthropicTools,
    })
}

/// Portkey routing headers; returns the gateway URL alongside.
fn gateway_headers(
    settings: &ProviderSettings,
    upstream: &'static str,
    metadata: &BTreeMap<String, String>,
) -> LlmResult<(String, HeaderMap)> {
    let (gateway_url, virtual_key) = match &settings.endpoint {
        ProviderEndpoint::Gateway {
            gateway_url,
            virtual_key,
        } => (gateway_url.clone(), virtual_key),
        other => return Err(endpoint_mismatch(settings, other)),
    };

    let mut headers = HeaderMap::new();
    headers.insert(PORTKEY_API_KEY_HEADER, header_value(settings, &settings.api_key)?);
    headers.insert(PORTKEY_PROVIDER_HEADER, HeaderValue::from_static(upstream));
    headers.insert(PORTKEY_VIRTUAL_KEY_HEADER, header_value(settings, virtual_key)?);
    if !metadata.is_empty() {
        let json = serde_json::to_string(metadata)?;
        headers.insert(PORTKEY_METADATA_HEADER, header_value(settings, &json)?);
    }
    Ok((gateway_url, headers))
}

// ─────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────

fn direct_base(settings: &ProviderSettings) -> LlmResult<String> {
    match &settings.endpoint {
        ProviderEndpoint::Direct { api_base } => Ok(api_base.clone()),
        other => Err(endpoint_mismatch(settings, other)),
    }
}

fn join(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}

fn bearer(settings: &ProviderSettings) -> LlmResult<HeaderValue> {
    let mut value = header_value(settings, &format!("Bearer {}", settings.api_key))?;
    value.set_sensitive(true);
    Ok(value)
}

fn header_value(settings: &ProviderSettings, value: &str) -> LlmResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| {
        ConfigError::Invalid {
            provider: settings.provider,
            reason: "credential or metadata contains characters not allowed in an HTTP header".into(),
        }
        .into()
    })
}

fn endpoint_mismatch(settings: &ProviderSettings, endpoint: &ProviderEndpoint) -> crate::error::LlmError {
    ConfigError::Invalid {
        provider: settings.provider,
        reason: format!("endpoint {endpoint:?} does not fit this provider"),
    }
    .into()
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
