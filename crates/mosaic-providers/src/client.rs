//! A realized backend connector: settings + traced transport + recipe output.

use std::sync::Arc;

use reqwest::header::HeaderMap;
use tracing::debug;

use mosaic_core::{ConfigError, ProviderIdentity, ProviderSettings};

use crate::error::LlmResult;
use crate::traced::TracedTransport;
use crate::traits::HttpTransport;
use crate::transport::{HttpRequest, HttpResponse};

/// How a backend is asked for schema-conforming output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StructuredMode {
    /// OpenAI function calling with a forced `tool_choice`.
    OpenAiTools,
    /// OpenAI-compatible `response_format: json_object` plus a schema prompt.
    OpenAiJson,
    /// Anthropic `tool_use` with a forced tool.
    AnthropicTools,
}

/// Where requests for a given model are sent.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Route {
    /// Same URL for every model.
    Fixed(String),
    /// Azure: the model names the deployment in the path.
    Deployment { api_base: String, api_version: String },
}

impl Route {
    fn url(&self, provider: ProviderIdentity, model: &str) -> LlmResult<String> {
        match self {
            Route::Fixed(url) => Ok(url.clone()),
            Route::Deployment {
                api_base,
                api_version,
            } => {
                if !is_path_segment(model) {
                    return Err(ConfigError::Invalid {
                        provider,
                        reason: format!("deployment name '{model}' is not a valid URL path segment"),
                    }
                    .into());
                }
                Ok(format!(
                    "{}/openai/deployments/{}/chat/completions?api-version={}",
                    api_base.trim_end_matches('/'),
                    model,
                    api_version
                ))
            }
        }
    }
}

/// Deployment names: non-empty, unreserved URL characters only.
fn is_path_segment(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'))
}

/// Client bound to one [`ProviderSettings`] and one [`TracedTransport`].
///
/// Built by the recipes in [`crate::recipes`]; the recipe decides the URL,
/// the auth and routing headers, and the structured-output mode.
#[derive(Clone)]
pub struct Client {
    pub(crate) provider: ProviderIdentity,
    pub(crate) settings: Arc<ProviderSettings>,
    pub(crate) transport: Arc<TracedTransport>,
    pub(crate) route: Route,
    pub(crate) headers: HeaderMap,
    pub(crate) mode: StructuredMode,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("provider", &self.provider)
            .field("route", &self.route)
            .field("mode", &self.mode)
            .finish()
    }
}

impl Client {
    pub fn provider(&self) -> ProviderIdentity {
        self.provider
    }

    pub fn settings(&self) -> &Arc<ProviderSettings> {
        &self.settings
    }

    pub fn transport(&self) -> &Arc<TracedTransport> {
        &self.transport
    }

    pub fn mode(&self) -> StructuredMode {
        self.mode
    }

    /// Headers the recipe attaches to every request (auth, routing).
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Request URL for `model`.
    ///
    /// Fails with [`ConfigError::Invalid`] when `model` names an Azure
    /// deployment that cannot be placed in a URL path.
    pub fn url(&self, model: &str) -> LlmResult<String> {
        self.route.url(self.provider, model)
    }

    /// POST a JSON body through the traced transport.
    ///
    /// Per-call `extra` headers win over the recipe's headers.
    pub async fn post(
        &self,
        model: &str,
        body: &serde_json::Value,
        extra: &HeaderMap,
    ) -> LlmResult<HttpResponse> {
        let mut request = HttpRequest::post_json(self.url(model)?, body)?;
        for (name, value) in self.headers.iter().chain(extra.iter()) {
            request.headers.insert(name.clone(), value.clone());
        }

        debug!(provider = %self.provider, model = %model, url = %request.url, "Posting completion request");
        self.transport.send(request).await
    }
}
