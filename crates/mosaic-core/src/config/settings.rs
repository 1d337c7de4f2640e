//! Validated per-provider settings.
//!
//! A [`ProviderSettings`] is assembled from the config file section for the
//! provider, then the [`ConfigSource`] (environment), then built-in defaults.
//! Construction fails if a required credential or endpoint is missing.

use std::fmt;

use crate::config::schema::ProviderOverrides;
use crate::config::source::{non_blank, ConfigSource};
use crate::error::ConfigError;
use crate::types::ProviderIdentity;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
pub const LLAMA_BASE_URL: &str = "http://localhost:11434/v1";
pub const PORTKEY_GATEWAY_URL: &str = "https://api.portkey.ai/v1";

/// Ollama ignores the key, but OpenAI-compatible clients still send one.
const LLAMA_PLACEHOLDER_KEY: &str = "key";

const DEFAULT_TEMPERATURE: f64 = 0.0;
const DEFAULT_MAX_RETRIES: u32 = 3;

// ─────────────────────────────────────────────
// Endpoint shapes
// ─────────────────────────────────────────────

/// Where a provider's requests go, by variant.
#[derive(Clone, PartialEq)]
pub enum ProviderEndpoint {
    /// Public API of the vendor (OpenAI, Anthropic).
    Direct { api_base: String },
    /// Self-hosted OpenAI-compatible server.
    Local { base_url: String },
    /// Azure OpenAI resource; the model name is the deployment name.
    Azure { api_base: String, api_version: String },
    /// Portkey relay; `virtual_key` selects the upstream credential.
    Gateway { gateway_url: String, virtual_key: String },
}

impl ProviderEndpoint {
    /// The base URL requests are built from.
    pub fn base_url(&self) -> &str {
        match self {
            ProviderEndpoint::Direct { api_base } => api_base,
            ProviderEndpoint::Local { base_url } => base_url,
            ProviderEndpoint::Azure { api_base, .. } => api_base,
            ProviderEndpoint::Gateway { gateway_url, .. } => gateway_url,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ProviderEndpoint::Direct { .. } => "direct",
            ProviderEndpoint::Local { .. } => "local",
            ProviderEndpoint::Azure { .. } => "azure",
            ProviderEndpoint::Gateway { .. } => "gateway",
        }
    }
}

impl fmt::Debug for ProviderEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct(self.kind());
        d.field("base_url", &self.base_url());
        match self {
            ProviderEndpoint::Azure { api_version, .. } => {
                d.field("api_version", api_version);
            }
            ProviderEndpoint::Gateway { .. } => {
                d.field("virtual_key", &"[REDACTED]");
            }
            _ => {}
        }
        d.finish()
    }
}

// ─────────────────────────────────────────────
// ProviderSettings
// ─────────────────────────────────────────────

/// Validated settings for one provider.
///
/// Immutable once built; a credential change produces a new value through
/// [`ProviderSettings::with_api_key`].
#[derive(Clone, PartialEq)]
pub struct ProviderSettings {
    pub provider: ProviderIdentity,
    /// Primary credential. For gateway providers this is the Portkey key.
    pub api_key: String,
    pub default_model: String,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    pub max_retries: u32,
    pub endpoint: ProviderEndpoint,
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("provider", &self.provider)
            .field("api_key", &"[REDACTED]")
            .field("default_model", &self.default_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl ProviderSettings {
    /// Assemble settings for `provider`.
    ///
    /// Lookup order per field: config file section → `source` → default.
    /// Every missing required key is reported in one error.
    pub fn resolve(
        provider: ProviderIdentity,
        overrides: &ProviderOverrides,
        source: &dyn ConfigSource,
    ) -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let mut required = |explicit: &Option<String>, key: &'static str| {
            lookup(explicit, source, key).unwrap_or_else(|| {
                missing.push(key);
                String::new()
            })
        };

        let (api_key, endpoint) = match provider {
            ProviderIdentity::OpenAi => {
                let api_key = required(&overrides.api_key, "OPENAI_API_KEY");
                let api_base = lookup(&overrides.api_base, source, "OPENAI_BASE_URL")
                    .unwrap_or_else(|| OPENAI_API_BASE.to_string());
                (api_key, ProviderEndpoint::Direct { api_base })
            }
            ProviderIdentity::Anthropic => {
                let api_key = required(&overrides.api_key, "ANTHROPIC_API_KEY");
                let api_base = lookup(&overrides.api_base, source, "ANTHROPIC_BASE_URL")
                    .unwrap_or_else(|| ANTHROPIC_API_BASE.to_string());
                (api_key, ProviderEndpoint::Direct { api_base })
            }
            ProviderIdentity::Llama => {
                let api_key = lookup(&overrides.api_key, source, "LLAMA_API_KEY")
                    .unwrap_or_else(|| LLAMA_PLACEHOLDER_KEY.to_string());
                let base_url = lookup(&overrides.api_base, source, "LLAMA_BASE_URL")
                    .unwrap_or_else(|| LLAMA_BASE_URL.to_string());
                (api_key, ProviderEndpoint::Local { base_url })
            }
            ProviderIdentity::AzureOpenAi => {
                let api_key = required(&overrides.api_key, "AZURE_OPENAI_API_KEY");
                let api_base = required(&overrides.api_base, "AZURE_OPENAI_API_BASE");
                let api_version = required(&overrides.api_version, "AZURE_OPENAI_API_VERSION");
                (api_key, ProviderEndpoint::Azure { api_base, api_version })
            }
            ProviderIdentity::PortkeyAzureOpenAi | ProviderIdentity::PortkeyAnthropic => {
                let virtual_key_env = if provider == ProviderIdentity::PortkeyAnthropic {
                    "PORTKEY_ANTHROPIC_VIRTUAL_KEY"
                } else {
                    "PORTKEY_AZURE_OPENAI_VIRTUAL_KEY"
                };
                let api_key = required(&overrides.api_key, "PORTKEY_API_KEY");
                let virtual_key = required(&overrides.virtual_key, virtual_key_env);
                let gateway_url = lookup(&overrides.api_base, source, "PORTKEY_GATEWAY_URL")
                    .unwrap_or_else(|| PORTKEY_GATEWAY_URL.to_string());
                (
                    api_key,
                    ProviderEndpoint::Gateway {
                        gateway_url,
                        virtual_key,
                    },
                )
            }
        };

        if !missing.is_empty() {
            return Err(ConfigError::MissingCredential {
                provider,
                keys: missing,
            });
        }

        let (default_model, default_max_tokens) = model_defaults(provider);
        let settings = ProviderSettings {
            provider,
            api_key,
            default_model: non_blank(overrides.default_model.clone())
                .unwrap_or_else(|| default_model.to_string()),
            temperature: overrides.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: overrides.max_tokens.or(default_max_tokens),
            max_retries: overrides.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            endpoint,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Check the field invariants: non-empty credentials and endpoints, and a
    /// temperature within `0.0..=2.0`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            provider: self.provider,
            reason: reason.to_string(),
        };

        if self.api_key.trim().is_empty() {
            return Err(invalid("api key is empty"));
        }
        if self.default_model.trim().is_empty() {
            return Err(invalid("default model is empty"));
        }
        if !self.temperature.is_finite() || !(0.0..=2.0).contains(&self.temperature) {
            return Err(invalid("temperature must be between 0.0 and 2.0"));
        }
        if self.endpoint.base_url().trim().is_empty() {
            return Err(invalid("endpoint url is empty"));
        }
        match &self.endpoint {
            ProviderEndpoint::Azure { api_version, .. } if api_version.trim().is_empty() => {
                Err(invalid("azure api version is empty"))
            }
            ProviderEndpoint::Gateway { virtual_key, .. } if virtual_key.trim().is_empty() => {
                Err(invalid("gateway virtual key is empty"))
            }
            _ => Ok(()),
        }
    }

    /// A copy of these settings with a replaced primary credential.
    pub fn with_api_key(&self, api_key: impl Into<String>) -> Result<Self, ConfigError> {
        let settings = ProviderSettings {
            api_key: api_key.into(),
            ..self.clone()
        };
        settings.validate()?;
        Ok(settings)
    }
}

fn lookup(explicit: &Option<String>, source: &dyn ConfigSource, key: &str) -> Option<String> {
    non_blank(explicit.clone()).or_else(|| source.get(key))
}

/// Default model and max output tokens. Anthropic requires a token limit.
fn model_defaults(provider: ProviderIdentity) -> (&'static str, Option<u32>) {
    match provider {
        ProviderIdentity::OpenAi
        | ProviderIdentity::AzureOpenAi
        | ProviderIdentity::PortkeyAzureOpenAi => ("gpt-4", None),
        ProviderIdentity::Anthropic | ProviderIdentity::PortkeyAnthropic => {
            ("claude-3-sonnet-20240229", Some(1024))
        }
        ProviderIdentity::Llama => ("llama3", None),
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
