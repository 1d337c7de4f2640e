//! Configuration schema: the on-disk `~/.mosaic/config.json` layout.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.
//! Every field is optional on disk; missing values fall back to the
//! provider defaults in [`super::settings`] or the transport defaults below.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::ProviderIdentity;

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration: loaded from `~/.mosaic/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub providers: ProvidersConfig,
    pub transport: TransportConfig,
}

// ─────────────────────────────────────────────
// Providers
// ─────────────────────────────────────────────

/// Explicit per-provider values. Anything left `None` is read from the
/// environment or falls back to the provider default.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderOverrides {
    /// Primary credential (the shared Portkey key for gateway providers).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// Base URL (direct/local providers), Azure endpoint, or gateway URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Azure API version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    /// Portkey virtual key for gateway providers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_key: Option<String>,
}

/// One [`ProviderOverrides`] section per supported provider.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openai: ProviderOverrides,
    pub anthropic: ProviderOverrides,
    pub llama: ProviderOverrides,
    pub azure_openai: ProviderOverrides,
    pub portkey_azure_openai: ProviderOverrides,
    pub portkey_anthropic: ProviderOverrides,
}

impl ProvidersConfig {
    /// The section for `provider`.
    pub fn get(&self, provider: ProviderIdentity) -> &ProviderOverrides {
        match provider {
            ProviderIdentity::OpenAi => &self.openai,
            ProviderIdentity::Anthropic => &self.anthropic,
            ProviderIdentity::Llama => &self.llama,
            ProviderIdentity::AzureOpenAi => &self.azure_openai,
            ProviderIdentity::PortkeyAzureOpenAi => &self.portkey_azure_openai,
            ProviderIdentity::PortkeyAnthropic => &self.portkey_anthropic,
        }
    }

    /// Mutable section for `provider`.
    pub fn get_mut(&mut self, provider: ProviderIdentity) -> &mut ProviderOverrides {
        match provider {
            ProviderIdentity::OpenAi => &mut self.openai,
            ProviderIdentity::Anthropic => &mut self.anthropic,
            ProviderIdentity::Llama => &mut self.llama,
            ProviderIdentity::AzureOpenAi => &mut self.azure_openai,
            ProviderIdentity::PortkeyAzureOpenAi => &mut self.portkey_azure_openai,
            ProviderIdentity::PortkeyAnthropic => &mut self.portkey_anthropic,
        }
    }
}

// ─────────────────────────────────────────────
// Transport
// ─────────────────────────────────────────────

/// Traced transport limits.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportConfig {
    /// Maximum number of captured exchanges kept in memory.
    pub cache_capacity: usize,
    /// Seconds a captured exchange stays retrievable.
    pub cache_ttl_secs: u64,
    /// Per-request timeout of the underlying HTTP client.
    pub request_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 1000,
            cache_ttl_secs: 3600,
            request_timeout_secs: 120,
        }
    }
}

impl TransportConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
