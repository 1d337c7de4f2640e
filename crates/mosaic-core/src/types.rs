//! Core types for Mosaic: chat messages and provider identities.
//!
//! Messages use the role/content shape shared by every supported backend.
//! Backend-specific wire formats (OpenAI chat, Anthropic messages) are built
//! from these in `mosaic-providers`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnsupportedProvider;

// ─────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────

/// Author of a chat message.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single chat message, e.g. `{"role": "user", "content": "Hello"}`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Message {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Message {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Message {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ─────────────────────────────────────────────
// Provider identity
// ─────────────────────────────────────────────

/// The closed set of backends Mosaic can talk to.
///
/// Used as the lookup key for settings, recipes and config sections.
/// Parses from (and displays as) its wire name, e.g. `"azure_openai"`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderIdentity {
    /// OpenAI chat completions, direct.
    #[serde(rename = "openai")]
    OpenAi,
    /// Anthropic messages API, direct.
    #[serde(rename = "anthropic")]
    Anthropic,
    /// Local OpenAI-compatible server (Ollama by default).
    #[serde(rename = "llama")]
    Llama,
    /// Azure-hosted OpenAI deployment.
    #[serde(rename = "azure_openai")]
    AzureOpenAi,
    /// Azure OpenAI routed through the Portkey gateway.
    #[serde(rename = "portkey_azure_openai")]
    PortkeyAzureOpenAi,
    /// Anthropic routed through the Portkey gateway.
    #[serde(rename = "portkey_anthropic")]
    PortkeyAnthropic,
}

impl ProviderIdentity {
    /// Every provider, in display order.
    pub const ALL: [ProviderIdentity; 6] = [
        ProviderIdentity::OpenAi,
        ProviderIdentity::Anthropic,
        ProviderIdentity::Llama,
        ProviderIdentity::AzureOpenAi,
        ProviderIdentity::PortkeyAzureOpenAi,
        ProviderIdentity::PortkeyAnthropic,
    ];

    /// Wire name used in config files, env var prefixes and CLI flags.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderIdentity::OpenAi => "openai",
            ProviderIdentity::Anthropic => "anthropic",
            ProviderIdentity::Llama => "llama",
            ProviderIdentity::AzureOpenAi => "azure_openai",
            ProviderIdentity::PortkeyAzureOpenAi => "portkey_azure_openai",
            ProviderIdentity::PortkeyAnthropic => "portkey_anthropic",
        }
    }

    /// Human-readable name for `mosaic status`.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderIdentity::OpenAi => "OpenAI",
            ProviderIdentity::Anthropic => "Anthropic",
            ProviderIdentity::Llama => "Llama (local)",
            ProviderIdentity::AzureOpenAi => "Azure OpenAI",
            ProviderIdentity::PortkeyAzureOpenAi => "Portkey / Azure OpenAI",
            ProviderIdentity::PortkeyAnthropic => "Portkey / Anthropic",
        }
    }

    /// Whether requests are relayed through the Portkey gateway.
    pub fn is_gateway(&self) -> bool {
        matches!(
            self,
            ProviderIdentity::PortkeyAzureOpenAi | ProviderIdentity::PortkeyAnthropic
        )
    }

    /// Stable position in [`ProviderIdentity::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for ProviderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderIdentity {
    type Err = UnsupportedProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ProviderIdentity::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| UnsupportedProvider(s.to_string()))
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
