//! Configuration errors.

use crate::types::ProviderIdentity;

/// A provider's settings could not be assembled.
///
/// Never retryable: the caller has to fix the environment or config file.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// One or more required credentials/endpoints are not set.
    #[error("missing configuration for {provider}: set {}", .keys.join(", "))]
    MissingCredential {
        provider: ProviderIdentity,
        keys: Vec<&'static str>,
    },

    /// A value is present but unusable.
    #[error("invalid configuration for {provider}: {reason}")]
    Invalid {
        provider: ProviderIdentity,
        reason: String,
    },
}

impl ConfigError {
    /// The provider whose settings failed.
    pub fn provider(&self) -> ProviderIdentity {
        match self {
            ConfigError::MissingCredential { provider, .. }
            | ConfigError::Invalid { provider, .. } => *provider,
        }
    }
}

/// A provider name outside the supported set.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unsupported LLM provider: '{0}' is not supported")]
pub struct UnsupportedProvider(pub String);
