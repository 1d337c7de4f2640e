//! Settings registry: one memoized [`ProviderSettings`] per provider.
//!
//! Built once by the application entry point and shared by `Arc`. Each
//! provider has its own slot lock, so concurrent first resolution of the same
//! provider materializes a single instance while other providers proceed
//! independently.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::config::schema::ProvidersConfig;
use crate::config::settings::ProviderSettings;
use crate::config::source::{ConfigSource, EnvSource};
use crate::error::ConfigError;
use crate::types::ProviderIdentity;

type Slot = Mutex<Option<Arc<ProviderSettings>>>;

/// Resolves and caches provider settings.
pub struct SettingsRegistry {
    providers: ProvidersConfig,
    source: Box<dyn ConfigSource>,
    slots: Vec<Slot>,
}

impl std::fmt::Debug for SettingsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cached: Vec<_> = ProviderIdentity::ALL
            .into_iter()
            .filter(|p| self.slot(*p).is_some())
            .collect();
        f.debug_struct("SettingsRegistry")
            .field("cached", &cached)
            .finish()
    }
}

impl SettingsRegistry {
    /// Registry over the given config sections, reading the process environment.
    pub fn new(providers: ProvidersConfig) -> Self {
        Self::with_source(providers, EnvSource)
    }

    /// Registry with no config file sections, environment only.
    pub fn from_env() -> Self {
        Self::new(ProvidersConfig::default())
    }

    /// Registry reading credentials from a custom source.
    pub fn with_source(providers: ProvidersConfig, source: impl ConfigSource + 'static) -> Self {
        SettingsRegistry {
            providers,
            source: Box::new(source),
            slots: ProviderIdentity::ALL.iter().map(|_| Mutex::new(None)).collect(),
        }
    }

    /// Settings for `provider`, resolving them on first access.
    ///
    /// Repeated calls return the same `Arc` until the credential is replaced.
    pub fn resolve(&self, provider: ProviderIdentity) -> Result<Arc<ProviderSettings>, ConfigError> {
        let mut slot = self.slot(provider);
        if let Some(settings) = slot.as_ref() {
            return Ok(Arc::clone(settings));
        }

        let settings = Arc::new(ProviderSettings::resolve(
            provider,
            self.providers.get(provider),
            self.source.as_ref(),
        )?);
        debug!(
            provider = %provider,
            model = %settings.default_model,
            "Resolved provider settings"
        );
        *slot = Some(Arc::clone(&settings));
        Ok(settings)
    }

    /// Whether `provider` has everything it needs.
    pub fn is_configured(&self, provider: ProviderIdentity) -> bool {
        self.resolve(provider).is_ok()
    }

    /// Swap in a new primary credential for `provider`.
    ///
    /// Works even if the provider never resolved (e.g. its env key is unset):
    /// the new key stands in for the missing one. Clients built from the old
    /// settings keep them until they are rebuilt.
    pub fn replace_api_key(
        &self,
        provider: ProviderIdentity,
        api_key: &str,
    ) -> Result<Arc<ProviderSettings>, ConfigError> {
        let mut slot = self.slot(provider);
        let replaced = match slot.as_ref() {
            Some(current) => current.with_api_key(api_key)?,
            None => {
                let mut overrides = self.providers.get(provider).clone();
                overrides.api_key = Some(api_key.to_string());
                ProviderSettings::resolve(provider, &overrides, self.source.as_ref())?
            }
        };

        info!(provider = %provider, "Replaced provider credential");
        let replaced = Arc::new(replaced);
        *slot = Some(Arc::clone(&replaced));
        Ok(replaced)
    }

    /// Drop every memoized entry; the next access resolves again.
    pub fn clear(&self) {
        for provider in ProviderIdentity::ALL {
            self.slot(provider).take();
        }
    }

    fn slot(&self, provider: ProviderIdentity) -> MutexGuard<'_, Option<Arc<ProviderSettings>>> {
        self.slots[provider.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SettingsRegistry {
    fn default() -> Self {
        Self::from_env()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
