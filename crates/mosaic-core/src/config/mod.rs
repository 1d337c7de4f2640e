//! Configuration system: file schema, loading, provider settings, registry.
//!
//! # Usage
//! ```no_run
//! use std::sync::Arc;
//! use mosaic_core::config::{self, SettingsRegistry};
//! use mosaic_core::ProviderIdentity;
//!
//! let cfg = config::load_config(None);
//! let registry = Arc::new(SettingsRegistry::new(cfg.providers));
//! let settings = registry.resolve(ProviderIdentity::OpenAi).unwrap();
//! println!("Model: {}", settings.default_model);
//! ```

pub mod loader;
pub mod registry;
pub mod schema;
pub mod settings;
pub mod source;

// Re-export key types
pub use loader::{apply_env_overrides, get_config_path, load_config, save_config};
pub use registry::SettingsRegistry;
pub use schema::{Config, ProviderOverrides, ProvidersConfig, TransportConfig};
pub use settings::{ProviderEndpoint, ProviderSettings};
pub use source::{ConfigSource, EnvSource};
