//! Core building blocks for Mosaic.
//!
//! - [`types`]: chat messages and the closed [`ProviderIdentity`] enum
//! - [`config`]: config file schema/loader, provider settings, and the
//!   memoizing [`SettingsRegistry`]
//! - [`error`]: configuration error types shared by every crate

pub mod config;
pub mod error;
pub mod types;
pub mod utils;

pub use config::{ProviderEndpoint, ProviderSettings, SettingsRegistry};
pub use error::{ConfigError, UnsupportedProvider};
pub use types::{Message, ProviderIdentity, Role};
