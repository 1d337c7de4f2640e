//! Config loader: reads `~/.mosaic/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.mosaic/config.json`
//! 3. Environment variables `MOSAIC_<SECTION>__<FIELD>` (override JSON)
//!
//! Credentials are not read here; the [`SettingsRegistry`](super::SettingsRegistry)
//! looks them up per provider when first needed.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::schema::Config;
use super::source::{ConfigSource, EnvSource};
use crate::types::ProviderIdentity;

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path (or `path`) + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);
    apply_env_overrides(load_config_from_path(&config_path), &EnvSource)
}

/// Load config from a specific file path, without env overrides.
fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return Config::default();
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return Config::default();
        }
    };

    match serde_json::from_str(&content) {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to parse config file {}: {}", path.display(), e);
            Config::default()
        }
    }
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config).map_err(std::io::Error::other)?;

    std::fs::write(&config_path, json)?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Env var format: `MOSAIC_<SECTION>__<FIELD>` (double underscore as delimiter).
///
/// Supported overrides:
/// - `MOSAIC_TRANSPORT__CACHE_CAPACITY` → `transport.cache_capacity`
/// - `MOSAIC_TRANSPORT__CACHE_TTL_SECS` → `transport.cache_ttl_secs`
/// - `MOSAIC_TRANSPORT__REQUEST_TIMEOUT_SECS` → `transport.request_timeout_secs`
/// - `MOSAIC_PROVIDERS__<NAME>__DEFAULT_MODEL` → `providers.<name>.default_model`
/// - `MOSAIC_PROVIDERS__<NAME>__TEMPERATURE` → `providers.<name>.temperature`
/// - `MOSAIC_PROVIDERS__<NAME>__MAX_TOKENS` → `providers.<name>.max_tokens`
/// - `MOSAIC_PROVIDERS__<NAME>__MAX_RETRIES` → `providers.<name>.max_retries`
///
/// Unparseable numbers are ignored with a warning.
pub fn apply_env_overrides(mut config: Config, source: &dyn ConfigSource) -> Config {
    if let Some(n) = parse_var(source, "MOSAIC_TRANSPORT__CACHE_CAPACITY") {
        config.transport.cache_capacity = n;
    }
    if let Some(n) = parse_var(source, "MOSAIC_TRANSPORT__CACHE_TTL_SECS") {
        config.transport.cache_ttl_secs = n;
    }
    if let Some(n) = parse_var(source, "MOSAIC_TRANSPORT__REQUEST_TIMEOUT_SECS") {
        config.transport.request_timeout_secs = n;
    }

    for provider in ProviderIdentity::ALL {
        let prefix = format!("MOSAIC_PROVIDERS__{}", provider.as_str().to_ascii_uppercase());
        let section = config.providers.get_mut(provider);

        if let Some(model) = source.get(&format!("{prefix}__DEFAULT_MODEL")) {
            section.default_model = Some(model);
        }
        if let Some(t) = parse_var(source, &format!("{prefix}__TEMPERATURE")) {
            section.temperature = Some(t);
        }
        if let Some(n) = parse_var(source, &format!("{prefix}__MAX_TOKENS")) {
            section.max_tokens = Some(n);
        }
        if let Some(n) = parse_var(source, &format!("{prefix}__MAX_RETRIES")) {
            section.max_retries = Some(n);
        }
    }

    config
}

fn parse_var<T: std::str::FromStr>(source: &dyn ConfigSource, key: &str) -> Option<T> {
    let raw = source.get(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}: cannot parse {:?}", key, raw);
            None
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp_json(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_load_missing_file() {
        let config = load_config_from_path(Path::new("/nonexistent/path/config.json"));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_valid_json() {
        let file = write_temp_json(
            r#"{
            "providers": {
                "openai": { "defaultModel": "gpt-4o", "maxRetries": 5 },
                "azure_openai": { "apiBase": "https://res.openai.azure.com", "apiVersion": "2024-02-01" }
            },
            "transport": { "cacheCapacity": 10 }
        }"#,
        );

        let config = load_config_from_path(file.path());
        assert_eq!(config.providers.openai.default_model.as_deref(), Some("gpt-4o"));
        assert_eq!(config.providers.openai.max_retries, Some(5));
        assert_eq!(
            config.providers.azure_openai.api_version.as_deref(),
            Some("2024-02-01")
        );
        assert_eq!(config.transport.cache_capacity, 10);
        // Default preserved
        assert_eq!(config.transport.cache_ttl_secs, 3600);
    }

    #[test]
    fn test_load_invalid_json_returns_defaults() {
        let file = write_temp_json("not valid json {{{");
        assert_eq!(load_config_from_path(file.path()), Config::default());
    }

    #[test]
    fn test_load_empty_json() {
        let file = write_temp_json("{}");
        assert_eq!(load_config_from_path(file.path()), Config::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.providers.anthropic.default_model = Some("claude-3-opus-20240229".into());
        config.transport.cache_ttl_secs = 60;

        save_config(&config, Some(&path)).unwrap();

        let reloaded = load_config_from_path(&path);
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_saved_json_uses_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        save_config(&Config::default(), Some(&path)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let raw: serde_json::Value = serde_json::from_str(&content).unwrap();

        assert!(raw["transport"].get("cacheCapacity").is_some());
        assert!(raw["transport"].get("cache_capacity").is_none());
        assert!(raw["providers"].get("portkey_azure_openai").is_some());
    }

    #[test]
    fn test_env_override_transport() {
        let config = apply_env_overrides(
            Config::default(),
            &env(&[
                ("MOSAIC_TRANSPORT__CACHE_CAPACITY", "16"),
                ("MOSAIC_TRANSPORT__CACHE_TTL_SECS", "30"),
            ]),
        );
        assert_eq!(config.transport.cache_capacity, 16);
        assert_eq!(config.transport.cache_ttl_secs, 30);
        assert_eq!(config.transport.request_timeout_secs, 120);
    }

    #[test]
    fn test_env_override_provider_defaults() {
        let config = apply_env_overrides(
            Config::default(),
            &env(&[
                ("MOSAIC_PROVIDERS__AZURE_OPENAI__DEFAULT_MODEL", "gpt-4o"),
                ("MOSAIC_PROVIDERS__LLAMA__TEMPERATURE", "0.3"),
                ("MOSAIC_PROVIDERS__ANTHROPIC__MAX_TOKENS", "2048"),
            ]),
        );
        assert_eq!(config.providers.azure_openai.default_model.as_deref(), Some("gpt-4o"));
        assert_eq!(config.providers.llama.temperature, Some(0.3));
        assert_eq!(config.providers.anthropic.max_tokens, Some(2048));
    }

    #[test]
    fn test_env_override_bad_number_ignored() {
        let config = apply_env_overrides(
            Config::default(),
            &env(&[("MOSAIC_TRANSPORT__CACHE_CAPACITY", "lots")]),
        );
        assert_eq!(config.transport.cache_capacity, 1000);
    }
}
