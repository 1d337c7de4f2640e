//! `mosaic status`: show configuration and provider status.
//!
//! - Shows config path and transport cache settings
//! - Shows whether each provider's credentials resolve

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use mosaic_core::config::{get_config_path, load_config};
use mosaic_core::{ProviderIdentity, SettingsRegistry};

use crate::helpers::check_mark;

/// Run the status command.
pub fn run(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path);
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(get_config_path);

    println!();
    println!("{}", "Mosaic Status".cyan().bold());
    println!();

    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        path.display(),
        if path.exists() {
            "✓".green().to_string()
        } else {
            "(not found, using defaults)".red().to_string()
        }
    );
    println!(
        "  {:<18} {}",
        "Transport:".bold(),
        format!(
            "cache {} entries, ttl {}s, timeout {}s",
            config.transport.cache_capacity,
            config.transport.cache_ttl_secs,
            config.transport.request_timeout_secs
        )
        .dimmed()
    );

    println!();
    println!("  {}", "Providers:".bold());
    let registry = SettingsRegistry::new(config.providers);
    for provider in ProviderIdentity::ALL {
        println!("    {}", provider_row(&registry, provider));
    }
    println!();

    Ok(())
}

fn provider_row(registry: &SettingsRegistry, provider: ProviderIdentity) -> String {
    format!(
        "{:<24} {} {}",
        provider.as_str(),
        format!("{:<24}", provider.display_name()).dimmed(),
        provider_status(registry, provider)
    )
}

fn provider_status(registry: &SettingsRegistry, provider: ProviderIdentity) -> String {
    match registry.resolve(provider) {
        Ok(settings) => check_mark(true, &format!("model {}", settings.default_model)),
        Err(err) => check_mark(false, &err.to_string()),
    }
}
