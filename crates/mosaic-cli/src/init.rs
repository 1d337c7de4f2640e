//! `mosaic init`: write a default config file.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use mosaic_core::config::{get_config_path, save_config, Config};

/// Run the init command.
pub fn run(config_path: Option<&Path>) -> Result<()> {
    println!();
    println!("{}", "Mosaic: Setup".cyan().bold());
    println!();

    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(get_config_path);

    if path.exists() {
        println!("  {} config already exists at {}", "✓".green(), path.display());
    } else {
        save_config(&Config::default(), Some(&path))
            .with_context(|| format!("failed to write config: {}", path.display()))?;
        println!("  {} created config at {}", "✓".green(), path.display());
    }

    println!();
    println!(
        "{}",
        "Set provider keys in the environment (e.g. OPENAI_API_KEY) or under \"providers\" in the config."
            .dimmed()
    );
    println!();
    Ok(())
}
