//! `mosaic complete`: one structured completion with its audit record.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use mosaic_core::config::load_config;
use mosaic_core::{Message, SettingsRegistry};
use mosaic_providers::{CompletionOptions, Completion, FactoryOptions, LlmFactory};

use crate::helpers::parse_key_val;

#[derive(Args, Debug)]
pub struct CompleteArgs {
    /// Provider wire name (openai, anthropic, llama, azure_openai,
    /// portkey_azure_openai, portkey_anthropic)
    #[arg(short, long)]
    pub provider: String,

    /// User message
    #[arg(short, long)]
    pub message: String,

    /// Optional system prompt
    #[arg(long)]
    pub system: Option<String>,

    /// Override the provider's default model
    #[arg(long)]
    pub model: Option<String>,

    #[arg(long)]
    pub temperature: Option<f64>,

    #[arg(long)]
    pub max_tokens: Option<u32>,

    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Reuse a correlation id instead of generating one
    #[arg(long)]
    pub correlation_id: Option<String>,

    /// Gateway metadata, repeatable (KEY=VALUE)
    #[arg(long = "meta", value_parser = parse_key_val)]
    pub meta: Vec<(String, String)>,

    /// Enable debug logging
    #[arg(long, default_value_t = false)]
    pub logs: bool,
}

/// Shape the model is asked to fill.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct Answer {
    /// The answer to the user's message.
    pub response: String,
    /// Short explanation of how the answer was reached.
    pub reasoning: String,
}

/// Run the complete command.
pub async fn run(config_path: Option<&Path>, args: CompleteArgs) -> Result<()> {
    let config = load_config(config_path);
    let registry = Arc::new(SettingsRegistry::new(config.providers));

    let options = FactoryOptions {
        metadata: args.meta.iter().cloned().collect::<BTreeMap<_, _>>(),
        transport: None,
        transport_config: config.transport,
    };
    let factory = LlmFactory::from_name(registry, &args.provider, options)
        .with_context(|| format!("failed to set up provider '{}'", args.provider))?;

    let messages = build_messages(&args);
    let completion: Completion<Answer> = factory
        .create_completion(messages, call_options(&args))
        .await
        .context("completion failed")?;

    info!(
        provider = %factory.provider(),
        correlation_id = completion.correlation_id().unwrap_or("-"),
        "Completion done"
    );

    println!("{}", render(factory.provider().as_str(), &completion)?);
    if let Some(id) = completion.correlation_id() {
        eprintln!("{} {}", "correlation id:".dimmed(), id);
    }
    Ok(())
}

fn build_messages(args: &CompleteArgs) -> Vec<Message> {
    let mut messages = Vec::new();
    if let Some(system) = &args.system {
        messages.push(Message::system(system.clone()));
    }
    messages.push(Message::user(args.message.clone()));
    messages
}

fn call_options(args: &CompleteArgs) -> CompletionOptions {
    let mut options = CompletionOptions::new();
    options.model = args.model.clone();
    options.temperature = args.temperature;
    options.max_tokens = args.max_tokens;
    options.max_retries = args.max_retries;
    match &args.correlation_id {
        Some(id) => options.correlation_id(id),
        None => options,
    }
}

fn render(provider: &str, completion: &Completion<Answer>) -> Result<String> {
    let output = serde_json::json!({
        "provider": provider,
        "value": completion.value(),
        "audit": completion.audit(),
    });
    serde_json::to_string_pretty(&output).context("failed to render output")
}
