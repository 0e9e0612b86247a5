//! Config command handlers

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use docsync_core::SyncConfig;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config_path: Option<&Path>, output: &Output) -> Result<()> {
    let config = load(config_path)?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&config).context("Failed to serialize config")?
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.server_url.as_deref().unwrap_or_default());
        }
        OutputFormat::Human => {
            let effective_path = effective_path(config_path);
            println!("Configuration:");
            println!("  server_url:                 {}", or_unset(&config.server_url));
            println!("  http_url:                   {}", or_unset(&config.http_url));
            println!("  workspace_id:               {}", or_unset(&config.workspace_id));
            println!("  request_timeout_ms:         {}", config.request_timeout_ms);
            println!("  connect_timeout_ms:         {}", config.connect_timeout_ms);
            println!(
                "  initial_reconnect_delay_ms: {}",
                config.initial_reconnect_delay_ms
            );
            println!("  max_reconnect_delay_ms:     {}", config.max_reconnect_delay_ms);
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(key: String, value: String, config_path: Option<&Path>, output: &Output) -> Result<()> {
    let mut config = load(config_path)?;
    apply(&mut config, &key, &value)?;

    config
        .save_to_path(&effective_path(config_path))
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

fn apply(config: &mut SyncConfig, key: &str, value: &str) -> Result<()> {
    let optional = || {
        if value.is_empty() || value == "none" {
            None
        } else {
            Some(value.to_string())
        }
    };
    let millis = || -> Result<u64> {
        value
            .parse()
            .with_context(|| format!("Invalid value for {}. Use a number of milliseconds.", key))
    };

    match key {
        "server_url" => config.server_url = optional(),
        "http_url" => config.http_url = optional(),
        "workspace_id" => config.workspace_id = optional(),
        "request_timeout_ms" => config.request_timeout_ms = millis()?,
        "connect_timeout_ms" => config.connect_timeout_ms = millis()?,
        "initial_reconnect_delay_ms" => config.initial_reconnect_delay_ms = millis()?,
        "max_reconnect_delay_ms" => config.max_reconnect_delay_ms = millis()?,
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: server_url, http_url, workspace_id, request_timeout_ms, \
                 connect_timeout_ms, initial_reconnect_delay_ms, max_reconnect_delay_ms",
                key
            );
        }
    }
    Ok(())
}

fn load(config_path: Option<&Path>) -> Result<SyncConfig> {
    match config_path {
        Some(path) => SyncConfig::load_from_path(path),
        None => SyncConfig::load(),
    }
    .context("Failed to load configuration")
}

fn effective_path(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(SyncConfig::config_file_path)
}

fn or_unset(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("(not set)")
}
