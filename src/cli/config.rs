// envsync/src/cli/config.rs
use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use serde_json::Value;
use std::fs;
use std::path::Path;

use super::Prompt;
use crate::config::{AppConfig, RawJsonConfig};
use crate::environment::DEVELOPMENT;

const REDACTED: &str = "********";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ConfigAction {
    #[default]
    Show,
    Edit,
    Reset,
}

/// Effective configuration as JSON, with the webhook URL masked.
pub fn render(config: &AppConfig, environment: Option<&str>) -> Result<String> {
    let value = match environment {
        Some(name) => serde_json::to_value(config.environments.resolve(name)?.to_raw())?,
        None => {
            let mut value = serde_json::to_value(config.to_raw())?;
            if let Some(webhook) = value.pointer_mut("/options/slack_webhook_url") {
                if !webhook.is_null() {
                    *webhook = Value::String(REDACTED.to_string());
                }
            }
            value
        }
    };
    Ok(serde_json::to_string_pretty(&value)?)
}

fn read_raw(config_path: &Path) -> Result<RawJsonConfig> {
    let content = fs::read_to_string(config_path).with_context(|| {
        format!(
            "Configuration file {} not found. Run `envsync init` first.",
            config_path.display()
        )
    })?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", config_path.display()))
}

fn edit_environment(raw: &mut RawJsonConfig, prompt: &mut dyn Prompt, name: Option<&str>) -> Result<()> {
    let names: Vec<String> = raw.environments.keys().cloned().collect();
    if names.is_empty() {
        bail!("No environments configured");
    }
    let name = match name {
        Some(name) => name.to_string(),
        None => prompt.ask(
            &format!("Which environment would you like to edit? ({})", names.join(", ")),
            names.first().map(String::as_str),
        )?,
    };
    let Some(entry) = raw.environments.get_mut(&name) else {
        bail!("Environment '{}' not found. Available environments: {}", name, names.join(", "));
    };

    println!("Editing {} environment:", name);
    let url = prompt.ask("Site URL", entry.url.as_deref())?;
    let uploads_path = prompt.ask("Uploads path", entry.uploads_path.as_deref())?;
    entry.url = Some(url);
    if entry.uploads_path.as_deref() != Some(uploads_path.as_str()) {
        // Remote fields are derived again from the new uploads path.
        entry.ssh_host = None;
        entry.remote_path = None;
        entry.uploads_path = Some(uploads_path);
    }
    if name != DEVELOPMENT {
        let default_alias = entry.cli_alias.clone().unwrap_or_else(|| format!("@{}", name));
        entry.cli_alias = Some(prompt.ask("WP-CLI alias", Some(&default_alias))?);
    }
    Ok(())
}

fn edit_options(raw: &mut RawJsonConfig, prompt: &mut dyn Prompt) -> Result<()> {
    let options = &mut raw.options;
    options.confirm_destructive_operations =
        prompt.confirm("Confirm destructive operations?", options.confirm_destructive_operations)?;
    options.set_upload_permissions =
        prompt.confirm("Set upload permissions automatically?", options.set_upload_permissions)?;
    if options.set_upload_permissions {
        options.upload_permissions = prompt.ask("Upload permissions", Some(&options.upload_permissions))?;
    }
    options.enable_slack_notifications =
        prompt.confirm("Enable Slack notifications?", options.enable_slack_notifications)?;
    if options.enable_slack_notifications {
        let webhook = prompt.ask("Slack webhook URL", options.slack_webhook_url.as_deref())?;
        options.slack_webhook_url = Some(webhook).filter(|w| !w.is_empty());
        options.slack_channel = prompt.ask("Slack channel", Some(&options.slack_channel))?;
    }
    Ok(())
}

pub fn run_config_flow(
    config_path: &Path,
    action: ConfigAction,
    environment: Option<&str>,
    prompt: &mut dyn Prompt,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = AppConfig::load_from_json(config_path)?;
            match environment {
                Some(name) => println!("Configuration for {} environment:\n", name),
                None => println!("Configuration from {}:\n", config_path.display()),
            }
            println!("{}", render(&config, environment)?);
        }
        ConfigAction::Edit => {
            println!("🔧 Interactive Configuration Editor\n");
            // Edit the file as written, without SYNC_* overrides baked in.
            let mut raw = read_raw(config_path)?;
            let section = match environment {
                Some(_) => "environments".to_string(),
                None => prompt.ask("What would you like to edit? (environments/options)", Some("environments"))?,
            };
            match section.as_str() {
                "environments" => edit_environment(&mut raw, prompt, environment)?,
                "options" => edit_options(&mut raw, prompt)?,
                other => bail!("Unknown section '{}'. Choose environments or options.", other),
            }
            let config = AppConfig::from_raw(raw, |_| None)?;
            config.save_to_json(config_path)?;
            println!("✅ Configuration updated");
        }
        ConfigAction::Reset => {
            if !config_path.exists() {
                println!("⚠️  No configuration file found to reset.");
                return Ok(());
            }
            if !prompt.confirm(
                "Are you sure you want to reset the configuration? This will remove all current settings.",
                false,
            )? {
                println!("Reset cancelled.");
                return Ok(());
            }
            fs::remove_file(config_path).with_context(|| format!("Failed to remove {}", config_path.display()))?;
            println!("✅ Configuration reset. Run `envsync init` to reconfigure.");
        }
    }
    Ok(())
}
