// envsync/src/config/mod.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::environment::{DEVELOPMENT, EnvironmentRegistry, PRODUCTION, STAGING};

pub const DEFAULT_CONFIG_FILE: &str = "sync.json";

// Structs for deserializing sync.json
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEnvironment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploads_path: Option<String>,
    #[serde(default, alias = "wp_cli_alias")]
    pub cli_alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    /// Directory on the invoking host that receives the pre-sync export.
    pub backup_dir: PathBuf,
    pub confirm_destructive_operations: bool,
    pub set_upload_permissions: bool,
    pub upload_permissions: String,
    pub database_charset: String,
    pub rsync_options: Vec<String>,
    pub ssh_options: Vec<String>,
    pub probe_timeout_secs: u64,
    /// Applied to every command other than the connectivity probe. Unset means unbounded.
    pub command_timeout_secs: Option<u64>,
    pub wp_cli_binary: String,
    pub rsync_binary: String,
    pub ssh_binary: String,
    pub enable_slack_notifications: bool,
    pub slack_webhook_url: Option<String>,
    pub slack_channel: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            backup_dir: PathBuf::from("sync-backups"),
            confirm_destructive_operations: true,
            set_upload_permissions: true,
            upload_permissions: "755".to_string(),
            database_charset: "utf8mb4".to_string(),
            rsync_options: vec!["-az".to_string(), "--progress".to_string()],
            ssh_options: vec!["-o".to_string(), "StrictHostKeyChecking=no".to_string()],
            probe_timeout_secs: 120,
            command_timeout_secs: None,
            wp_cli_binary: "wp".to_string(),
            rsync_binary: "rsync".to_string(),
            ssh_binary: "ssh".to_string(),
            enable_slack_notifications: false,
            slack_webhook_url: None,
            slack_channel: "#general".to_string(),
        }
    }
}

impl SyncOptions {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }
}

/// Controls how the project root and legacy config files are located.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectOptions {
    pub root_markers: Vec<String>,
    pub max_search_depth: usize,
    pub sync_script_max_depth: usize,
}

impl Default for ProjectOptions {
    fn default() -> Self {
        Self {
            root_markers: vec!["wp-cli.yml".to_string(), "composer.json".to_string()],
            max_search_depth: 5,
            sync_script_max_depth: 4,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawJsonConfig {
    #[serde(default)]
    pub environments: BTreeMap<String, RawEnvironment>,
    #[serde(default)]
    pub options: SyncOptions,
    #[serde(default)]
    pub project: ProjectOptions,
}

// Application's internal configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub environments: EnvironmentRegistry,
    pub options: SyncOptions,
    pub project: ProjectOptions,
}

impl AppConfig {
    /// Reads `config_path` and applies `SYNC_*` overrides from the process environment.
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        let raw_json_config: RawJsonConfig = serde_json::from_str(&config_content).with_context(|| {
            format!("Failed to parse JSON from config file at {}", config_path.display())
        })?;

        Self::from_raw(raw_json_config, |key| std::env::var(key).ok())
    }

    pub fn from_raw<F>(mut raw: RawJsonConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        apply_env_overrides(&mut raw, lookup);
        let environments = EnvironmentRegistry::from_raw(&raw.environments)
            .context("Invalid environment configuration")?;

        Ok(AppConfig {
            environments,
            options: raw.options,
            project: raw.project,
        })
    }

    pub fn to_raw(&self) -> RawJsonConfig {
        RawJsonConfig {
            environments: self.environments.to_raw(),
            options: self.options.clone(),
            project: self.project.clone(),
        }
    }

    /// Writes the configuration through a temporary file so a failed write
    /// never leaves a truncated `sync.json` behind.
    pub fn save_to_json(&self, config_path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.to_raw())
            .context("Failed to serialize configuration")?;

        if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        let staging_path = config_path.with_extension("json.tmp");
        fs::write(&staging_path, content + "\n")
            .with_context(|| format!("Failed to write {}", staging_path.display()))?;
        fs::rename(&staging_path, config_path)
            .with_context(|| format!("Failed to move configuration into {}", config_path.display()))?;
        Ok(())
    }
}

fn env_prefix(name: &str) -> String {
    format!("SYNC_{}", name.to_uppercase().replace('-', "_"))
}

/// Applies `SYNC_<ENV>_<FIELD>` and `SYNC_SLACK_*` overrides.
///
/// A standard environment missing from the file is created only when both
/// `URL` and `UPLOADS_PATH` are given; partial overrides for it are ignored.
/// Other environments are only overridden when already configured.
pub fn apply_env_overrides<F>(raw: &mut RawJsonConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let mut names: Vec<String> = raw.environments.keys().cloned().collect();
    for standard in [DEVELOPMENT, STAGING, PRODUCTION] {
        if !names.iter().any(|n| n == standard) {
            names.push(standard.to_string());
        }
    }

    for name in names {
        let prefix = env_prefix(&name);
        let value = |field: &str| lookup(&format!("{}_{}", prefix, field)).filter(|v| !v.is_empty());
        let overrides = [
            ("URL", value("URL")),
            ("UPLOADS_PATH", value("UPLOADS_PATH")),
            ("SSH_HOST", value("SSH_HOST")),
            ("SSH_PORT", value("SSH_PORT")),
            ("REMOTE_PATH", value("REMOTE_PATH")),
        ];
        if overrides.iter().all(|(_, v)| v.is_none()) {
            continue;
        }
        if !raw.environments.contains_key(&name) && (overrides[0].1.is_none() || overrides[1].1.is_none()) {
            warn!(
                environment = %name,
                "ignoring {}_* overrides: {}_URL and {}_UPLOADS_PATH are both required to add an environment",
                prefix, prefix, prefix
            );
            continue;
        }

        let entry = raw.environments.entry(name.clone()).or_insert_with(|| RawEnvironment {
            cli_alias: (name != DEVELOPMENT).then(|| format!("@{}", name)),
            ..Default::default()
        });
        for (field, override_value) in overrides {
            let Some(v) = override_value else { continue };
            match field {
                "URL" => entry.url = Some(v),
                "UPLOADS_PATH" => entry.uploads_path = Some(v),
                "SSH_HOST" => entry.ssh_host = Some(v),
                "SSH_PORT" => entry.ssh_port = Some(v),
                _ => entry.remote_path = Some(v),
            }
        }
    }

    if let Some(webhook) = lookup("SYNC_SLACK_WEBHOOK").filter(|v| !v.is_empty()) {
        raw.options.slack_webhook_url = Some(webhook);
    }
    if let Some(channel) = lookup("SYNC_SLACK_CHANNEL").filter(|v| !v.is_empty()) {
        raw.options.slack_channel = channel;
    }
    if let Some(flag) = lookup("SYNC_SLACK_NOTIFICATIONS") {
        raw.options.enable_slack_notifications = matches!(flag.trim().to_lowercase().as_str(), "1" | "true" | "yes");
    }
}
