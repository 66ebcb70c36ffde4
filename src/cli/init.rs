// envsync/src/cli/init.rs
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::warn;

use super::Prompt;
use crate::config::{AppConfig, RawJsonConfig};
use crate::detect::{Answers, DetectedSources, EnvironmentDraft, detect_sources, draft_development, draft_remote};
use crate::environment::remote::DEFAULT_SSH_PORT;
use crate::environment::{EnvironmentRegistry, PRODUCTION, STAGING};

const SKIP_REPLY: &str = "-";

#[derive(Debug, Clone, Copy, Default)]
pub struct InitOptions {
    /// Overwrite an existing configuration without asking.
    pub force: bool,
    /// Accept wp-cli.yml details for remotes and only ask for their URL.
    pub auto: bool,
}

// Options and project settings survive a re-init; environments do not.
fn previous_settings(config_path: &Path) -> RawJsonConfig {
    let parsed = fs::read_to_string(config_path)
        .map_err(anyhow::Error::from)
        .and_then(|content| serde_json::from_str::<RawJsonConfig>(&content).map_err(anyhow::Error::from));
    match parsed {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = %config_path.display(), error = %e, "previous configuration unreadable, starting from defaults");
            RawJsonConfig::default()
        }
    }
}

fn ask_development(
    sources: &DetectedSources,
    prompt: &mut dyn Prompt,
    wp_home: Option<String>,
) -> Result<EnvironmentDraft> {
    println!("Development Environment:");
    let suggested = draft_development(sources, &Answers::default(), wp_home.clone());
    let answers = Answers {
        url: Some(prompt.ask("Site URL", Some(&suggested.url))?),
        uploads_path: Some(prompt.ask("Uploads directory path", Some(&suggested.uploads_path))?),
        ssh_port: None,
    };
    Ok(draft_development(sources, &answers, wp_home))
}

fn ask_remote(
    name: &str,
    sources: &DetectedSources,
    prompt: &mut dyn Prompt,
    auto: bool,
) -> Result<Option<EnvironmentDraft>> {
    println!("\n{}{} Environment:", name[..1].to_uppercase(), &name[1..]);
    let suggested = draft_remote(name, sources, &Answers::default());
    let from_wp_cli = sources.wp_cli.as_ref().and_then(|c| c.alias(name)).is_some();

    if let Some(detected) = suggested.as_ref().filter(|_| auto && from_wp_cli) {
        let answers = Answers {
            url: Some(prompt.ask(&format!("URL for {}", name), Some(&detected.url))?),
            ..Default::default()
        };
        return Ok(draft_remote(name, sources, &answers));
    }

    let url = prompt.ask(
        &format!("Site URL ('{}' or empty to skip {})", SKIP_REPLY, name),
        suggested.as_ref().map(|s| s.url.as_str()),
    )?;
    if url.is_empty() || url == SKIP_REPLY {
        println!("Skipping {}.", name);
        return Ok(None);
    }
    let uploads_path = prompt.ask(
        "Uploads path with SSH (e.g., web@example.com:/srv/www/example.com/shared/uploads/)",
        suggested.as_ref().map(|s| s.uploads_path.as_str()),
    )?;
    let default_port = suggested
        .as_ref()
        .map_or(DEFAULT_SSH_PORT, |s| s.ssh_port)
        .to_string();
    let port = prompt.ask("SSH port", Some(&default_port))?;
    let ssh_port = port
        .parse::<u16>()
        .with_context(|| format!("Invalid SSH port '{}' for {}", port, name))?;

    let answers = Answers {
        url: Some(url),
        uploads_path: Some(uploads_path).filter(|p| !p.is_empty()),
        ssh_port: Some(ssh_port),
    };
    let draft = draft_remote(name, sources, &answers);
    if draft.is_none() {
        println!("⚠️  No uploads path for {}, skipping it.", name);
    }
    Ok(draft)
}

/// Detects existing project configuration, asks for whatever is missing and
/// writes the result to `config_path`.
///
/// Returns `None` when the operator keeps an existing configuration.
pub fn run_init_flow(
    config_path: &Path,
    start: &Path,
    options: InitOptions,
    prompt: &mut dyn Prompt,
    wp_home: Option<String>,
) -> Result<Option<AppConfig>> {
    println!("🚀 Initializing envsync...\n");

    let previous = if config_path.exists() {
        if !options.force && !prompt.confirm("Sync configuration already exists. Do you want to reconfigure?", false)? {
            println!("Configuration unchanged.");
            return Ok(None);
        }
        previous_settings(config_path)
    } else {
        RawJsonConfig::default()
    };

    println!("🔍 Detecting existing configuration...\n");
    let (sources, warnings) = detect_sources(start, &previous.project);
    for warning in &warnings {
        println!("⚠️  {}", warning);
    }
    if !sources.is_empty() {
        println!("Found:");
        if let Some(wp_cli) = &sources.wp_cli {
            println!("  ✓ {} (SSH connection details)", wp_cli.path.display());
        }
        if let Some(sync_sh) = &sources.sync_sh {
            println!("  ✓ {} (URLs and uploads paths)", sync_sh.path.display());
        }
        println!();
    }
    println!("📝 Environment Configuration ({} project)\n", sources.structure);

    let mut drafts = vec![ask_development(&sources, prompt, wp_home)?];
    for name in [STAGING, PRODUCTION] {
        if let Some(draft) = ask_remote(name, &sources, prompt, options.auto)? {
            drafts.push(draft);
        }
    }
    let environments = EnvironmentRegistry::from_drafts(&drafts).context("Collected environment settings are invalid")?;
    let config = AppConfig {
        environments,
        options: previous.options,
        project: previous.project,
    };
    config.save_to_json(config_path)?;
    println!("\n✅ Configuration written to {}", config_path.display());

    if let Some(sync_sh) = &sources.sync_sh {
        let shown = sync_sh.path.strip_prefix(&sources.root).unwrap_or(sync_sh.path.as_path());
        println!("\n📦 Migration from sync.sh complete!");
        let question = format!(
            "Remove {}? (it will be backed up to {}.backup)",
            shown.display(),
            shown.display()
        );
        if prompt.confirm(&question, true)? {
            let backup = sync_sh.path.with_extension("sh.backup");
            fs::rename(&sync_sh.path, &backup)
                .with_context(|| format!("Failed to move {} to {}", sync_sh.path.display(), backup.display()))?;
            println!("✅ Moved {} to {}.backup", shown.display(), shown.display());
        }
    }

    Ok(Some(config))
}
