// envsync/src/detect/wp_cli.rs
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

use crate::errors::{Result, SyncError};

pub const WP_CLI_FILE: &str = "wp-cli.yml";

/// One `@alias` block of a wp-cli.yml.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WpCliAlias {
    #[serde(default)]
    pub ssh: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WpCliConfig {
    pub path: PathBuf,
    /// Keyed by alias name without the leading `@`.
    pub aliases: BTreeMap<String, WpCliAlias>,
}

impl WpCliConfig {
    pub fn alias(&self, name: &str) -> Option<&WpCliAlias> {
        self.aliases.get(name)
    }
}

fn alias_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?m)^([ \t]*)(@[A-Za-z0-9_-]+):").expect("valid alias key regex"))
}

fn alias_item_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?m)^([ \t]*-[ \t]+)(@[A-Za-z0-9_-]+)[ \t]*$").expect("valid alias item regex"))
}

/// `@` cannot start a plain YAML scalar, yet wp-cli files routinely write
/// `@staging:` unquoted. Quotes alias keys and alias-group list items.
pub fn quote_alias_keys(content: &str) -> String {
    let keys = alias_key_pattern().replace_all(content, "${1}\"${2}\":");
    alias_item_pattern().replace_all(&keys, "${1}\"${2}\"").into_owned()
}

/// Parses wp-cli.yml content and keeps only the `@alias` blocks. Alias
/// groups (lists of aliases) are ignored.
pub fn parse_wp_cli_yml(content: &str, source_name: &str) -> Result<BTreeMap<String, WpCliAlias>> {
    let parse_error = |detail: String| SyncError::ConfigParse {
        source_name: source_name.to_string(),
        detail,
    };

    let document: serde_yaml::Value =
        serde_yaml::from_str(&quote_alias_keys(content)).map_err(|e| parse_error(e.to_string()))?;
    let serde_yaml::Value::Mapping(mapping) = document else {
        return Ok(BTreeMap::new());
    };

    let mut aliases = BTreeMap::new();
    for (key, value) in mapping {
        let Some(name) = key.as_str().and_then(|k| k.strip_prefix('@')) else {
            continue;
        };
        if !value.is_mapping() {
            continue;
        }
        let alias: WpCliAlias = serde_yaml::from_value(value)
            .map_err(|e| parse_error(format!("alias @{}: {}", name, e)))?;
        aliases.insert(name.to_string(), alias);
    }
    Ok(aliases)
}

/// Reads `<root>/wp-cli.yml` when it exists.
pub fn detect_wp_cli_config(root: &Path) -> Result<Option<WpCliConfig>> {
    let path = root.join(WP_CLI_FILE);
    if !path.is_file() {
        debug!(path = %path.display(), "no wp-cli.yml");
        return Ok(None);
    }
    let content = fs::read_to_string(&path)?;
    let aliases = parse_wp_cli_yml(&content, &path.display().to_string())?;
    debug!(path = %path.display(), aliases = aliases.len(), "wp-cli.yml parsed");
    Ok(Some(WpCliConfig { path, aliases }))
}
