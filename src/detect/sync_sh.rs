// envsync/src/detect/sync_sh.rs
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::environment::{DEVELOPMENT, PRODUCTION, STAGING};
use crate::errors::{Result, SyncError};

pub const SYNC_SCRIPT_NAME: &str = "sync.sh";

const SKIPPED_DIRS: [&str; 2] = ["vendor", "node_modules"];

/// Values a legacy sync script holds for one environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncShEntry {
    pub url: Option<String>,
    pub uploads_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncShConfig {
    pub path: PathBuf,
    pub environments: BTreeMap<String, SyncShEntry>,
}

impl SyncShConfig {
    pub fn entry(&self, name: &str) -> Option<&SyncShEntry> {
        self.environments.get(name)
    }
}

fn assignment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*(?:export[ \t]+)?(DEV|STAGE|STAG|PROD)(SITE|DIR)=(.*)$")
            .expect("valid assignment regex")
    })
}

// Accepts `"quoted"`, `'quoted'` and bare words; a bare word stops at
// whitespace or a comment.
fn shell_value(raw: &str) -> String {
    let raw = raw.trim();
    for quote in ['"', '\''] {
        if let Some(rest) = raw.strip_prefix(quote) {
            return rest.split(quote).next().unwrap_or_default().to_string();
        }
    }
    raw.split(|c: char| c.is_whitespace() || c == '#')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Reads the `DEVSITE`/`DEVDIR`, `STAGSITE`/`STAGDIR` and `PRODSITE`/`PRODDIR`
/// assignments. `STAGESITE`/`STAGEDIR` are accepted as staging too.
pub fn parse_sync_sh(content: &str) -> BTreeMap<String, SyncShEntry> {
    let mut environments: BTreeMap<String, SyncShEntry> = BTreeMap::new();
    for captures in assignment_pattern().captures_iter(content) {
        let name = match &captures[1] {
            "DEV" => DEVELOPMENT,
            "PROD" => PRODUCTION,
            _ => STAGING,
        };
        let value = shell_value(&captures[3]);
        if value.is_empty() {
            continue;
        }
        let entry = environments.entry(name.to_string()).or_default();
        match &captures[2] {
            "SITE" => entry.url = Some(value),
            _ => entry.uploads_path = Some(value),
        }
    }
    environments
}

fn is_skipped(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.iter().any(|skipped| name == *skipped)
}

/// Shallowest `sync.sh` under `root`, skipping dependency and hidden
/// directories.
pub fn find_sync_script(root: &Path, max_depth: usize) -> Option<PathBuf> {
    WalkDir::new(root)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped(e))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file() && e.file_name() == SYNC_SCRIPT_NAME)
        .min_by_key(|e| e.depth())
        .map(DirEntry::into_path)
}

/// Finds and parses a legacy sync script. A script without any recognised
/// assignment is reported as a parse error.
pub fn detect_sync_sh_config(root: &Path, max_depth: usize) -> Result<Option<SyncShConfig>> {
    let Some(path) = find_sync_script(root, max_depth) else {
        debug!(root = %root.display(), "no sync.sh found");
        return Ok(None);
    };
    let content = fs::read_to_string(&path)?;
    let environments = parse_sync_sh(&content);
    if environments.is_empty() {
        return Err(SyncError::ConfigParse {
            source_name: path.display().to_string(),
            detail: "no DEVSITE/STAGSITE/PRODSITE or *DIR assignments found".to_string(),
        });
    }
    debug!(path = %path.display(), environments = environments.len(), "sync.sh parsed");
    Ok(Some(SyncShConfig { path, environments }))
}
