// envsync/src/detect/mod.rs
//! Reads what an existing project already says about its environments
//! (`wp-cli.yml` aliases and a legacy `sync.sh`) so `init` can propose a
//! configuration instead of asking for everything.
pub mod merge;
pub mod project;
pub mod sync_sh;
pub mod wp_cli;

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::ProjectOptions;
use crate::errors::SyncError;
pub use merge::{Answers, EnvironmentDraft, draft_development, draft_remote};
use project::{ProjectStructure, find_project_root};
use sync_sh::{SyncShConfig, detect_sync_sh_config};
use wp_cli::{WpCliConfig, detect_wp_cli_config};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedSources {
    pub root: PathBuf,
    pub structure: ProjectStructure,
    pub wp_cli: Option<WpCliConfig>,
    pub sync_sh: Option<SyncShConfig>,
}

impl DetectedSources {
    pub fn is_empty(&self) -> bool {
        self.wp_cli.is_none() && self.sync_sh.is_none()
    }
}

/// Locates the project root from `start` and reads both legacy sources.
///
/// A source that cannot be read or parsed is treated as absent; the errors
/// are handed back so the caller can show them as warnings.
pub fn detect_sources(start: &Path, options: &ProjectOptions) -> (DetectedSources, Vec<SyncError>) {
    let root = find_project_root(start, options);
    let structure = ProjectStructure::from_filesystem(&root);
    let mut warnings = Vec::new();

    let wp_cli = detect_wp_cli_config(&root).unwrap_or_else(|e| {
        warn!(error = %e, "ignoring wp-cli.yml");
        warnings.push(e);
        None
    });
    let sync_sh = detect_sync_sh_config(&root, options.sync_script_max_depth).unwrap_or_else(|e| {
        warn!(error = %e, "ignoring sync.sh");
        warnings.push(e);
        None
    });

    info!(
        root = %root.display(),
        %structure,
        wp_cli = wp_cli.is_some(),
        sync_sh = sync_sh.is_some(),
        "configuration sources detected"
    );
    (
        DetectedSources {
            root,
            structure,
            wp_cli,
            sync_sh,
        },
        warnings,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{EnvironmentRegistry, PRODUCTION, STAGING};
    use std::fs;

    #[test]
    fn test_broken_source_becomes_a_warning() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("wp-cli.yml"), "@production:\n  ssh: [unclosed\n")?;
        fs::write(
            dir.path().join("sync.sh"),
            "PRODSITE=\"https://example.com\"\nPRODDIR=\"web@example.com:/srv/www/shared/uploads/\"\n",
        )?;

        let (sources, warnings) = detect_sources(dir.path(), &ProjectOptions::default());
        assert_eq!(sources.root, dir.path());
        assert!(sources.wp_cli.is_none());
        assert!(sources.sync_sh.is_some());
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0], SyncError::ConfigParse { .. }));
        Ok(())
    }

    #[test]
    fn test_detected_project_commits_to_registry() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(
            dir.path().join("wp-cli.yml"),
            "path: web/wp\n@staging:\n  ssh: web@staging.example.com:/srv/www/staging/current\n",
        )?;
        fs::write(
            dir.path().join("sync.sh"),
            "DEVSITE=\"https://example.test\"\nPRODSITE=\"https://example.com\"\nPRODDIR=\"web@example.com:/srv/www/example.com/shared/uploads/\"\n",
        )?;
        let themes = dir.path().join("web/app/themes/sage");
        fs::create_dir_all(&themes)?;

        let (sources, warnings) = detect_sources(&themes, &ProjectOptions::default());
        assert!(warnings.is_empty());
        assert_eq!(sources.structure, ProjectStructure::Bedrock);

        let no_answers = Answers::default();
        let drafts = vec![
            draft_development(&sources, &no_answers, None),
            draft_remote(STAGING, &sources, &no_answers).expect("staging from wp-cli.yml"),
            draft_remote(PRODUCTION, &sources, &no_answers).expect("production from sync.sh"),
        ];
        let registry = EnvironmentRegistry::from_drafts(&drafts)?;

        let staging = registry.resolve(STAGING)?;
        assert_eq!(staging.url, "https://staging.example.com");
        assert_eq!(staging.uploads_path, "web@staging.example.com:/srv/www/staging/current/web/app/uploads/");
        let production = registry.resolve(PRODUCTION)?;
        assert_eq!(production.remote_path.as_deref(), Some("/srv/www/example.com/current"));
        assert_eq!(registry.resolve("development")?.url, "https://example.test");
        Ok(())
    }
}
