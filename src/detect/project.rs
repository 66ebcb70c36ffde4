// envsync/src/detect/project.rs
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::ProjectOptions;

/// WordPress project layouts that move core and uploads out of the default
/// locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectStructure {
    Bedrock,
    Radicle,
}

impl ProjectStructure {
    /// Guesses the layout from a path such as a wp-cli `path:` value.
    pub fn from_path_hint(hint: &str) -> Option<Self> {
        if hint.contains("public/") || hint.ends_with("public") {
            Some(ProjectStructure::Radicle)
        } else if hint.contains("web/") || hint.ends_with("web") {
            Some(ProjectStructure::Bedrock)
        } else {
            None
        }
    }

    /// Looks at the project tree. Anything that is not recognisably Radicle
    /// is treated as Bedrock.
    pub fn from_filesystem(root: &Path) -> Self {
        if root.join("public/wp").is_dir() || root.join("public/content").is_dir() {
            ProjectStructure::Radicle
        } else {
            ProjectStructure::Bedrock
        }
    }

    pub fn detect(root: &Path, hint: Option<&str>) -> Self {
        hint.and_then(Self::from_path_hint)
            .unwrap_or_else(|| Self::from_filesystem(root))
    }

    pub fn core_path(self) -> &'static str {
        match self {
            ProjectStructure::Bedrock => "web/wp",
            ProjectStructure::Radicle => "public/wp",
        }
    }

    pub fn uploads_path(self) -> &'static str {
        match self {
            ProjectStructure::Bedrock => "web/app/uploads/",
            ProjectStructure::Radicle => "public/content/uploads/",
        }
    }
}

impl fmt::Display for ProjectStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectStructure::Bedrock => write!(f, "Bedrock"),
            ProjectStructure::Radicle => write!(f, "Radicle"),
        }
    }
}

/// Walks up from `start` looking for any of the configured root markers.
/// Gives up after `max_search_depth` parents and falls back to `start`.
pub fn find_project_root(start: &Path, options: &ProjectOptions) -> PathBuf {
    let mut current = Some(start);
    for _ in 0..=options.max_search_depth {
        let Some(dir) = current else { break };
        if let Some(marker) = options.root_markers.iter().find(|m| dir.join(m.as_str()).exists()) {
            debug!(root = %dir.display(), %marker, "project root found");
            return dir.to_path_buf();
        }
        current = dir.parent();
    }
    debug!(start = %start.display(), "no project root marker found, using start directory");
    start.to_path_buf()
}
