use std::fmt;

use thiserror::Error;

/// One step of a sync sequence that can fail on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Backup,
    Reset,
    Import,
    SearchReplace,
    Assets,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Backup => "backup",
            Stage::Reset => "reset",
            Stage::Import => "import",
            Stage::SearchReplace => "search-replace",
            Stage::Assets => "assets",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Environment '{name}' not found in configuration. Available environments: {}", available.join(", "))]
    NotFound { name: String, available: Vec<String> },

    #[error("Invalid sync direction: {from} → {to}. Valid combinations: production↔development, staging↔development, production↔staging")]
    InvalidDirection { from: String, to: String },

    #[error("Unable to connect to {environment} environment")]
    ConnectivityFailure { environment: String },

    #[error("Stage '{stage}' failed: {detail}")]
    StageFailure { stage: Stage, detail: String },

    #[error("Could not parse {source_name}: {detail}")]
    ConfigParse { source_name: String, detail: String },

    #[error("Command timed out after {seconds}s: {command}")]
    Timeout { command: String, seconds: u64 },

    #[error("{program} executable not found in PATH")]
    ToolMissing { program: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    pub fn stage(stage: Stage, detail: impl Into<String>) -> Self {
        SyncError::StageFailure { stage, detail: detail.into() }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
