pub mod command;
#[cfg(test)]
pub(crate) mod testing;

use std::path::PathBuf;
use which::which;

use crate::errors::{Result, SyncError};

/// Finds an executable in the system PATH.
pub fn find_executable(program: &str) -> Result<PathBuf> {
    which(program).map_err(|_| SyncError::ToolMissing {
        program: program.to_string(),
    })
}
