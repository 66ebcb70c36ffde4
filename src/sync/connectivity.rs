// envsync/src/sync/connectivity.rs
use tracing::{debug, warn};

use super::wp_command;
use crate::config::SyncOptions;
use crate::environment::Environment;
use crate::errors::{Result, SyncError};
use crate::utils::command::{CommandOutput, CommandRunner};

/// Exit status alone is not trusted: wp-cli exits 0 while printing
/// "Error establishing a database connection".
pub fn probe_succeeded(output: &CommandOutput) -> bool {
    output.success()
        && !output.stdout.trim().is_empty()
        && !output.stdout.to_lowercase().contains("error")
        && !output.stderr_mentions_error()
}

pub struct ConnectivityValidator<'a> {
    runner: &'a dyn CommandRunner,
    options: &'a SyncOptions,
}

impl<'a> ConnectivityValidator<'a> {
    pub fn new(runner: &'a dyn CommandRunner, options: &'a SyncOptions) -> Self {
        Self { runner, options }
    }

    /// Asks the environment for its home URL.
    ///
    /// An unreachable environment, including one that does not answer within
    /// the probe timeout, yields `Ok(false)`. Errors that mean the probe could
    /// not be attempted at all (missing `wp` binary) are returned.
    pub async fn probe(&self, environment: &Environment) -> Result<bool> {
        let command = wp_command(self.options, environment.cli_alias.as_deref())
            .args(["option", "get", "home"])
            .timeout(Some(self.options.probe_timeout()));

        match self.runner.run(&command).await {
            Ok(output) => {
                let reachable = probe_succeeded(&output);
                debug!(
                    environment = %environment.name,
                    status = ?output.status_code,
                    reachable,
                    "connectivity probe finished"
                );
                Ok(reachable)
            }
            Err(SyncError::Timeout { seconds, .. }) => {
                warn!(environment = %environment.name, seconds, "connectivity probe timed out");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
