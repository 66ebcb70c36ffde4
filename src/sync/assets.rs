// envsync/src/sync/assets.rs
use std::path::Path;
use tracing::{debug, info, warn};

use super::SyncDirection;
use crate::config::SyncOptions;
use crate::environment::Environment;
use crate::errors::{Result, Stage, SyncError};
use crate::utils::command::{CommandRunner, ToolCommand, shell_quote};

// Programs invoked on the relay host, resolved by its own PATH.
const REMOTE_RSYNC: &str = "rsync";
const REMOTE_SSH: &str = "ssh";

/// Copies the uploads directory between two environments with rsync.
pub struct AssetSyncEngine<'a> {
    runner: &'a dyn CommandRunner,
    options: &'a SyncOptions,
}

impl<'a> AssetSyncEngine<'a> {
    pub fn new(runner: &'a dyn CommandRunner, options: &'a SyncOptions) -> Self {
        Self { runner, options }
    }

    pub async fn sync(
        &self,
        from: &Environment,
        to: &Environment,
        direction: SyncDirection,
        normalize_permissions: bool,
    ) -> Result<()> {
        if normalize_permissions && self.options.set_upload_permissions {
            self.normalize_permissions(&[from, to]).await;
        }

        let command = match direction {
            SyncDirection::Horizontal => self.horizontal_command(from, to)?,
            SyncDirection::Up | SyncDirection::Down => self.direct_command(from, to),
        };
        info!(%direction, from = %from.name, to = %to.name, "transferring uploads");

        let output = self.runner.run(&command).await?;
        if output.success() {
            Ok(())
        } else {
            Err(SyncError::stage(Stage::Assets, output.failure_detail()))
        }
    }

    /// Runs `chmod -R` on every local uploads directory that exists. Failures
    /// are logged and do not stop the transfer.
    pub async fn normalize_permissions(&self, environments: &[&Environment]) {
        for environment in environments {
            if environment.is_remote() {
                continue;
            }
            let path = Path::new(&environment.uploads_path);
            if !path.exists() {
                debug!(path = %path.display(), "uploads directory missing, skipping chmod");
                continue;
            }

            let chmod = ToolCommand::new("chmod")
                .arg("-R")
                .arg(&self.options.upload_permissions)
                .arg(&environment.uploads_path)
                .timeout(self.options.command_timeout());
            match self.runner.run(&chmod).await {
                Ok(output) if output.success() => {
                    debug!(path = %path.display(), mode = %self.options.upload_permissions, "uploads permissions set");
                }
                Ok(output) => warn!(
                    path = %path.display(),
                    detail = %output.failure_detail(),
                    "could not set uploads permissions"
                ),
                Err(e) => warn!(path = %path.display(), error = %e, "could not set uploads permissions"),
            }
        }
    }

    /// Relays the transfer through the source host: the local machine opens
    /// an agent-forwarding session on `from` and runs rsync there, pushing
    /// straight to `to`.
    pub fn horizontal_command(&self, from: &Environment, to: &Environment) -> Result<ToolCommand> {
        let source = from.uploads_address();
        let destination = to.uploads_address();
        let (Some(source_host), Some(destination_host)) = (source.host, destination.host) else {
            return Err(SyncError::Config(format!(
                "horizontal sync from {} to {} needs remote uploads paths on both sides",
                from.name, to.name
            )));
        };

        let mut transport = vec![REMOTE_SSH.to_string()];
        if to.has_custom_port() {
            transport.push("-p".to_string());
            transport.push(to.ssh_port.to_string());
        }
        transport.extend(self.options.ssh_options.iter().cloned());
        let transport = transport.iter().map(|w| shell_quote(w)).collect::<Vec<_>>().join(" ");

        let relayed = ToolCommand::new(REMOTE_RSYNC)
            .args(self.options.rsync_options.iter().cloned())
            .arg("-e")
            .arg(transport)
            .arg(source.path)
            .arg(format!("{}:{}", destination_host, destination.path));

        let mut command = ToolCommand::new(&self.options.ssh_binary).args(["-o", "ForwardAgent=yes"]);
        if from.has_custom_port() {
            command = command.arg("-p").arg(from.ssh_port.to_string());
        }
        Ok(command
            .arg(source_host)
            .arg(relayed.to_shell_string())
            .timeout(self.options.command_timeout()))
    }

    /// One rsync between the local machine and a remote, or two local paths.
    pub fn direct_command(&self, from: &Environment, to: &Environment) -> ToolCommand {
        let mut command = ToolCommand::new(&self.options.rsync_binary).args(self.options.rsync_options.iter().cloned());

        let custom_port = [from, to]
            .into_iter()
            .find(|env| env.is_remote() && env.has_custom_port())
            .map(|env| env.ssh_port);
        if let Some(port) = custom_port {
            command = command
                .arg("-e")
                .arg(format!("{} -p {}", shell_quote(&self.options.ssh_binary), port));
        }

        command
            .arg(from.uploads_address().rsync_target())
            .arg(to.uploads_address().rsync_target())
            .timeout(self.options.command_timeout())
    }
}
