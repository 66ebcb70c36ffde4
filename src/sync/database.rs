// envsync/src/sync/database.rs
use chrono::Local;
use std::path::PathBuf;
use tracing::info;

use super::{cli_alias_for, wp_command};
use crate::config::SyncOptions;
use crate::environment::Environment;
use crate::errors::{Result, Stage, SyncError};
use crate::utils::command::{CommandOutput, CommandRunner, ToolCommand};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseSyncReport {
    /// Export of the target taken before it was reset.
    pub backup_file: PathBuf,
    pub completed_stages: Vec<Stage>,
}

/// Replaces the target database with the source database.
///
/// Stages run strictly in order: backup, reset, import, search-replace. The
/// first failing stage aborts the sequence. Nothing is retried or rolled back;
/// once the reset has run, the backup file is the only way back.
pub struct DatabaseSyncEngine<'a> {
    runner: &'a dyn CommandRunner,
    options: &'a SyncOptions,
}

impl<'a> DatabaseSyncEngine<'a> {
    pub fn new(runner: &'a dyn CommandRunner, options: &'a SyncOptions) -> Self {
        Self { runner, options }
    }

    fn wp_for(&self, environment: &Environment, use_local: bool) -> ToolCommand {
        wp_command(self.options, cli_alias_for(environment, use_local)).timeout(self.options.command_timeout())
    }

    fn backup_path(&self, target: &Environment) -> PathBuf {
        let timestamp = Local::now().format("%Y-%m-%d_%H_%M_%S").to_string();
        self.options
            .backup_dir
            .join(format!("{}-{}.sql", target.name, timestamp))
    }

    pub async fn sync(&self, from: &Environment, to: &Environment, use_local: bool) -> Result<DatabaseSyncReport> {
        let charset = format!("--default-character-set={}", self.options.database_charset);
        let mut report = DatabaseSyncReport::default();

        // 1. Backup target
        let backup_file = self.backup_path(to);
        info!(environment = %to.name, file = %backup_file.display(), "exporting backup of target database");
        let export = self
            .wp_for(to, use_local)
            .args(["db", "export"])
            .arg(&charset)
            .arg("-");
        let output = self.runner.run_to_file(&export, &backup_file).await?;
        check_stage(Stage::Backup, &output)?;
        report.backup_file = backup_file;
        report.completed_stages.push(Stage::Backup);

        // 2. Reset target
        info!(environment = %to.name, "resetting target database");
        let reset = self.wp_for(to, use_local).args(["db", "reset", "--yes"]);
        let output = self.runner.run(&reset).await?;
        check_stage(Stage::Reset, &output)?;
        report.completed_stages.push(Stage::Reset);

        // 3. Stream source into target
        info!(from = %from.name, to = %to.name, "importing source database into target");
        let export = self
            .wp_for(from, use_local)
            .args(["db", "export"])
            .arg(&charset)
            .arg("-");
        let import = self.wp_for(to, use_local).args(["db", "import", "-"]);
        let piped = self.runner.pipe(&export, &import).await?;
        check_stage(Stage::Import, &piped.producer)
            .and_then(|_| check_stage(Stage::Import, &piped.consumer))
            .map_err(|e| with_recovery_hint(e, &report))?;
        report.completed_stages.push(Stage::Import);

        // 4. Rewrite URLs
        info!(search = %from.url, replace = %to.url, "rewriting URLs in target database");
        let search_replace = self
            .wp_for(to, use_local)
            .arg("search-replace")
            .arg(&from.url)
            .arg(&to.url)
            .arg("--all-tables-with-prefix");
        let output = self.runner.run(&search_replace).await?;
        check_stage(Stage::SearchReplace, &output).map_err(|e| with_recovery_hint(e, &report))?;
        report.completed_stages.push(Stage::SearchReplace);

        Ok(report)
    }
}

// stdout of a stage is data (a dump, a replacement table) and is not inspected.
fn check_stage(stage: Stage, output: &CommandOutput) -> Result<()> {
    if output.success() && !output.stderr_mentions_error() {
        Ok(())
    } else {
        Err(SyncError::stage(stage, output.failure_detail()))
    }
}

fn with_recovery_hint(error: SyncError, report: &DatabaseSyncReport) -> SyncError {
    match error {
        SyncError::StageFailure { stage, detail } => SyncError::StageFailure {
            stage,
            detail: format!(
                "{} (target database was already reset; restore it manually from {})",
                detail,
                report.backup_file.display()
            ),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::{ScriptedRunner, failed, ok};

    fn environment(name: &str, url: &str, alias: Option<&str>) -> Environment {
        Environment {
            name: name.into(),
            url: url.into(),
            uploads_path: "web/app/uploads/".into(),
            cli_alias: alias.map(Into::into),
            ssh_host: None,
            ssh_port: 22,
            remote_path: None,
        }
    }

    fn options_in(dir: &std::path::Path) -> SyncOptions {
        SyncOptions {
            backup_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    fn stage_of(call: &str) -> &'static str {
        if call.contains("db reset") {
            "reset"
        } else if call.contains(" | ") {
            "import"
        } else if call.contains("search-replace") {
            "search-replace"
        } else if call.contains("db export") {
            "backup"
        } else {
            "other"
        }
    }

    #[tokio::test]
    async fn test_stages_run_in_order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let options = options_in(dir.path());
        let runner = ScriptedRunner::with(|_| ok("-- dump"));
        let engine = DatabaseSyncEngine::new(&runner, &options);

        let from = environment("production", "https://example.com", Some("@production"));
        let to = environment("development", "https://example.test", None);
        let report = engine.sync(&from, &to, false).await?;

        let calls = runner.calls();
        let stages: Vec<&str> = calls.iter().map(|c| stage_of(c)).collect();
        assert_eq!(stages, vec!["backup", "reset", "import", "search-replace"]);
        assert_eq!(
            report.completed_stages,
            vec![Stage::Backup, Stage::Reset, Stage::Import, Stage::SearchReplace]
        );

        assert!(calls[0].starts_with("wp db export --default-character-set=utf8mb4 - > "));
        assert_eq!(
            calls[2],
            "wp @production db export --default-character-set=utf8mb4 - | wp db import -"
        );
        assert_eq!(
            calls[3],
            "wp search-replace https://example.com https://example.test --all-tables-with-prefix"
        );

        let backup = report.backup_file;
        assert!(backup.starts_with(dir.path()));
        assert!(backup.file_name().unwrap().to_string_lossy().starts_with("development-"));
        assert_eq!(std::fs::read_to_string(backup)?, "-- dump");
        Ok(())
    }

    #[tokio::test]
    async fn test_reset_failure_stops_the_sequence() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let options = options_in(dir.path());
        let runner = ScriptedRunner::with(|cmd| {
            if cmd.arguments().iter().any(|a| a == "reset") {
                failed("Error: Access denied for user")
            } else {
                ok("")
            }
        });
        let engine = DatabaseSyncEngine::new(&runner, &options);
        let from = environment("development", "https://example.test", None);
        let to = environment("staging", "https://staging.example.com", Some("@staging"));

        match engine.sync(&from, &to, false).await {
            Err(SyncError::StageFailure { stage, detail }) => {
                assert_eq!(stage, Stage::Reset);
                assert!(detail.contains("Access denied"));
            }
            other => panic!("expected reset failure, got {:?}", other),
        }

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert!(!calls.iter().any(|c| c.contains("db import") || c.contains("search-replace")));
        Ok(())
    }

    #[tokio::test]
    async fn test_import_failure_points_at_backup() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let options = options_in(dir.path());
        let runner = ScriptedRunner::with(|cmd| {
            if cmd.arguments().iter().any(|a| a == "import") {
                failed("ERROR 2006: MySQL server has gone away")
            } else {
                ok("")
            }
        });
        let engine = DatabaseSyncEngine::new(&runner, &options);
        let from = environment("development", "https://example.test", None);
        let to = environment("staging", "https://staging.example.com", Some("@staging"));

        let err = engine.sync(&from, &to, false).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("import"));
        assert!(message.contains("gone away"));
        assert!(message.contains("staging-"));
        assert!(!runner.calls().iter().any(|c| c.contains("search-replace")));
        Ok(())
    }

    #[tokio::test]
    async fn test_use_local_drops_development_alias() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let options = options_in(dir.path());
        let runner = ScriptedRunner::with(|_| ok(""));
        let engine = DatabaseSyncEngine::new(&runner, &options);
        let from = environment("development", "https://example.test", Some("@development"));
        let to = environment("production", "https://example.com", Some("@production"));

        engine.sync(&from, &to, true).await?;
        let calls = runner.calls();
        assert_eq!(
            calls[2],
            "wp db export --default-character-set=utf8mb4 - | wp @production db import -"
        );

        let runner = ScriptedRunner::with(|_| ok(""));
        let engine = DatabaseSyncEngine::new(&runner, &options);
        engine.sync(&from, &to, false).await?;
        assert!(runner.calls()[2].starts_with("wp @development db export"));
        Ok(())
    }

    #[tokio::test]
    async fn test_urls_with_spaces_stay_single_arguments() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let options = options_in(dir.path());
        let runner = ScriptedRunner::with(|cmd| {
            if cmd.arguments().iter().any(|a| a == "search-replace") {
                assert_eq!(cmd.arguments()[1], "https://example.com/a b");
            }
            ok("")
        });
        let engine = DatabaseSyncEngine::new(&runner, &options);
        let from = environment("production", "https://example.com/a b", Some("@production"));
        let to = environment("development", "https://example.test", None);

        engine.sync(&from, &to, false).await?;
        assert_eq!(runner.calls().len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_backup_failure_leaves_target_untouched() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let options = options_in(dir.path());
        let runner = ScriptedRunner::with(|cmd| {
            if cmd.arguments().iter().any(|a| a == "export") {
                failed("Error: Access denied for user")
            } else {
                ok("")
            }
        });
        let engine = DatabaseSyncEngine::new(&runner, &options);
        let from = environment("production", "https://example.com", Some("@production"));
        let to = environment("staging", "https://staging.example.com", Some("@staging"));

        match engine.sync(&from, &to, false).await {
            Err(SyncError::StageFailure { stage, .. }) => assert_eq!(stage, Stage::Backup),
            other => panic!("expected backup failure, got {:?}", other),
        }
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].starts_with("wp @staging db export"));
        Ok(())
    }
}
