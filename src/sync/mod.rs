// envsync/src/sync/mod.rs
pub mod assets;
pub mod connectivity;
pub mod database;

use std::fmt;
use tracing::{info, warn};

use crate::config::{AppConfig, SyncOptions};
use crate::environment::{DEVELOPMENT, Environment, EnvironmentRegistry, PRODUCTION, STAGING};
use crate::errors::{Result, SyncError};
use crate::notify::{Notifier, NotifyOutcome};
use crate::utils::command::{CommandRunner, ToolCommand};
use assets::AssetSyncEngine;
use connectivity::ConnectivityValidator;
use database::{DatabaseSyncEngine, DatabaseSyncReport};

/// Every (from, to) pair a sync may be started for.
pub const ALLOWED_DIRECTIONS: [(&str, &str); 6] = [
    (PRODUCTION, DEVELOPMENT),
    (STAGING, DEVELOPMENT),
    (DEVELOPMENT, PRODUCTION),
    (DEVELOPMENT, STAGING),
    (PRODUCTION, STAGING),
    (STAGING, PRODUCTION),
];

const REMOTE_ENVIRONMENTS: [&str; 2] = [STAGING, PRODUCTION];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    Up,
    Down,
    Horizontal,
}

impl SyncDirection {
    pub fn resolve(from: &str, to: &str) -> Self {
        let is_remote = |name: &str| REMOTE_ENVIRONMENTS.iter().any(|remote| *remote == name);
        if is_remote(from) && is_remote(to) {
            SyncDirection::Horizontal
        } else if from == DEVELOPMENT {
            SyncDirection::Up
        } else {
            SyncDirection::Down
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            SyncDirection::Up => "⬆️",
            SyncDirection::Down => "⬇️",
            SyncDirection::Horizontal => "↔️",
        }
    }
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncDirection::Up => "up",
            SyncDirection::Down => "down",
            SyncDirection::Horizontal => "horizontal",
        })
    }
}

/// Resolves both names and checks the pair against [`ALLOWED_DIRECTIONS`].
/// Nothing is executed before this returns `Ok`.
pub fn validate_pair<'r>(
    registry: &'r EnvironmentRegistry,
    from: &str,
    to: &str,
) -> Result<(&'r Environment, &'r Environment, SyncDirection)> {
    let from_env = registry.resolve(from)?;
    let to_env = registry.resolve(to)?;

    let allowed = ALLOWED_DIRECTIONS
        .iter()
        .any(|&(allowed_from, allowed_to)| allowed_from == from && allowed_to == to);
    if from == to || !allowed {
        return Err(SyncError::InvalidDirection {
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    Ok((from_env, to_env, SyncDirection::resolve(from, to)))
}

/// `wp` addressed at an alias, or the plain local tool.
pub(crate) fn wp_command(options: &SyncOptions, alias: Option<&str>) -> ToolCommand {
    ToolCommand::new(&options.wp_cli_binary).args(alias)
}

/// The alias a command should target. `use_local` sends development commands
/// to the unaliased local tool.
pub(crate) fn cli_alias_for(environment: &Environment, use_local: bool) -> Option<&str> {
    if use_local && environment.name == DEVELOPMENT {
        None
    } else {
        environment.cli_alias.as_deref()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncFlags {
    pub skip_db: bool,
    pub skip_assets: bool,
    pub use_local: bool,
    pub no_permissions: bool,
    pub no_notify: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOperation {
    pub from: String,
    pub to: String,
    pub flags: SyncFlags,
}

/// A validated operation whose endpoints both answered the probe.
#[derive(Debug, Clone)]
pub struct SyncPlan<'a> {
    pub from: &'a Environment,
    pub to: &'a Environment,
    pub direction: SyncDirection,
    pub flags: SyncFlags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub direction: SyncDirection,
    pub database: Option<DatabaseSyncReport>,
    pub assets_synced: bool,
    pub notification: NotifyOutcome,
}

/// Runs sync operations against the environments of one configuration.
pub struct SyncService<'a> {
    config: &'a AppConfig,
    runner: &'a dyn CommandRunner,
}

impl<'a> SyncService<'a> {
    pub fn new(config: &'a AppConfig, runner: &'a dyn CommandRunner) -> Self {
        Self { config, runner }
    }

    /// Validates the pair and probes both endpoints. This is the last point
    /// at which an operation can be abandoned without side effects.
    pub async fn prepare(&self, operation: &SyncOperation) -> Result<SyncPlan<'a>> {
        let (from, to, direction) = validate_pair(&self.config.environments, &operation.from, &operation.to)?;
        if operation.flags.skip_db && operation.flags.skip_assets {
            return Err(SyncError::Config(
                "nothing to synchronize: both database and assets are skipped".to_string(),
            ));
        }

        let validator = ConnectivityValidator::new(self.runner, &self.config.options);
        for environment in [from, to] {
            if !validator.probe(environment).await? {
                return Err(SyncError::ConnectivityFailure {
                    environment: environment.name.clone(),
                });
            }
            info!(environment = %environment.name, "environment reachable");
        }

        Ok(SyncPlan {
            from,
            to,
            direction,
            flags: operation.flags,
        })
    }

    /// Database first, then assets, stopping at the first failure. The
    /// notification is sent only after both succeeded and never fails the sync.
    pub async fn execute(&self, plan: &SyncPlan<'_>) -> Result<SyncReport> {
        let options = &self.config.options;
        let mut report = SyncReport {
            direction: plan.direction,
            database: None,
            assets_synced: false,
            notification: NotifyOutcome::Skipped,
        };

        if !plan.flags.skip_db {
            let engine = DatabaseSyncEngine::new(self.runner, options);
            report.database = Some(engine.sync(plan.from, plan.to, plan.flags.use_local).await?);
        }

        if !plan.flags.skip_assets {
            let engine = AssetSyncEngine::new(self.runner, options);
            engine
                .sync(plan.from, plan.to, plan.direction, !plan.flags.no_permissions)
                .await?;
            report.assets_synced = true;
        }

        if !plan.flags.no_notify {
            let notifier = Notifier::new(self.runner, options);
            report.notification = notifier.notify_sync_complete(plan.from, plan.to).await;
            if let NotifyOutcome::Failed(reason) = &report.notification {
                warn!(%reason, "sync notification was not delivered");
            }
        }

        Ok(report)
    }

    pub async fn run(&self, operation: &SyncOperation) -> Result<SyncReport> {
        let plan = self.prepare(operation).await?;
        self.execute(&plan).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Stage;
    use crate::utils::testing::{ScriptedRunner, failed, ok};

    fn env(name: &str, uploads: &str, alias: Option<&str>) -> Environment {
        Environment {
            name: name.into(),
            url: format!("https://{}.example.com", name),
            uploads_path: uploads.into(),
            cli_alias: alias.map(Into::into),
            ssh_host: crate::environment::remote::RemoteAddress::parse(uploads).host,
            ssh_port: 22,
            remote_path: None,
        }
    }

    fn config_in(dir: &std::path::Path) -> AppConfig {
        AppConfig {
            environments: EnvironmentRegistry::from_environments([
                env(DEVELOPMENT, "web/app/uploads/", None),
                env(STAGING, "web@staging.example.com:/srv/www/shared/uploads/", Some("@staging")),
                env(PRODUCTION, "web@example.com:/srv/www/shared/uploads/", Some("@production")),
            ]),
            options: SyncOptions {
                backup_dir: dir.to_path_buf(),
                set_upload_permissions: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_direction_table() {
        assert_eq!(SyncDirection::resolve(STAGING, PRODUCTION), SyncDirection::Horizontal);
        assert_eq!(SyncDirection::resolve(PRODUCTION, STAGING), SyncDirection::Horizontal);
        assert_eq!(SyncDirection::resolve(DEVELOPMENT, STAGING), SyncDirection::Up);
        assert_eq!(SyncDirection::resolve(DEVELOPMENT, PRODUCTION), SyncDirection::Up);
        assert_eq!(SyncDirection::resolve(STAGING, DEVELOPMENT), SyncDirection::Down);
        assert_eq!(SyncDirection::resolve(PRODUCTION, DEVELOPMENT), SyncDirection::Down);
    }

    #[test]
    fn test_validate_pair_rejects_self_sync_and_unknown_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config_in(dir.path());
        let registry = &config.environments;

        assert!(matches!(
            validate_pair(registry, STAGING, STAGING),
            Err(SyncError::InvalidDirection { .. })
        ));
        assert!(matches!(
            validate_pair(registry, "qa", STAGING),
            Err(SyncError::NotFound { .. })
        ));
        for (from, to) in ALLOWED_DIRECTIONS {
            assert!(validate_pair(registry, from, to).is_ok(), "{from} -> {to}");
        }
    }

    #[test]
    fn test_validate_pair_rejects_pairs_outside_allow_list() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = config_in(dir.path());
        let mut environments: Vec<Environment> = config.environments.iter().cloned().collect();
        environments.push(env("qa", "web@qa.example.com:/srv/uploads/", Some("@qa")));
        config.environments = EnvironmentRegistry::from_environments(environments);

        assert!(matches!(
            validate_pair(&config.environments, "qa", STAGING),
            Err(SyncError::InvalidDirection { .. })
        ));
    }

    #[tokio::test]
    async fn test_development_to_staging_end_to_end() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = config_in(dir.path());
        let runner = ScriptedRunner::with(|cmd| {
            if cmd.arguments().iter().any(|a| a == "home") {
                ok("https://example.com\n")
            } else {
                ok("")
            }
        });
        let service = SyncService::new(&config, &runner);
        let operation = SyncOperation {
            from: DEVELOPMENT.into(),
            to: STAGING.into(),
            flags: SyncFlags::default(),
        };

        let report = service.run(&operation).await?;
        assert_eq!(report.direction, SyncDirection::Up);
        assert!(report.assets_synced);
        assert_eq!(report.notification, NotifyOutcome::Skipped);
        assert_eq!(report.database.as_ref().map(|d| d.completed_stages.len()), Some(4));

        let calls = runner.calls();
        assert_eq!(calls.len(), 7, "{calls:#?}");
        assert_eq!(calls[0], "wp option get home");
        assert_eq!(calls[1], "wp @staging option get home");
        assert!(calls[2].starts_with("wp @staging db export"));
        assert_eq!(calls[3], "wp @staging db reset --yes");
        assert_eq!(calls[4], "wp db export --default-character-set=utf8mb4 - | wp @staging db import -");
        assert!(calls[5].starts_with("wp @staging search-replace"));
        assert_eq!(
            calls[6],
            "rsync -az --progress web/app/uploads/ web@staging.example.com:/srv/www/shared/uploads/"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_unreachable_target_stops_before_any_stage() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = config_in(dir.path());
        let runner = ScriptedRunner::with(|cmd| {
            if cmd.arguments().first().map(String::as_str) == Some("@production") {
                failed("ssh: Could not resolve hostname")
            } else {
                ok("https://example.test")
            }
        });
        let service = SyncService::new(&config, &runner);
        let operation = SyncOperation {
            from: STAGING.into(),
            to: PRODUCTION.into(),
            flags: SyncFlags::default(),
        };

        match service.run(&operation).await {
            Err(SyncError::ConnectivityFailure { environment }) => assert_eq!(environment, PRODUCTION),
            other => panic!("expected connectivity failure, got {:?}", other),
        }
        assert_eq!(runner.calls().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_direction_runs_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config_in(dir.path());
        let runner = ScriptedRunner::succeeding();
        let service = SyncService::new(&config, &runner);
        let operation = SyncOperation {
            from: PRODUCTION.into(),
            to: PRODUCTION.into(),
            flags: SyncFlags::default(),
        };
        assert!(matches!(
            service.run(&operation).await,
            Err(SyncError::InvalidDirection { .. })
        ));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_horizontal_assets_only() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = config_in(dir.path());
        let runner = ScriptedRunner::succeeding();
        let service = SyncService::new(&config, &runner);
        let operation = SyncOperation {
            from: PRODUCTION.into(),
            to: STAGING.into(),
            flags: SyncFlags {
                skip_db: true,
                ..Default::default()
            },
        };

        let report = service.run(&operation).await?;
        assert_eq!(report.direction, SyncDirection::Horizontal);
        assert_eq!(report.database, None);
        let calls = runner.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls[2].starts_with("ssh -o ForwardAgent=yes web@example.com "));
        Ok(())
    }

    #[tokio::test]
    async fn test_database_failure_skips_assets() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = config_in(dir.path());
        let runner = ScriptedRunner::with(|cmd| {
            if cmd.arguments().iter().any(|a| a == "search-replace") {
                failed("Error: table prefix mismatch")
            } else {
                ok("https://example.com")
            }
        });
        let service = SyncService::new(&config, &runner);
        let operation = SyncOperation {
            from: PRODUCTION.into(),
            to: DEVELOPMENT.into(),
            flags: SyncFlags::default(),
        };

        match service.run(&operation).await {
            Err(SyncError::StageFailure { stage, .. }) => assert_eq!(stage, Stage::SearchReplace),
            other => panic!("expected search-replace failure, got {:?}", other),
        }
        assert!(!runner.calls().iter().any(|c| c.starts_with("rsync")));
        Ok(())
    }
    #[tokio::test]
    async fn test_missing_wp_fails_before_any_stage() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = config_in(dir.path());
        let runner = ScriptedRunner::answering(|cmd| {
            Err(SyncError::ToolMissing {
                program: cmd.program().to_string(),
            })
        });
        let service = SyncService::new(&config, &runner);
        let operation = SyncOperation {
            from: PRODUCTION.into(),
            to: DEVELOPMENT.into(),
            flags: SyncFlags::default(),
        };

        assert!(matches!(
            service.run(&operation).await,
            Err(SyncError::ToolMissing { .. })
        ));
        // Only the source was checked.
        assert_eq!(runner.calls(), vec!["wp @production option get home"]);
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_stage_timeout_aborts_the_sync() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = config_in(dir.path());
        let runner = ScriptedRunner::answering(|cmd| {
            if cmd.arguments().iter().any(|a| a == "reset") {
                Err(SyncError::Timeout {
                    command: cmd.to_string(),
                    seconds: 30,
                })
            } else {
                Ok(ok("https://example.com"))
            }
        });
        let service = SyncService::new(&config, &runner);
        let operation = SyncOperation {
            from: PRODUCTION.into(),
            to: DEVELOPMENT.into(),
            flags: SyncFlags::default(),
        };

        match service.run(&operation).await {
            Err(SyncError::Timeout { seconds, .. }) => assert_eq!(seconds, 30),
            other => panic!("expected timeout, got {:?}", other),
        }
        let calls = runner.calls();
        assert!(!calls.iter().any(|c| c.contains("db import") || c.starts_with("rsync")));
        Ok(())
    }
}
