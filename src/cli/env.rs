// envsync/src/cli/env.rs
use anyhow::{Context, Result};

use super::Prompt;
use crate::config::AppConfig;
use crate::notify::NotifyOutcome;
use crate::sync::{SyncOperation, SyncPlan, SyncReport, SyncService};
use crate::utils::command::CommandRunner;

/// What the operator is about to lose, one line per stage group.
pub fn preview_lines(plan: &SyncPlan<'_>) -> Vec<String> {
    let mut lines = Vec::new();
    if !plan.flags.skip_db {
        lines.push(format!("  • Reset the {} database ({})", plan.to.name, plan.to.url));
    }
    if !plan.flags.skip_assets {
        lines.push(format!(
            "  • Sync assets {} from {} ({})",
            plan.direction.emoji(),
            plan.from.name,
            plan.from.url
        ));
    }
    lines
}

/// Validates, probes, asks for confirmation, then runs the sync.
///
/// Returns `None` when the operator declines at the confirmation gate.
pub async fn run_env_flow(
    config: &AppConfig,
    runner: &dyn CommandRunner,
    operation: &SyncOperation,
    force: bool,
    prompt: &mut dyn Prompt,
) -> Result<Option<SyncReport>> {
    let service = SyncService::new(config, runner);

    println!("🔍 Checking environment connectivity...");
    let plan = service
        .prepare(operation)
        .await
        .with_context(|| format!("Cannot sync {} → {}", operation.from, operation.to))?;
    println!("✅ Able to connect to {}", plan.from.name);
    println!("✅ Able to connect to {}", plan.to.name);

    if !force && config.options.confirm_destructive_operations {
        println!("\n📋 Sync Preview:\n");
        for line in preview_lines(&plan) {
            println!("{}", line);
        }
        println!();
        if !prompt.confirm("Would you like to proceed with this sync?", false)? {
            println!("Sync cancelled.");
            return Ok(None);
        }
    }

    if !operation.flags.skip_db {
        println!("📊 Syncing database...");
    }
    if !operation.flags.skip_assets {
        println!("📁 Syncing assets...");
    }
    let report = service
        .execute(&plan)
        .await
        .with_context(|| format!("Sync from {} to {} failed", plan.from.name, plan.to.name))?;

    if let Some(database) = &report.database {
        println!("✓ Database sync complete (backup: {})", database.backup_file.display());
    }
    if report.assets_synced {
        println!("✓ Assets sync complete");
    }
    match &report.notification {
        NotifyOutcome::Sent => println!("✓ Notification sent"),
        NotifyOutcome::Failed(reason) => println!("⚠️  Notification not delivered: {}", reason),
        NotifyOutcome::Skipped => {}
    }

    println!("\n🔄 Sync from {} to {} complete.", plan.from.name, plan.to.name);
    println!("🌐 {}", plan.to.url);
    Ok(Some(report))
}
