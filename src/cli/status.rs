// envsync/src/cli/status.rs
use anyhow::{Result, bail};

use crate::config::{AppConfig, SyncOptions};
use crate::environment::Environment;
use crate::sync::connectivity::ConnectivityValidator;
use crate::utils::command::CommandRunner;

pub fn describe(environment: &Environment) -> Vec<String> {
    let mut lines = vec![
        format!("  URL: {}", environment.url),
        format!("  Uploads: {}", environment.uploads_path),
        format!(
            "  WP-CLI Alias: {}",
            environment.cli_alias.as_deref().unwrap_or("Local environment")
        ),
    ];
    if let Some(host) = &environment.ssh_host {
        lines.push(format!("  SSH Host: {}", host));
        if environment.has_custom_port() {
            lines.push(format!("  SSH Port: {}", environment.ssh_port));
        }
    }
    if let Some(path) = &environment.remote_path {
        lines.push(format!("  Remote Path: {}", path));
    }
    lines
}

async fn check(runner: &dyn CommandRunner, options: &SyncOptions, environment: &Environment) -> bool {
    for line in describe(environment) {
        println!("{}", line);
    }
    match ConnectivityValidator::new(runner, options).probe(environment).await {
        Ok(true) => {
            println!("  Connectivity: ✅ Connected");
            true
        }
        Ok(false) => {
            println!("  Connectivity: ❌ Failed");
            false
        }
        Err(e) => {
            println!("  Connectivity: ❌ Error: {}", e);
            false
        }
    }
}

/// Shows one environment, or every environment followed by a summary.
/// Returns how many of the checked environments answered.
pub async fn run_status_flow(
    config: &AppConfig,
    runner: &dyn CommandRunner,
    environment: Option<&str>,
) -> Result<(usize, usize)> {
    if let Some(name) = environment {
        let environment = config.environments.resolve(name)?;
        println!("🔍 Checking {} environment...\n", name);
        let reachable = check(runner, &config.options, environment).await;
        return Ok((usize::from(reachable), 1));
    }

    if config.environments.is_empty() {
        bail!("No environments configured. Run `envsync init` to set up environments.");
    }

    println!("🔍 Checking all environments...\n");
    let mut total = 0;
    let mut connected = 0;
    for environment in config.environments.iter() {
        println!("Environment: {}", environment.name);
        if check(runner, &config.options, environment).await {
            connected += 1;
        }
        total += 1;
        println!();
    }

    println!("📊 Summary:\n");
    println!("  Total environments: {}", total);
    println!("  Connected: {}", connected);
    println!("  Failed: {}", total - connected);
    if connected == total {
        println!("\n🎉 All environments are accessible!");
    } else if connected == 0 {
        println!("\n❌ No environments are accessible. Please check your configuration.");
    } else {
        println!("\n⚠️  Some environments are not accessible. Please check the failed connections.");
    }
    Ok((connected, total))
}
