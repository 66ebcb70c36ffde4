//! Environment Sync Tool
//!
//! Provides CLI interface for database and uploads synchronization between
//! WordPress environments

// envsync/src/main.rs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use envsync::cli::config::{ConfigAction, run_config_flow};
use envsync::cli::env::run_env_flow;
use envsync::cli::init::{InitOptions, run_init_flow};
use envsync::cli::status::run_status_flow;
use envsync::cli::StdinPrompt;
use envsync::config::{AppConfig, DEFAULT_CONFIG_FILE};
use envsync::sync::{SyncFlags, SyncOperation};
use envsync::utils::command::SystemRunner;

#[derive(Parser)]
#[command(name = "envsync")]
#[command(about = "Synchronize WordPress databases and uploads between environments", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the sync configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// Set the log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync database and uploads from one environment to another
    Env {
        /// Source environment (development, staging, production)
        from: String,
        /// Target environment (development, staging, production)
        to: String,
        /// Skip database synchronization
        #[arg(long)]
        skip_db: bool,
        /// Skip uploads synchronization
        #[arg(long)]
        skip_assets: bool,
        /// Run development commands with the local wp instead of its alias
        #[arg(long)]
        local: bool,
        /// Do not send a Slack notification
        #[arg(long)]
        no_slack: bool,
        /// Do not normalize local uploads permissions
        #[arg(long)]
        no_permissions: bool,
        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
    },
    /// Show environment details and check connectivity
    Status {
        /// Only check this environment
        environment: Option<String>,
    },
    /// Create the configuration from wp-cli.yml, sync.sh and prompts
    Init {
        /// Overwrite an existing configuration without asking
        #[arg(long)]
        force: bool,
        /// Take remote SSH details from wp-cli.yml and only ask for URLs
        #[arg(long)]
        auto: bool,
    },
    /// Show, edit or reset the configuration
    Config {
        #[arg(value_enum, default_value_t = ConfigAction::Show)]
        action: ConfigAction,
        /// Limit the action to one environment
        #[arg(long)]
        environment: Option<String>,
    },
}

/// Main entry point for the sync tool
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // RUST_LOG wins over --log.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match run_app(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(config_path: &Path) -> Result<AppConfig> {
    AppConfig::load_from_json(config_path).with_context(|| {
        format!(
            "Failed to load sync configuration from {} (run `envsync init` to create it)",
            config_path.display()
        )
    })
}

async fn run_app(cli: Cli) -> Result<ExitCode> {
    let mut prompt = StdinPrompt;

    match cli.command {
        Commands::Env {
            from,
            to,
            skip_db,
            skip_assets,
            local,
            no_slack,
            no_permissions,
            force,
        } => {
            let config = load_config(&cli.config)?;
            let runner = SystemRunner::new();
            let operation = SyncOperation {
                from,
                to,
                flags: SyncFlags {
                    skip_db,
                    skip_assets,
                    use_local: local,
                    no_permissions,
                    no_notify: no_slack,
                },
            };
            run_env_flow(&config, &runner, &operation, force, &mut prompt).await?;
        }
        Commands::Status { environment } => {
            let config = load_config(&cli.config)?;
            let runner = SystemRunner::new();
            let (connected, total) = run_status_flow(&config, &runner, environment.as_deref()).await?;
            if connected < total {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Init { force, auto } => {
            let start = std::env::current_dir().context("Failed to determine current directory")?;
            let wp_home = std::env::var("WP_HOME").ok();
            run_init_flow(&cli.config, &start, InitOptions { force, auto }, &mut prompt, wp_home)?;
        }
        Commands::Config { action, environment } => {
            run_config_flow(&cli.config, action, environment.as_deref(), &mut prompt)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}
