//! `lifecyclemgr` entry point.
//!
//! This binary is the composition root for the entire system:
//!
//! 1. **Parse configuration**: load `lifecycle.toml` and validate the policy
//!    records.
//! 2. **Wire observability**: install `tracing-subscriber` with a pretty or
//!    JSON layer and, when configured, an OpenTelemetry OTLP exporter.
//! 3. **Construct infrastructure**: the GitHub client, the member-activity
//!    resolver and the ZenHub pipeline resolver, injected into
//!    [`manager::LifecycleManager`].
//! 4. **Run the command**: a full `sweep` of every configured repository, or
//!    `manage` for a single issue.

mod config;
mod telemetry;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use github::{
    GithubClient, GithubConfig, MemberActivityResolver, NoPipelines, ZenhubClient, ZenhubConfig,
};
use lifecycle::{IssueRef, PipelineResolver};
use manager::{Collaborators, LifecycleManager};
use tracing::{error, info};

use crate::config::Config;
use crate::telemetry::LogFormat;

/// Keeps GitHub issues and pull requests moving through triage, escalation,
/// staleness and closure.
#[derive(Debug, Parser)]
#[command(name = "lifecyclemgr", version)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, env = "LIFECYCLE_CONFIG", default_value = "lifecycle.toml", global = true)]
    config: PathBuf,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,

    /// GitHub access token.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: String,

    /// ZenHub API token. Without it no issue has a pipeline.
    #[arg(long, env = "ZENHUB_TOKEN", hide_env_values = true)]
    zenhub_token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Evaluate every open issue and pull request in every configured repository.
    Sweep {
        /// Log the actions that would be taken without changing anything.
        #[arg(long)]
        dry_run: bool,
    },
    /// Evaluate a single issue or pull request, written `org/repo#number`.
    Manage { issue: IssueRef },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let telemetry = match telemetry::init(cli.log_format) {
        Ok(telemetry) => telemetry,
        Err(err) => {
            eprintln!("lifecyclemgr: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    let code = match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %format!("{err:#}"), "lifecyclemgr failed");
            ExitCode::FAILURE
        }
    };

    telemetry.shutdown();
    code
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(&cli.config)?;
    let manager = build_manager(&cli, config)?;

    match cli.command {
        Command::Sweep { dry_run } => match manager.sweep_all(dry_run).await {
            Ok(report) => {
                info!(
                    sweep_id = %report.sweep_id,
                    totals = %report.totals(),
                    failed_issues = report.failed_issues(),
                    skipped_repositories = report.skipped.len(),
                    "Sweep complete"
                );
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            Err(err) => {
                // Still print what was swept before failing the run.
                println!("{}", serde_json::to_string_pretty(&err.report)?);
                return Err(err.into());
            }
        },
        Command::Manage { issue } => {
            let decision = manager.manage_one(&issue).await?;
            println!("{}", serde_json::to_string_pretty(&decision)?);
        }
    }
    Ok(())
}

fn build_manager(cli: &Cli, config: Config) -> Result<LifecycleManager> {
    let mut github_config = GithubConfig::new(cli.github_token.clone());
    if let Some(api_url) = config.github_api_url {
        github_config.api_url = api_url;
    }
    github_config.max_rate_limit_wait = config.max_rate_limit_wait;
    let github = GithubClient::new(github_config).context("building the GitHub client")?;

    let pipelines: Arc<dyn PipelineResolver> = match &cli.zenhub_token {
        Some(token) => {
            let mut zenhub_config = ZenhubConfig::new(token.clone());
            if let Some(api_url) = config.zenhub_api_url {
                zenhub_config.api_url = api_url;
            }
            Arc::new(
                ZenhubClient::new(zenhub_config, github.clone())
                    .context("building the ZenHub client")?,
            )
        }
        None => Arc::new(NoPipelines::new()),
    };

    let collaborators = Collaborators {
        issues: Arc::new(github.clone()),
        activity: Arc::new(MemberActivityResolver::new(github.clone())),
        pipelines,
        mutator: Arc::new(github),
    };

    Ok(LifecycleManager::new(
        Arc::new(config.policies),
        collaborators,
        config.manager,
    ))
}
