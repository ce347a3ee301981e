//! Command-line interface for astra.
//!
//! Provides commands for triggering runs, approving paused runs, checking
//! status, auditing a run's trail, and the snapshot-mismatch demonstration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{Config, ConfigOverrides};
use crate::core::{Orchestrator, TriggerRequest, DEFAULT_QUERY_LIMIT};
use crate::domain::RunId;

/// astra - Policy-gated run orchestrator
#[derive(Parser, Debug)]
#[command(name = "astra")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (YAML)
    #[arg(long, global = true, env = "ASTRA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Storage root for run records and the event log
    #[arg(long, global = true, env = "ASTRA_HOME")]
    pub home: Option<PathBuf>,

    /// Decision engine binary
    #[arg(long, global = true, env = "ASTRA_ENGINE")]
    pub engine: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a new run and print its id
    Trigger {
        /// Tenant the run belongs to
        #[arg(long)]
        tenant: Option<String>,

        /// Who is triggering the run
        #[arg(long)]
        actor: Option<String>,

        /// Risk level passed to policy evaluation
        #[arg(long)]
        risk_level: Option<String>,

        /// Ask the engine to fail the execution (runs that skip approval)
        #[arg(long)]
        force_fail: bool,
    },

    /// Approve a run that is awaiting approval
    Approve {
        /// Run ID
        run_id: String,

        /// Who is approving
        #[arg(long)]
        approver: Option<String>,
    },

    /// Show a run's record and recent events
    Status {
        /// Run ID
        run_id: String,

        /// Maximum number of events to show
        #[arg(short, long, default_value_t = DEFAULT_QUERY_LIMIT)]
        limit: usize,
    },

    /// Check that the engine rejects a mismatched policy snapshot
    DemoMismatch,

    /// Audit a run's event trail against its record
    Verify {
        /// Run ID
        run_id: String,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = Config::load(&ConfigOverrides {
            config_file: self.config,
            home: self.home,
            engine: self.engine,
        })?;

        match self.command {
            Commands::Trigger {
                tenant,
                actor,
                risk_level,
                force_fail,
            } => {
                trigger(
                    &config,
                    TriggerRequest {
                        tenant_id: tenant,
                        actor,
                        risk_level,
                        force_fail,
                    },
                )
                .await
            }
            Commands::Approve { run_id, approver } => {
                approve(&config, &run_id, approver.as_deref()).await
            }
            Commands::Status { run_id, limit } => {
                show_status(&config, &run_id, limit).await
            }
            Commands::DemoMismatch => {
                demo_mismatch(&config).await
            }
            Commands::Verify { run_id } => {
                verify(&config, &run_id).await
            }
            Commands::Config => {
                show_config(&config);
                Ok(())
            }
        }
    }
}

async fn open(config: &Config) -> Result<Orchestrator> {
    Orchestrator::open(config)
        .await
        .with_context(|| format!("Failed to open storage at {}", config.home.display()))
}

/// Trigger a run and print its id
async fn trigger(config: &Config, request: TriggerRequest) -> Result<()> {
    let orchestrator = open(config).await?;
    let outcome = orchestrator.trigger(request).await?;

    println!("{}", outcome.record.run_id);
    Ok(())
}

/// Approve a paused run
async fn approve(config: &Config, run_id: &str, approver: Option<&str>) -> Result<()> {
    let orchestrator = open(config).await?;
    orchestrator.approve(&RunId::from(run_id), approver).await?;
    Ok(())
}

/// Show the record and most recent events of a run
async fn show_status(config: &Config, run_id: &str, limit: usize) -> Result<()> {
    let orchestrator = open(config).await?;
    let report = orchestrator.status(&RunId::from(run_id), limit).await?;

    println!("{}", serde_json::to_string_pretty(&report.record)?);

    if !report.log_present {
        println!("No event log found.");
    } else if report.recent_events.is_empty() {
        println!("No events found for run.");
    } else {
        println!("Recent events:");
        for event in &report.recent_events {
            println!("{}", serde_json::to_string(event)?);
        }
    }

    Ok(())
}

/// Run the snapshot-mismatch demonstration
async fn demo_mismatch(config: &Config) -> Result<()> {
    let orchestrator = open(config).await?;
    let outcome = orchestrator
        .demo_mismatch()
        .await
        .context("Mismatch demonstration failed")?;

    println!(
        "Demo mismatch run_id={} reason_code={}",
        outcome.record.run_id,
        outcome.reason_code.as_deref().unwrap_or("none")
    );
    Ok(())
}

/// Audit a run; exits non-zero on any finding
async fn verify(config: &Config, run_id: &str) -> Result<()> {
    let orchestrator = open(config).await?;
    let report = orchestrator.verify(&RunId::from(run_id)).await?;

    println!(
        "Run {}: {} events checked",
        report.run_id, report.events_checked
    );

    if report.is_clean() {
        println!("No findings.");
        return Ok(());
    }

    for finding in &report.findings {
        println!("  - {}", finding);
    }
    anyhow::bail!(
        "Run {} has {} audit finding(s)",
        report.run_id,
        report.findings.len()
    )
}

/// Show the resolved configuration (for debugging)
fn show_config(cfg: &Config) {
    println!("astra configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    if let Some(version) = &cfg.config_version {
        println!("Config version: {}", version);
    }
    println!();
    println!("Paths:");
    println!("  Home:   {}", cfg.home.display());
    println!("  Runs:   {}", cfg.runs_dir.display());
    println!("  Events: {}", cfg.events_path.display());
    println!(
        "  Policy: {}",
        cfg.policy_snapshot_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - per-run snapshot)".to_string())
    );
    println!();
    println!("Engine:");
    println!("  Binary:  {}", cfg.engine.binary.display());
    if !cfg.engine.args.is_empty() {
        println!("  Args:    {}", cfg.engine.args.join(" "));
    }
    println!("  Timeout: {}s", cfg.engine.timeout.as_secs());
    println!();
    println!("Defaults:");
    println!("  Tenant:     {}", cfg.defaults.tenant_id);
    println!("  Actor:      {}", cfg.defaults.actor);
    println!("  Approver:   {}", cfg.defaults.approver);
    println!("  Risk level: {}", cfg.defaults.risk_level);
}
