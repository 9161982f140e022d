//! CLI command implementations
//!
//! Commands are thin: load the configuration, run one operation on a
//! fresh runtime, print its JSON result and map it to an exit code.
//! repair, health and rebalance exit with their report's own code;
//! add exits with its return code; everything else exits 0 or 1.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::config::{CcsConfig, ValidationReport};
use crate::observability::{log_event_with_fields, Event, Logger};
use crate::operations::{OpsResult, Operations, TagReport};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{write_json_file, write_result};

/// Result of `tag-pins`: every pass, in order
#[derive(Debug, Clone, Serialize)]
pub struct TagRun {
    pub profile: String,
    pub converged: bool,
    pub passes: Vec<TagReport>,
}

/// Result of `config-check`
#[derive(Debug, Clone, Serialize)]
pub struct ConfigCheck {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub valid: bool,
    #[serde(flatten)]
    pub report: ValidationReport,
}

/// Result of `sync-peer-ids`
#[derive(Debug, Clone, Serialize)]
pub struct PeerIdSync {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub dry_run: bool,
    /// Node name to discovered peer id
    pub discovered: BTreeMap<String, String>,
    pub saved: bool,
}

/// Parse arguments and run; returns the process exit code
pub fn run() -> CliResult<i32> {
    run_cli(Cli::parse_args())
}

pub fn run_cli(cli: Cli) -> CliResult<i32> {
    Logger::init_from_env();
    let config_path = cli.config.unwrap_or_else(CcsConfig::default_path);

    if let Command::ConfigCheck = cli.command {
        return config_check(&config_path);
    }

    let mut config = CcsConfig::load_validated(&config_path)?;
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = timeout;
    }
    let mut ops = Operations::new(&config);
    if let Some(host) = cli.host {
        ops = ops.with_host(host);
    }

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::runtime_failed(format!("Failed to create tokio runtime: {}", e)))?;
    if let Command::SyncPeerIds { dry_run } = cli.command {
        let sync = rt.block_on(sync_peer_ids(&ops, Some(config_path.as_path()), dry_run))?;
        write_result(&sync)?;
        return Ok(0);
    }
    rt.block_on(run_command(&ops, cli.command))
}

/// Run one command against an already loaded configuration
pub async fn run_command(ops: &Operations<'_>, cmd: Command) -> CliResult<i32> {
    match cmd {
        Command::Add {
            path,
            profile,
            recursive,
            output_json,
        } => {
            let result = ops.add(&path, &profile, recursive).await;
            if let Some(output) = output_json {
                write_json_file(&output, &result)?;
            }
            write_result(&result)?;
            Ok(i32::from(result.returncode.code()))
        }
        Command::Status { cid } => {
            write_result(&ops.status(&cid).await?)?;
            Ok(0)
        }
        Command::Get {
            cid,
            output,
            profile,
        } => {
            write_result(&ops.get(&cid, &output, profile.as_deref()).await?)?;
            Ok(0)
        }
        Command::Ls => {
            write_result(&ops.ls().await?)?;
            Ok(0)
        }
        Command::Peers => {
            write_result(&ops.peers().await?)?;
            Ok(0)
        }
        Command::Health => {
            let report = ops.health().await?;
            write_result(&report)?;
            Ok(report.exit_code)
        }
        Command::Repair { dry_run } => {
            let report = ops.repair(dry_run).await?;
            write_result(&report)?;
            Ok(report.exit_code)
        }
        Command::TagPins {
            profile,
            dry_run,
            passes,
            delay_ms,
        } => {
            let run = tag_until_converged(
                ops,
                &profile,
                dry_run,
                passes,
                Duration::from_millis(delay_ms),
            )
            .await?;
            write_result(&run)?;
            Ok(if run.converged || dry_run { 0 } else { 1 })
        }
        Command::EnsurePins { profile, dry_run } => {
            let report = ops.ensure_pins(&profile, dry_run).await?;
            write_result(&report)?;
            Ok(if report.errors == 0 { 0 } else { 1 })
        }
        Command::Rebalance { dry_run } => {
            let report = ops.rebalance(dry_run).await?;
            write_result(&report)?;
            Ok(report.exit_code)
        }
        Command::ConfigCheck => {
            let check = checked(None, ops.config());
            write_result(&check)?;
            Ok(if check.valid { 0 } else { 1 })
        }
        Command::SyncPeerIds { dry_run } => {
            write_result(&sync_peer_ids(ops, None, dry_run).await?)?;
            Ok(0)
        }
    }
}

/// Look up missing peer ids and, unless `dry_run` or no `path` is given,
/// write them into the configuration file at `path`.
pub async fn sync_peer_ids(
    ops: &Operations<'_>,
    path: Option<&Path>,
    dry_run: bool,
) -> CliResult<PeerIdSync> {
    let discovered = ops.discover_peer_ids().await?;

    let mut saved = false;
    if let Some(path) = path.filter(|_| !dry_run && !discovered.is_empty()) {
        // Re-read the file so command-line overrides are not persisted
        let mut config = CcsConfig::load(path)?;
        for (name, peer_id) in &discovered {
            if let Some(node) = config.nodes.get_mut(name) {
                node.peer_id = Some(peer_id.clone());
            }
        }
        config.save(path)?;
        log_event_with_fields(
            Event::ConfigSaved,
            &[
                ("path", &path.display().to_string()),
                ("peer_ids", &discovered.len().to_string()),
            ],
        );
        saved = true;
    }

    Ok(PeerIdSync {
        path: path.map(|p| p.display().to_string()),
        dry_run,
        discovered,
        saved,
    })
}

/// Re-run tag passes until one changes nothing, at most `max_passes`.
///
/// A dry run stops after its first pass since it never changes state.
pub async fn tag_until_converged(
    ops: &Operations<'_>,
    profile: &str,
    dry_run: bool,
    max_passes: u32,
    delay: Duration,
) -> OpsResult<TagRun> {
    let max_passes = max_passes.max(1);
    let mut passes = Vec::new();
    let mut converged = false;

    for pass in 1..=max_passes {
        let report = ops.tag_pins(profile, dry_run).await?;
        converged = report.converged;
        passes.push(report);
        if converged || dry_run {
            break;
        }
        if pass < max_passes {
            tokio::time::sleep(delay).await;
        }
    }

    log_event_with_fields(
        Event::TagConvergence,
        &[
            ("converged", &converged.to_string()),
            ("passes", &passes.len().to_string()),
            ("profile", profile),
        ],
    );
    Ok(TagRun {
        profile: profile.to_string(),
        converged,
        passes,
    })
}

fn config_check(path: &Path) -> CliResult<i32> {
    let check = check_config(path)?;
    write_result(&check)?;
    Ok(if check.valid { 0 } else { 1 })
}

fn check_config(path: &Path) -> CliResult<ConfigCheck> {
    let config = CcsConfig::load(path)?;
    Ok(checked(Some(path), &config))
}

fn checked(path: Option<&Path>, config: &CcsConfig) -> ConfigCheck {
    let report = config.validate();
    ConfigCheck {
        path: path.map(|p| p.display().to_string()),
        valid: report.is_ok(),
        report,
    }
}
