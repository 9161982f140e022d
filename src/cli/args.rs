//! CLI argument definitions using clap
//!
//! Commands:
//! - ccs add PATH --profile P
//! - ccs status CID / ls / peers
//! - ccs get CID --output DEST
//! - ccs health / repair / rebalance
//! - ccs tag-pins --profile P / ensure-pins --profile P
//! - ccs config-check / sync-peer-ids

use clap::{Parser, Subcommand};
use regex::Regex;
use std::path::PathBuf;

/// ccs - pinning orchestrator for a private multi-organization cluster
#[derive(Parser, Debug)]
#[command(name = "ccs")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (default: ~/.ccs/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Node (or hostname) whose cluster API to talk to
    #[arg(long, global = true, value_parser = parse_host)]
    pub host: Option<String>,

    /// Override the configured per-call timeout, in seconds
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a file or directory, allocated by profile
    Add {
        path: PathBuf,

        /// Organization profile that owns the content
        #[arg(long)]
        profile: String,

        /// Accept a directory and upload its whole tree
        #[arg(short, long)]
        recursive: bool,

        /// Also write the full result to this file
        #[arg(long)]
        output_json: Option<PathBuf>,
    },

    /// Show pin state for a CID
    Status { cid: String },

    /// Download content from a peer that holds it
    Get {
        cid: String,

        #[arg(long)]
        output: PathBuf,

        /// Prefer this profile's primary node
        #[arg(long)]
        profile: Option<String>,
    },

    /// List every pin
    Ls,

    /// List cluster peers
    Peers,

    /// Summarize peer and pin health
    Health,

    /// Recover pins that report errors
    Repair {
        #[arg(long)]
        dry_run: bool,
    },

    /// Tag pins with org and size metadata until the cluster converges
    TagPins {
        #[arg(long)]
        profile: String,

        #[arg(long)]
        dry_run: bool,

        /// Maximum number of passes
        #[arg(long, default_value_t = 3)]
        passes: u32,

        /// Pause between passes, in milliseconds
        #[arg(long, default_value_t = 2000)]
        delay_ms: u64,
    },

    /// Re-allocate a profile's pins onto primary, backup and extra peers
    EnsurePins {
        #[arg(long)]
        profile: String,

        #[arg(long)]
        dry_run: bool,
    },

    /// Bring every org-tagged pin within the replication bounds
    Rebalance {
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate the configuration file
    ConfigCheck,

    /// Fill in missing node peer ids from the cluster's peer list
    SyncPeerIds {
        #[arg(long)]
        dry_run: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

fn parse_host(value: &str) -> Result<String, String> {
    if value.starts_with("--") {
        return Err(format!(
            "'{}' looks like a flag, not a hostname. Did you forget a value for --host?",
            value
        ));
    }
    let pattern = Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9\-\.]*$").map_err(|e| e.to_string())?;
    if !pattern.is_match(value) {
        return Err(format!("'{}' doesn't look like a valid hostname", value));
    }
    Ok(value.to_string())
}
