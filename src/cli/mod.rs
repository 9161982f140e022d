//! CLI module for ccs
//!
//! A thin shell over `operations`: parse arguments, load the
//! configuration, run one operation, print JSON, exit with its code.

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{
    run, run_cli, run_command, sync_peer_ids, tag_until_converged, ConfigCheck, PeerIdSync, TagRun,
};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_json_file, write_result};
