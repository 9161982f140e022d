//! JSON output for the CLI
//!
//! - Results: one pretty-printed JSON document on stdout
//! - Errors: `{"status":"error","code":…,"message":…}` on stdout
//! - Logs never go to stdout

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use super::errors::CliResult;

/// Write an operation result to stdout
pub fn write_result<T: Serialize>(result: &T) -> CliResult<()> {
    let mut stdout = io::stdout();
    write_to(&mut stdout, result)?;
    stdout.flush()?;
    Ok(())
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    });

    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, &response)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}

/// Write a result to a file, replacing it
pub fn write_json_file<T: Serialize>(path: &Path, result: &T) -> CliResult<()> {
    let mut buf = Vec::new();
    write_to(&mut buf, result)?;
    fs::write(path, buf)?;
    Ok(())
}

fn write_to<W: Write, T: Serialize>(out: &mut W, result: &T) -> CliResult<()> {
    serde_json::to_writer_pretty(&mut *out, result)?;
    writeln!(out)?;
    Ok(())
}
