//! ccs CLI entry point
//!
//! Parses arguments and dispatches through `cli::run`. Errors are printed
//! as JSON on stdout and as text on stderr, and exit with code 1.

use ccs::cli;

fn main() {
    match cli::run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            let _ = cli::write_error(e.code_str(), e.message());
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
