//! Miette diagnostic conversion for CLI errors.

use crate::error::CliError;
use isle_dev::DevError;
use miette::Report;

/// Convert CliError to miette Report
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Config(e) => miette::miette!("Configuration error: {}", e),
        CliError::Dev(e) => dev_error_to_miette(e),
        _ => miette::miette!("{}", err),
    }
}

/// Convert a dev pipeline startup error to miette Report
pub fn dev_error_to_miette(err: DevError) -> Report {
    match err {
        DevError::RootNotFound(root) => miette::miette!(
            "Project root not found: {}\n\nHint: Run isle from the project directory or pass --cwd <dir>",
            root.display()
        ),
        DevError::Server(message) => miette::miette!(
            "Server error: {}\n\nHint: Pick another port with --port or set ISLE_PORT",
            message
        ),
        other => miette::miette!("{}", other),
    }
}
