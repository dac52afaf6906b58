use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Available isle subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the development server
    ///
    /// Watches the project, transforms interactive components into islands,
    /// rebuilds the client bundle and pushes updates to open browsers.
    Dev(DevArgs),
}

/// Arguments for the dev command
///
/// Every option left unset falls back to environment variables
/// (`ISLE_PORT`, ...), then `isle.config.toml` / `isle.config.json`, then the
/// built-in defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct DevArgs {
    /// Port for the development server
    ///
    /// The next free port is used if this one is taken.
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Host address to bind
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Open browser automatically on server start
    #[arg(long)]
    pub open: bool,

    /// Project root (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Quiet period in milliseconds before file changes are processed
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,

    /// Explicit config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}
