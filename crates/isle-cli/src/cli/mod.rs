//! Command-line interface definition for isle.
//!
//! # Command Structure
//!
//! - `isle dev` - Development server with island hot reload

mod commands;

use clap::Parser;

pub use commands::{Command, DevArgs};

/// Isle - island-based web development
#[derive(Parser, Debug)]
#[command(
    name = "isle",
    version,
    about = "Development server for island-based web applications",
    long_about = "Isle serves server-rendered pages with interactive islands.\n\
                  The dev server rebuilds the client bundle on change and pushes\n\
                  reloads, module updates and runtime errors to the browser."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    ///
    /// Outputs plain text without ANSI color codes. Useful for logging to
    /// files or systems that don't support colored terminal output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}
