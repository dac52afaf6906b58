//! Status message functions for terminal output.

use owo_colors::OwoColorize;

/// Print a success message to stderr.
pub fn success(message: &str) {
    eprintln!("{} {}", "✓".green().bold(), message);
}

/// Print an info message to stderr.
pub fn info(message: &str) {
    eprintln!("{} {}", "ℹ".blue().bold(), message);
}

/// Print a warning message to stderr.
pub fn warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message.yellow());
}

/// Print an error message to stderr.
pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message.red());
}

/// Print a debug message to stderr (only if RUST_LOG is set).
pub fn debug(message: &str) {
    if std::env::var("RUST_LOG").is_ok() {
        eprintln!("{} {}", "•".dimmed(), message.dimmed());
    }
}

/// Print the startup banner with the server URL.
pub fn banner(url: &str, root: &str) {
    eprintln!();
    eprintln!("  {} {}", "isle".cyan().bold(), "dev".dimmed());
    eprintln!();
    eprintln!("  {} {}", "➜ Local:".bold(), url.cyan().underline());
    eprintln!("  {} {}", "➜ Root: ".bold(), root.dimmed());
    eprintln!();
}

/// Print the keyboard shortcut legend.
pub fn shortcuts() {
    eprintln!(
        "  {} {} reload routes  {} clear  {} quit",
        "press".dimmed(),
        "r".bold(),
        "c".bold(),
        "q".bold()
    );
    eprintln!();
}
