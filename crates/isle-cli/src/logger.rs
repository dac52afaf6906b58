//! Logging setup for the isle CLI.
//!
//! `--verbose` switches the isle crates to debug, `--quiet` limits output to
//! errors, and otherwise `RUST_LOG` is honoured with an info-level fallback.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const VERBOSE_FILTER: &str = "isle=debug,isle_dev=debug,isle_cli=debug";
const QUIET_FILTER: &str = "isle=error,isle_dev=error,isle_cli=error";
const DEFAULT_FILTER: &str = "isle=info,isle_dev=info,isle_cli=info";

/// Initialize the tracing subscriber.
///
/// Call once at startup, before anything logs.
///
/// # Examples
///
/// ```rust,no_run
/// use isle_cli::logger::init_logger;
///
/// // Default logging (INFO level)
/// init_logger(false, false, false);
/// ```
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let filter = if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else if quiet {
        EnvFilter::new(QUIET_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    };

    let fmt_layer = fmt::layer()
        .with_target(false) // Don't show the module path (keeps output clean)
        .with_level(true)
        .with_ansi(!no_color && should_use_colors())
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

/// Check if colored log output should be enabled.
///
/// `NO_COLOR` disables colors, `FORCE_COLOR` forces them, and otherwise the
/// terminal is asked.
pub fn should_use_colors() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    console::Term::stderr().features().colors_supported()
}
