//! Terminal output for the dev server: status lines, the startup banner and
//! the keyboard shortcut legend.

mod messages;

pub use messages::{banner, debug, error, info, shortcuts, success, warning};

/// Check if running in a CI environment.
pub fn is_ci() -> bool {
    std::env::var("CI").is_ok()
        || std::env::var("GITHUB_ACTIONS").is_ok()
        || std::env::var("GITLAB_CI").is_ok()
        || std::env::var("CIRCLECI").is_ok()
        || std::env::var("TRAVIS").is_ok()
}

/// Check if color output should be enabled.
///
/// Respects NO_COLOR and FORCE_COLOR environment variables, falls back to
/// terminal capability detection.
pub fn should_use_color() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    console::user_attended_stderr()
}

/// Whether the interactive keyboard shortcuts should be offered.
pub fn is_interactive() -> bool {
    !is_ci() && console::user_attended()
}

/// Initialize color support based on environment.
///
/// `owo-colors` already respects NO_COLOR; this only validates the
/// environment once at startup.
pub fn init_colors() {
    let _ = should_use_color();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_is_ci_with_ci_var() {
        unsafe { std::env::set_var("CI", "true") }
        let ci = is_ci();
        unsafe { std::env::remove_var("CI") }
        assert!(ci);
    }

    #[test]
    #[serial]
    fn test_ci_is_never_interactive() {
        unsafe { std::env::set_var("CI", "true") }
        let interactive = is_interactive();
        unsafe { std::env::remove_var("CI") }
        assert!(!interactive);
    }

    #[test]
    #[serial]
    fn test_should_use_color_no_color_overrides_force() {
        unsafe {
            std::env::set_var("NO_COLOR", "1");
            std::env::set_var("FORCE_COLOR", "1");
        }
        let enabled = should_use_color();
        unsafe {
            std::env::remove_var("NO_COLOR");
            std::env::remove_var("FORCE_COLOR");
        }
        assert!(!enabled);
    }
}
