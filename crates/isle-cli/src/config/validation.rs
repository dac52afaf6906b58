use crate::config::IsleConfig;
use crate::error::ConfigError;
use std::path::Path;

/// Longest accepted debounce window.
const MAX_DEBOUNCE_MS: u64 = 10_000;

/// Check a merged configuration for values the dev server cannot use.
pub fn validate(config: &IsleConfig) -> Result<(), ConfigError> {
    if config.port == 0 {
        return Err(invalid("port", "0", "Use a port between 1 and 65535"));
    }

    if config.host.trim().is_empty() {
        return Err(invalid("host", "\"\"", "Use an address such as 127.0.0.1 or 0.0.0.0"));
    }

    if config.debounce_ms > MAX_DEBOUNCE_MS {
        return Err(invalid(
            "debounce_ms",
            &config.debounce_ms.to_string(),
            &format!("Use at most {} milliseconds", MAX_DEBOUNCE_MS),
        ));
    }

    for (field, dir) in [
        ("routes_dir", &config.routes_dir),
        ("components_dir", &config.components_dir),
        ("public_dir", &config.public_dir),
    ] {
        check_relative(field, dir)?;
    }
    if let Some(entry) = &config.client_entry {
        check_relative("client_entry", entry)?;
    }

    for prefix in config.aliases.keys() {
        if prefix.is_empty() {
            return Err(invalid("aliases", "\"\"", "Alias prefixes must not be empty"));
        }
    }

    Ok(())
}

fn check_relative(field: &str, path: &Path) -> Result<(), ConfigError> {
    if path.is_absolute() {
        return Err(invalid(
            field,
            &path.display().to_string(),
            "Use a path relative to the project root",
        ));
    }
    Ok(())
}

fn invalid(field: &str, value: &str, hint: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        hint: hint.to_string(),
    }
}
