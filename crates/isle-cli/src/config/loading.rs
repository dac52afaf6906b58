use crate::cli::DevArgs;
use crate::config::{validate, IsleConfig, CONFIG_FILE_NAMES, CONFIG_KEYS, ENV_PREFIX};
use crate::error::{ConfigError, Result};
use figment::{
    providers::{Env, Format as _, Json, Serialized, Toml},
    Figment,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Flags given on the command line; unset flags leave lower layers alone.
#[derive(Debug, Default, Serialize)]
struct CliOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    open: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    debounce_ms: Option<u64>,
}

impl From<&DevArgs> for CliOverrides {
    fn from(args: &DevArgs) -> Self {
        Self {
            port: args.port,
            host: args.host.clone(),
            open: args.open.then_some(true),
            debounce_ms: args.debounce_ms,
        }
    }
}

impl IsleConfig {
    /// Load configuration for the project at `root`.
    /// Priority: CLI args > environment variables > config file > defaults
    pub fn load(root: &Path, args: &DevArgs) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));

        let file = Self::config_file(root, args.config.as_deref())?;
        if let Some(path) = &file {
            tracing::debug!("loading config from {}", path.display());
            figment = match path.extension().and_then(|e| e.to_str()) {
                Some("json") => figment.merge(Json::file(path)),
                _ => figment.merge(Toml::file(path)),
            };
        }

        // ISLE_PORT, ISLE_DEBOUNCE_MS, ... Unrelated ISLE_* variables are skipped
        // so they don't trip unknown-field checks.
        figment = figment.merge(
            Env::prefixed(ENV_PREFIX)
                .split("__")
                .filter(|key| is_config_key(key.as_str())),
        );
        figment = figment.merge(Serialized::defaults(CliOverrides::from(args)));

        let mut config: Self = figment
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        config.config_file = file;
        validate(&config)?;
        Ok(config)
    }

    /// The config file to read, if any.
    ///
    /// An explicit `--config` path must exist; otherwise the first of
    /// [`CONFIG_FILE_NAMES`] present in `root` is used.
    fn config_file(root: &Path, explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            let path = if path.is_absolute() {
                path.to_path_buf()
            } else {
                root.join(path)
            };
            if !path.is_file() {
                return Err(ConfigError::NotFound(path).into());
            }
            return Ok(Some(path));
        }

        Ok(CONFIG_FILE_NAMES
            .iter()
            .map(|name| root.join(name))
            .find(|path| path.is_file()))
    }
}

fn is_config_key(key: &str) -> bool {
    let field = key.split('.').next().unwrap_or(key);
    CONFIG_KEYS.iter().any(|known| known.eq_ignore_ascii_case(field))
}
