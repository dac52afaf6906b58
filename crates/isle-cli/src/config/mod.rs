//! Configuration for `isle dev` with multi-source loading.
//!
//! Merges settings from CLI args, environment variables, and config files.
//! Priority: CLI > Environment > File > Defaults

mod defaults;
mod loading;
mod tests;
mod validation;

use indexmap::IndexMap;
use isle_dev::DevOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use defaults::*;
pub use validation::validate;

/// Isle configuration, loaded from `isle.config.toml`, `isle.config.json`,
/// `ISLE_*` environment variables and CLI flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IsleConfig {
    /// Preferred dev server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Address the dev server binds to
    #[serde(default = "default_host")]
    pub host: String,

    /// Open the browser once the server is listening
    #[serde(default)]
    pub open: bool,

    /// Quiet period before a burst of file events is processed
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Route pages
    #[serde(default = "default_routes_dir")]
    pub routes_dir: PathBuf,

    /// Interactive components
    #[serde(default = "default_components_dir")]
    pub components_dir: PathBuf,

    /// Static files served as-is
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,

    /// User client entry (defaults to the first `app/client.*` found)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_entry: Option<PathBuf>,

    /// Import prefix aliases, e.g. `"@/" = "app"`
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub aliases: IndexMap<String, PathBuf>,

    /// Extra watcher ignore patterns, added to the built-in ones
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub watch_ignore: Vec<String>,

    /// File the settings were read from, if any
    #[serde(skip)]
    pub config_file: Option<PathBuf>,
}

impl Default for IsleConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            open: false,
            debounce_ms: default_debounce_ms(),
            routes_dir: default_routes_dir(),
            components_dir: default_components_dir(),
            public_dir: default_public_dir(),
            client_entry: None,
            aliases: IndexMap::new(),
            watch_ignore: Vec::new(),
            config_file: None,
        }
    }
}

impl IsleConfig {
    /// Pipeline options for a project rooted at `root`.
    pub fn to_dev_options(&self, root: &Path) -> DevOptions {
        let mut options = DevOptions::new(root);
        options.routes_dir = self.routes_dir.clone();
        options.components_dir = self.components_dir.clone();
        options.client_entry = self.client_entry.clone();
        options.debounce_ms = self.debounce_ms;
        options.aliases = self.aliases.clone();
        options.watch_ignore.extend(self.watch_ignore.iter().cloned());
        // Edits to a custom `--config` file are structural like the default ones.
        if let Some(file) = &self.config_file {
            let file = file.strip_prefix(root).unwrap_or(file).to_string_lossy().into_owned();
            if !options.config_files.contains(&file) {
                options.config_files.push(file);
            }
        }
        options
    }

    /// Absolute public directory for a project rooted at `root`.
    pub fn public_path(&self, root: &Path) -> PathBuf {
        root.join(&self.public_dir)
    }
}
