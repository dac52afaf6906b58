//! Options for the development pipeline.
//!
//! The CLI resolves its layered configuration into this plain struct; the
//! library itself never reads files or environment variables.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// URL prefix under which client bundle artifacts are served.
pub const BUNDLE_PREFIX: &str = "/_isle/";

/// URL prefix reserved for dev server internals (scripts, events, status).
pub const INTERNAL_PREFIX: &str = "/__isle/";

/// Config files whose change affects the whole application.
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "isle.config.toml",
    "isle.config.json",
    "package.json",
    "tsconfig.json",
];

/// Resolved options for a dev pipeline rooted at one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DevOptions {
    /// Absolute project root
    pub root: PathBuf,

    /// Route modules, relative to `root`
    pub routes_dir: PathBuf,

    /// Interactive components, relative to `root`
    pub components_dir: PathBuf,

    /// Optional user client entry, relative to `root`
    pub client_entry: Option<PathBuf>,

    /// Scratch directory for generated files, relative to `root`
    pub work_dir: PathBuf,

    /// Quiet period before a burst of file events is classified
    pub debounce_ms: u64,

    /// Import prefix aliases, e.g. `"~/"` -> project root
    pub aliases: IndexMap<String, PathBuf>,

    /// Root-level files treated as application config
    pub config_files: Vec<String>,

    /// Patterns ignored by the file watcher
    pub watch_ignore: Vec<String>,

    /// Per-session buffer of undelivered update messages
    pub session_buffer: usize,
}

impl Default for DevOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            routes_dir: PathBuf::from("app/routes"),
            components_dir: PathBuf::from("app/components"),
            client_entry: None,
            work_dir: PathBuf::from(".isle/dev"),
            debounce_ms: 200,
            aliases: IndexMap::new(),
            config_files: DEFAULT_CONFIG_FILES.iter().map(|s| s.to_string()).collect(),
            watch_ignore: vec![
                "node_modules".to_string(),
                "dist".to_string(),
                "target".to_string(),
                "*.log".to_string(),
            ],
            session_buffer: 64,
        }
    }
}

impl DevOptions {
    /// Options for `root` with every other field defaulted.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn routes_path(&self) -> PathBuf {
        self.root.join(&self.routes_dir)
    }

    pub fn components_path(&self) -> PathBuf {
        self.root.join(&self.components_dir)
    }

    pub fn work_path(&self) -> PathBuf {
        self.root.join(&self.work_dir)
    }

    pub fn client_entry_path(&self) -> Option<PathBuf> {
        self.client_entry.as_ref().map(|p| self.root.join(p))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Aliases with the implicit `~/` project-root alias filled in and
    /// relative targets anchored at the root.
    pub fn resolved_aliases(&self) -> Vec<(String, PathBuf)> {
        let mut out: Vec<(String, PathBuf)> = self
            .aliases
            .iter()
            .map(|(prefix, target)| (prefix.clone(), self.absolutize(target)))
            .collect();
        if !self.aliases.contains_key("~/") {
            out.push(("~/".to_string(), self.root.clone()));
        }
        // Longest prefix first so "~/lib/" wins over "~/".
        out.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        out
    }

    fn absolutize(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Project-relative URL form of `path` (leading slash, forward slashes).
    pub fn display_path(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        let joined = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("/{}", joined.trim_start_matches('/'))
    }
}
