//! Module loading seam.
//!
//! The transform cache obtains real export values through a [`ModuleLoader`].
//! A specifier carries an explicit [`LoadMode`]: `Raw` loads a stripped copy
//! as-is and must never route back into the island transform, `Transform`
//! is the normal mode used by renderers. The mode travels with the specifier
//! (as a `?isle-raw` query in URL form); no loader state is toggled.

use crate::exports;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Query tag selecting raw passthrough loading.
pub const RAW_QUERY: &str = "isle-raw";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadMode {
    /// Load the file exactly as written
    Raw,
    /// Load through the island transform
    Transform,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleSpecifier {
    pub path: PathBuf,
    pub mode: LoadMode,
}

impl ModuleSpecifier {
    pub fn raw(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: LoadMode::Raw,
        }
    }

    pub fn transform(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: LoadMode::Transform,
        }
    }

    /// Parses the URL form produced by `Display`.
    pub fn parse(specifier: &str) -> Self {
        match specifier.split_once('?') {
            Some((path, query)) if query.split('&').any(|q| q == RAW_QUERY) => Self::raw(path),
            Some((path, _)) => Self::transform(path),
            None => Self::transform(specifier),
        }
    }
}

impl fmt::Display for ModuleSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.path.to_string_lossy().replace('\\', "/");
        match self.mode {
            LoadMode::Raw => write!(f, "{}?{}", path, RAW_QUERY),
            LoadMode::Transform => f.write_str(&path),
        }
    }
}

/// One export value produced by a loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedExport {
    pub name: String,
    pub is_default: bool,
    pub is_function: bool,
}

#[derive(Debug, Clone)]
pub struct LoadedModule {
    pub specifier: ModuleSpecifier,
    pub exports: Vec<LoadedExport>,
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct LoadError {
    pub message: String,
}

impl LoadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Loads modules for server rendering.
#[async_trait]
pub trait ModuleLoader: Send + Sync + 'static {
    async fn load(&self, specifier: &ModuleSpecifier) -> Result<LoadedModule, LoadError>;
}

/// Loader that derives export values from a syntactic scan of the file.
///
/// Used when no JavaScript runtime is attached to the dev server; export
/// function-ness comes from the same scanner the bundle builder uses.
#[derive(Debug, Default, Clone)]
pub struct SourceScanLoader;

impl SourceScanLoader {
    async fn read(path: &Path) -> Result<String, LoadError> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| LoadError::new(format!("cannot read {}: {}", path.display(), e)))
    }
}

#[async_trait]
impl ModuleLoader for SourceScanLoader {
    async fn load(&self, specifier: &ModuleSpecifier) -> Result<LoadedModule, LoadError> {
        let source = Self::read(&specifier.path).await?;
        if specifier.mode == LoadMode::Raw && exports::is_boundary(&source) {
            return Err(LoadError::new(format!(
                "raw copy {} still carries the boundary directive",
                specifier.path.display()
            )));
        }
        let exports = exports::scan_exports(&source)
            .into_iter()
            .map(|symbol| LoadedExport {
                name: symbol.name,
                is_default: symbol.is_default,
                is_function: symbol.is_function_like,
            })
            .collect();
        Ok(LoadedModule {
            specifier: specifier.clone(),
            exports,
        })
    }
}
