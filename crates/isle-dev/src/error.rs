//! Error types for the development pipeline.
//!
//! Each subsystem has its own error enum so callers can decide how far a
//! failure propagates. Transform and bundle failures never stop the server:
//! they are logged, broadcast to browsers, and retried on the next change.
//! Only [`DevError`] values returned from startup paths are fatal.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error for starting and running the dev pipeline.
#[derive(Debug, Error)]
pub enum DevError {
    /// The project root does not exist or is not a directory
    #[error("Project root not found: {}", .0.display())]
    RootNotFound(PathBuf),

    /// File watcher could not be created or attached
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// Server could not bind or terminated abnormally
    #[error("Server error: {0}")]
    Server(String),

    /// I/O errors from file system operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// Result type alias using `DevError` as the default error type.
pub type Result<T, E = DevError> = std::result::Result<T, E>;

/// Failure while producing the server-side representation of a module.
///
/// `Clone` because a single failed transform is reported to every request
/// that was waiting on it.
#[derive(Debug, Clone, Error)]
pub enum TransformError {
    /// Source could not be read
    #[error("Failed to read {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },

    /// Stripped raw copy could not be written
    #[error("Failed to write {}: {message}", .path.display())]
    Write { path: PathBuf, message: String },

    /// The module loader rejected the stripped module
    #[error("Failed to load {}: {message}", .path.display())]
    Load { path: PathBuf, message: String },

    /// The loader re-entered the cache for the module being transformed
    #[error("Module {} imports itself through the transform cache", .0.display())]
    Cycle(PathBuf),

    /// The transform task ended without publishing a result
    #[error("Transform of {} was abandoned", .0.display())]
    Abandoned(PathBuf),
}

impl TransformError {
    /// Path of the module the error refers to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            TransformError::Read { path, .. }
            | TransformError::Write { path, .. }
            | TransformError::Load { path, .. } => path,
            TransformError::Cycle(path) | TransformError::Abandoned(path) => path,
        }
    }
}

/// Failure of a client bundle rebuild.
#[derive(Debug, Error)]
pub enum BundleError {
    /// The bundler reported diagnostics
    #[error("Bundling failed:\n{}", .diagnostics.join("\n"))]
    Failed { diagnostics: Vec<String> },

    /// The bundler succeeded but produced nothing to serve
    #[error("Bundler produced no output files")]
    EmptyOutput,

    /// Writing the virtual entry or reading sources failed
    #[error("I/O error during bundling: {0}")]
    Io(#[from] std::io::Error),
}

/// Error raised by a renderer while producing a response.
///
/// Surfaces to the browser as a runtime error event and to the HTTP client
/// as an error page.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RenderError {
    pub message: String,
    pub stack: Option<String>,
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

impl From<TransformError> for RenderError {
    fn from(err: TransformError) -> Self {
        RenderError::new(err.to_string())
    }
}
