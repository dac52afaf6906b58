//! Client bundle artifacts and their atomically swapped store.

use super::bundler::BundleOutputFile;
use axum::body::Bytes;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// A single served artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub bytes: Bytes,
    pub content_type: &'static str,
}

/// One complete, internally consistent bundle version.
///
/// Immutable once built; a rebuild produces a whole new set.
#[derive(Debug, Clone, Default)]
pub struct BundleArtifactSet {
    version: u64,
    entry: Option<String>,
    files: BTreeMap<String, Artifact>,
}

impl BundleArtifactSet {
    /// The set served before the first successful build.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_outputs(version: u64, outputs: Vec<BundleOutputFile>) -> Self {
        let mut entry = None;
        let mut files = BTreeMap::new();
        for output in outputs {
            let path = output.path.trim_start_matches('/').replace('\\', "/");
            if output.is_entry && entry.is_none() {
                entry = Some(path.clone());
            }
            files.insert(
                path.clone(),
                Artifact {
                    content_type: content_type_for(&path),
                    bytes: Bytes::from(output.content),
                },
            );
        }
        Self {
            version,
            entry,
            files,
        }
    }

    /// Looks up an artifact by its path relative to the bundle prefix.
    pub fn get(&self, path: &str) -> Option<&Artifact> {
        self.files.get(path.trim_start_matches('/'))
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Relative path of the entry script, if the bundler marked one.
    pub fn entry(&self) -> Option<&str> {
        self.entry.as_deref()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Holder of the current artifact set.
///
/// Readers take an `Arc` snapshot and keep serving from it even if a newer
/// set is published meanwhile, so a request never sees a mix of versions.
#[derive(Debug)]
pub struct ArtifactStore {
    current: RwLock<Arc<BundleArtifactSet>>,
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(BundleArtifactSet::empty())),
        }
    }

    pub fn snapshot(&self) -> Arc<BundleArtifactSet> {
        Arc::clone(&*self.current.read())
    }

    /// Publishes `set`, returning the one it replaced.
    pub fn replace(&self, set: BundleArtifactSet) -> Arc<BundleArtifactSet> {
        std::mem::replace(&mut *self.current.write(), Arc::new(set))
    }

    pub fn version(&self) -> u64 {
        self.current.read().version()
    }
}

/// Determine content type from file extension.
pub fn content_type_for(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");

    match extension {
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "css" => "text/css; charset=utf-8",
        "html" => "text/html; charset=utf-8",
        "wasm" => "application/wasm",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
