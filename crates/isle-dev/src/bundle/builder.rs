//! Client bundle rebuilds.

use super::artifacts::{ArtifactStore, BundleArtifactSet};
use super::bundler::{BundleRequest, Bundler};
use super::entry::{self, UserEntry, ENTRY_FILE_NAME};
use super::scan::{scan_islands, IslandExport};
use crate::error::BundleError;
use crate::options::DevOptions;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Client entry files picked up when none is configured.
const CLIENT_ENTRY_CANDIDATES: &[&str] = &["app/client.ts", "app/client.tsx", "app/client.js", "app/client.jsx"];

/// Result of a successful rebuild.
#[derive(Debug, Clone)]
pub struct RebuildOutcome {
    pub version: u64,
    pub islands: Vec<IslandExport>,
    pub files: usize,
    pub duration: Duration,
}

/// Scans islands, writes the virtual entry and bundles it.
///
/// The artifact store is only touched after the bundler reports success
/// with at least one output, so a failed rebuild keeps the previous set
/// serving.
pub struct BundleBuilder {
    options: Arc<DevOptions>,
    bundler: Arc<dyn Bundler>,
    store: Arc<ArtifactStore>,
    islands: RwLock<Vec<IslandExport>>,
}

impl BundleBuilder {
    pub fn new(options: Arc<DevOptions>, bundler: Arc<dyn Bundler>, store: Arc<ArtifactStore>) -> Self {
        Self {
            options,
            bundler,
            store,
            islands: RwLock::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    pub fn options(&self) -> &DevOptions {
        &self.options
    }

    /// Islands discovered by the most recent rebuild, successful or not.
    pub fn islands(&self) -> Vec<IslandExport> {
        self.islands.read().clone()
    }

    pub fn entry_path(&self) -> PathBuf {
        self.options.work_path().join(ENTRY_FILE_NAME)
    }

    async fn client_entry(&self) -> Option<PathBuf> {
        if let Some(path) = self.options.client_entry_path() {
            return Some(path);
        }
        for candidate in CLIENT_ENTRY_CANDIDATES {
            let path = self.options.root.join(candidate);
            if is_file(&path).await {
                return Some(path);
            }
        }
        None
    }

    pub async fn rebuild(&self) -> Result<RebuildOutcome, BundleError> {
        let started = Instant::now();

        let components = self.options.components_path();
        let islands = tokio::task::spawn_blocking(move || scan_islands(&components))
            .await
            .map_err(|e| BundleError::Io(std::io::Error::other(e)))?;
        tracing::debug!(count = islands.len(), "discovered islands");
        *self.islands.write() = islands.clone();

        let source = self.synthesize_entry(&islands).await?;
        let entry_path = self.entry_path();
        if let Some(dir) = entry_path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&entry_path, source).await?;

        let request = BundleRequest::dev(entry_path, self.options.root.clone());
        let result = self.bundler.bundle(&request).await;

        if !result.success {
            for diagnostic in &result.diagnostics {
                tracing::error!("{}", diagnostic);
            }
            return Err(BundleError::Failed {
                diagnostics: result.diagnostics,
            });
        }
        if result.outputs.is_empty() {
            return Err(BundleError::EmptyOutput);
        }

        let version = self.store.version() + 1;
        let set = BundleArtifactSet::from_outputs(version, result.outputs);
        let files = set.len();
        self.store.replace(set);

        Ok(RebuildOutcome {
            version,
            islands,
            files,
            duration: started.elapsed(),
        })
    }

    async fn synthesize_entry(&self, islands: &[IslandExport]) -> Result<String, BundleError> {
        let aliases = self.options.resolved_aliases();
        let Some(path) = self.client_entry().await else {
            return Ok(entry::synthesize(islands, None, &aliases));
        };

        match tokio::fs::read_to_string(&path).await {
            Ok(source) => Ok(entry::synthesize(
                islands,
                Some(UserEntry {
                    path: &path,
                    source: &source,
                }),
                &aliases,
            )),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("client entry {} not found, using default bootstrap", self::display(&path));
                Ok(entry::synthesize(islands, None, &aliases))
            }
            Err(e) => Err(e.into()),
        }
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file())
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
