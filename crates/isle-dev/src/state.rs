//! Shared state for the development pipeline.
//!
//! One [`DevState`] is built per project and cloned into every task and
//! request handler. Each field is already internally synchronized, so
//! cloning only bumps reference counts.

use crate::broadcast::Broadcaster;
use crate::bundle::{ArtifactStore, BundleBuilder, Bundler, RebuildScheduler, RolldownBundler};
use crate::options::DevOptions;
use crate::transform::{ModuleLoader, ModuleTransformCache, SourceScanLoader};
use std::sync::Arc;

#[derive(Clone)]
pub struct DevState {
    pub options: Arc<DevOptions>,
    pub cache: ModuleTransformCache,
    pub store: Arc<ArtifactStore>,
    pub broadcaster: Arc<Broadcaster>,
    pub scheduler: RebuildScheduler,
}

impl DevState {
    /// State backed by rolldown and the source-scanning module loader.
    pub fn new(options: DevOptions) -> Self {
        Self::with_services(options, Arc::new(SourceScanLoader), Arc::new(RolldownBundler))
    }

    /// State with caller-provided loader and bundler.
    pub fn with_services(
        options: DevOptions,
        loader: Arc<dyn ModuleLoader>,
        bundler: Arc<dyn Bundler>,
    ) -> Self {
        let options = Arc::new(options);
        let store = Arc::new(ArtifactStore::new());
        let broadcaster = Arc::new(Broadcaster::new(options.session_buffer));
        let builder = BundleBuilder::new(Arc::clone(&options), bundler, Arc::clone(&store));
        let scheduler = RebuildScheduler::new(builder, Arc::clone(&broadcaster));

        Self {
            options,
            cache: ModuleTransformCache::new(loader),
            store,
            broadcaster,
            scheduler,
        }
    }
}
