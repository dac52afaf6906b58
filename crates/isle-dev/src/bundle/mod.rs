//! Client bundle builder.
//!
//! Discovers islands, synthesizes the virtual client entry, bundles it and
//! swaps the resulting artifact set in atomically. Rebuilds are serialized
//! and coalesced by [`RebuildScheduler`].

pub mod artifacts;
pub mod builder;
pub mod bundler;
pub mod entry;
pub mod scan;
pub mod scheduler;

pub use artifacts::{content_type_for, Artifact, ArtifactStore, BundleArtifactSet};
pub use builder::{BundleBuilder, RebuildOutcome};
pub use bundler::{
    BundleOutputFile, BundleRequest, BundleResult, BundleTarget, Bundler, RolldownBundler, SourceMapMode,
};
pub use entry::{rewrite_imports, synthesize, UserEntry, CLIENT_RUNTIME, DEFAULT_BOOTSTRAP, ENTRY_FILE_NAME};
pub use scan::{scan_islands, IslandExport};
pub use scheduler::{BuildStatus, RebuildScheduler, RebuildTrigger};
