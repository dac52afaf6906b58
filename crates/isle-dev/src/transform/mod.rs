//! Module transform cache.
//!
//! Produces the server-side representation of source modules. Ordinary
//! modules pass through untouched. Modules starting with the boundary
//! directive are scanned for exports, copied without the directive, loaded
//! through the [`ModuleLoader`] in raw mode, and have their function exports
//! wrapped as islands.
//!
//! # Concurrency
//!
//! Each path maps to a slot that is either `Pending` or `Ready`. The first
//! request for a path spawns the transform and installs a `Pending` slot
//! holding a `watch` receiver; concurrent requests wait on that receiver
//! instead of starting another transform. A finished transform publishes
//! only if its slot is still the one it installed: an invalidation in the
//! meantime turns the result stale, and waiters retry against a fresh
//! transform. Failures leave the path absent so the next request retries.

mod loader;
mod wrap;

pub use loader::{
    LoadError, LoadMode, LoadedExport, LoadedModule, ModuleLoader, ModuleSpecifier,
    SourceScanLoader, RAW_QUERY,
};
pub use wrap::{
    island_name, raw_copy_path, IslandHandle, WrappedExport, RAW_COPY_TAG, SERVER_RUNTIME,
};

use crate::error::TransformError;
use crate::exports::{self, ExportedSymbol};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

tokio::task_local! {
    /// Paths being transformed by the current task and its ancestors.
    static TRANSFORM_CHAIN: Vec<PathBuf>;
}

/// A fully transformed module.
#[derive(Debug, Clone)]
pub struct ModuleCacheEntry {
    pub path: PathBuf,
    pub raw_source: String,
    pub is_interactive_boundary: bool,
    pub exported_symbols: Vec<ExportedSymbol>,
    pub wrapped_exports: IndexMap<String, WrappedExport>,
    /// Stripped copy the wrapped exports were loaded from
    pub raw_copy: Option<PathBuf>,
}

/// What a renderer should execute for a module.
#[derive(Debug, Clone, Copy)]
pub enum ModuleOutput<'a> {
    Passthrough(&'a str),
    Wrapped(&'a IndexMap<String, WrappedExport>),
}

impl ModuleCacheEntry {
    fn passthrough(path: &Path, source: String) -> Self {
        Self {
            path: path.to_path_buf(),
            raw_source: source,
            is_interactive_boundary: false,
            exported_symbols: Vec::new(),
            wrapped_exports: IndexMap::new(),
            raw_copy: None,
        }
    }

    pub fn output(&self) -> ModuleOutput<'_> {
        if self.is_interactive_boundary {
            ModuleOutput::Wrapped(&self.wrapped_exports)
        } else {
            ModuleOutput::Passthrough(&self.raw_source)
        }
    }

    /// JavaScript source a server runtime should evaluate for this module.
    pub fn server_source(&self) -> String {
        match (&self.raw_copy, self.output()) {
            (Some(raw_copy), ModuleOutput::Wrapped(wrapped)) => wrap::server_source(raw_copy, wrapped),
            _ => self.raw_source.clone(),
        }
    }

    pub fn islands(&self) -> impl Iterator<Item = &IslandHandle> {
        self.wrapped_exports.values().filter_map(|w| match w {
            WrappedExport::Island(handle) => Some(handle),
            WrappedExport::Value => None,
        })
    }
}

/// Observable state of a path in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Untransformed,
    Pending,
    Ready,
}

#[derive(Debug, Clone)]
enum Settled {
    Ready(Arc<ModuleCacheEntry>),
    Failed(TransformError),
    /// Invalidated while in flight; waiters should retry
    Superseded,
}

enum Slot {
    Pending {
        ticket: u64,
        rx: watch::Receiver<Option<Settled>>,
    },
    Ready(Arc<ModuleCacheEntry>),
}

#[derive(Default)]
struct CacheState {
    slots: HashMap<PathBuf, Slot>,
    next_ticket: u64,
    raw_copies: HashSet<PathBuf>,
}

struct Inner {
    loader: Arc<dyn ModuleLoader>,
    state: Mutex<CacheState>,
    transforms: AtomicU64,
}

/// Cache of transformed modules keyed by absolute path.
#[derive(Clone)]
pub struct ModuleTransformCache {
    inner: Arc<Inner>,
}

impl ModuleTransformCache {
    pub fn new(loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            inner: Arc::new(Inner {
                loader,
                state: Mutex::new(CacheState::default()),
                transforms: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the transformed module at `path`, transforming it if needed.
    pub async fn load(&self, path: &Path) -> Result<Arc<ModuleCacheEntry>, TransformError> {
        let chain = TRANSFORM_CHAIN.try_with(|c| c.clone()).unwrap_or_default();
        if chain.iter().any(|p| p == path) {
            return Err(TransformError::Cycle(path.to_path_buf()));
        }

        loop {
            let (ticket, mut rx) = {
                let mut state = self.inner.state.lock();
                match state.slots.get(path) {
                    Some(Slot::Ready(entry)) => return Ok(Arc::clone(entry)),
                    Some(Slot::Pending { ticket, rx }) => (*ticket, rx.clone()),
                    None => {
                        state.next_ticket += 1;
                        let ticket = state.next_ticket;
                        let (tx, rx) = watch::channel(None);
                        state.slots.insert(
                            path.to_path_buf(),
                            Slot::Pending {
                                ticket,
                                rx: rx.clone(),
                            },
                        );
                        self.inner.transforms.fetch_add(1, Ordering::Relaxed);

                        let mut child_chain = chain.clone();
                        child_chain.push(path.to_path_buf());
                        tokio::spawn(TRANSFORM_CHAIN.scope(
                            child_chain,
                            run_transform(Arc::clone(&self.inner), path.to_path_buf(), ticket, tx),
                        ));
                        (ticket, rx)
                    }
                }
            };

            let settled = match rx.wait_for(Option::is_some).await {
                Ok(value) => value.clone(),
                Err(_) => {
                    // The transform task went away without reporting.
                    self.remove_if_ticket(path, ticket);
                    return Err(TransformError::Abandoned(path.to_path_buf()));
                }
            };

            match settled {
                Some(Settled::Ready(entry)) => return Ok(entry),
                Some(Settled::Failed(err)) => return Err(err),
                Some(Settled::Superseded) | None => {
                    tracing::trace!(path = %path.display(), "transform superseded, retrying");
                }
            }
        }
    }

    /// Loads a module by specifier.
    ///
    /// Raw specifiers go straight to the loader and never enter the island
    /// transform.
    pub async fn load_specifier(
        &self,
        specifier: &ModuleSpecifier,
    ) -> Result<LoadedModule, TransformError> {
        match specifier.mode {
            LoadMode::Raw => self.inner.loader.load(specifier).await.map_err(|e| {
                TransformError::Load {
                    path: specifier.path.clone(),
                    message: e.message,
                }
            }),
            LoadMode::Transform => {
                let entry = self.load(&specifier.path).await?;
                let exports = if entry.is_interactive_boundary {
                    entry
                        .wrapped_exports
                        .iter()
                        .map(|(name, wrapped)| LoadedExport {
                            name: name.clone(),
                            is_default: name == "default",
                            is_function: matches!(wrapped, WrappedExport::Island(_)),
                        })
                        .collect()
                } else {
                    exports::scan_exports(&entry.raw_source)
                        .into_iter()
                        .map(|s| LoadedExport {
                            name: s.name,
                            is_default: s.is_default,
                            is_function: s.is_function_like,
                        })
                        .collect()
                };
                Ok(LoadedModule {
                    specifier: specifier.clone(),
                    exports,
                })
            }
        }
    }

    /// Drops the entry for `path`. Returns whether anything was removed.
    ///
    /// An in-flight transform for `path` becomes stale; its result and its
    /// stripped copy are discarded when it completes. A transformed entry's
    /// stripped copy is deleted right away.
    pub async fn invalidate(&self, path: &Path) -> bool {
        let removed = self.inner.state.lock().slots.remove(path);
        let Some(slot) = removed else {
            return false;
        };
        tracing::debug!(path = %path.display(), "invalidated module");
        remove_copies(&self.inner, slot_copy(slot).into_iter().collect()).await;
        true
    }

    /// Drops every entry, including in-flight ones. Returns how many.
    pub async fn invalidate_all(&self) -> usize {
        let slots: Vec<Slot> = {
            let mut state = self.inner.state.lock();
            state.slots.drain().map(|(_, slot)| slot).collect()
        };
        let count = slots.len();
        tracing::debug!(count, "invalidated all modules");
        remove_copies(&self.inner, slots.into_iter().filter_map(slot_copy).collect()).await;
        count
    }

    pub fn state(&self, path: &Path) -> EntryState {
        match self.inner.state.lock().slots.get(path) {
            None => EntryState::Untransformed,
            Some(Slot::Pending { .. }) => EntryState::Pending,
            Some(Slot::Ready(_)) => EntryState::Ready,
        }
    }

    /// Number of cached or in-flight modules.
    pub fn len(&self) -> usize {
        self.inner.state.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total transforms started since creation.
    pub fn transform_count(&self) -> u64 {
        self.inner.transforms.load(Ordering::Relaxed)
    }

    /// Deletes every stripped copy written so far.
    pub async fn cleanup(&self) {
        let copies: Vec<PathBuf> = self.inner.state.lock().raw_copies.iter().cloned().collect();
        remove_copies(&self.inner, copies).await;
    }

    fn remove_if_ticket(&self, path: &Path, ticket: u64) {
        let mut state = self.inner.state.lock();
        if matches!(state.slots.get(path), Some(Slot::Pending { ticket: t, .. }) if *t == ticket) {
            state.slots.remove(path);
        }
    }
}

/// Stripped copy owned by a transformed slot.
fn slot_copy(slot: Slot) -> Option<PathBuf> {
    match slot {
        Slot::Ready(entry) => entry.raw_copy.clone(),
        // The transform task removes its own copy once it sees it went stale.
        Slot::Pending { .. } => None,
    }
}

/// Deletes those of `copies` still on record.
async fn remove_copies(inner: &Inner, copies: Vec<PathBuf>) {
    let owned: Vec<PathBuf> = {
        let mut state = inner.state.lock();
        copies.into_iter().filter(|copy| state.raw_copies.remove(copy)).collect()
    };
    for copy in owned {
        if let Err(e) = tokio::fs::remove_file(&copy).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("failed to remove {}: {}", copy.display(), e);
            }
        }
    }
}

async fn run_transform(
    inner: Arc<Inner>,
    path: PathBuf,
    ticket: u64,
    tx: watch::Sender<Option<Settled>>,
) {
    let result = transform(&inner, &path, ticket).await;

    let settled = {
        let mut state = inner.state.lock();
        let current = matches!(
            state.slots.get(&path),
            Some(Slot::Pending { ticket: t, .. }) if *t == ticket
        );
        if !current {
            Settled::Superseded
        } else {
            match result {
                Ok(entry) => {
                    let entry = Arc::new(entry);
                    state.slots.insert(path.clone(), Slot::Ready(Arc::clone(&entry)));
                    Settled::Ready(entry)
                }
                Err(err) => {
                    state.slots.remove(&path);
                    Settled::Failed(err)
                }
            }
        }
    };

    match &settled {
        Settled::Ready(entry) => tracing::debug!(
            path = %path.display(),
            boundary = entry.is_interactive_boundary,
            "module transformed"
        ),
        Settled::Failed(err) => tracing::warn!("transform failed: {}", err),
        Settled::Superseded => tracing::debug!(path = %path.display(), "discarding stale transform"),
    }
    if !matches!(settled, Settled::Ready(_)) {
        remove_copies(&inner, vec![raw_copy_path(&path, ticket)]).await;
    }
    tx.send_replace(Some(settled));
}

async fn transform(inner: &Inner, path: &Path, ticket: u64) -> Result<ModuleCacheEntry, TransformError> {
    let source = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| TransformError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    if !exports::is_boundary(&source) {
        return Ok(ModuleCacheEntry::passthrough(path, source));
    }

    let exported_symbols = exports::scan_exports(&source);

    let raw_copy = raw_copy_path(path, ticket);
    tokio::fs::write(&raw_copy, exports::strip_boundary_marker(&source))
        .await
        .map_err(|e| TransformError::Write {
            path: raw_copy.clone(),
            message: e.to_string(),
        })?;
    inner.state.lock().raw_copies.insert(raw_copy.clone());

    let loaded = inner
        .loader
        .load(&ModuleSpecifier::raw(&raw_copy))
        .await
        .map_err(|e| TransformError::Load {
            path: path.to_path_buf(),
            message: e.message,
        })?;

    let wrapped_exports = wrap::wrap_exports(path, &loaded.exports);

    Ok(ModuleCacheEntry {
        path: path.to_path_buf(),
        raw_source: source,
        is_interactive_boundary: true,
        exported_symbols,
        wrapped_exports,
        raw_copy: Some(raw_copy),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    /// Loader that counts calls and can be held at a gate.
    struct GatedLoader {
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl ModuleLoader for GatedLoader {
        async fn load(&self, specifier: &ModuleSpecifier) -> Result<LoadedModule, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            SourceScanLoader.load(specifier).await
        }
    }

    fn gated(gate: Option<Arc<Notify>>) -> Arc<GatedLoader> {
        Arc::new(GatedLoader {
            calls: AtomicUsize::new(0),
            gate,
        })
    }

    fn write(dir: &TempDir, name: &str, source: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, source).unwrap();
        path
    }

    const COUNTER: &str = "\"use client\";\nexport function Counter() {}\nexport const start = 0;\n";

    #[tokio::test]
    async fn test_non_boundary_passes_through() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "utils.ts", "export const add = (a, b) => a + b;\n");
        let loader = gated(None);
        let cache = ModuleTransformCache::new(loader.clone());

        let entry = cache.load(&path).await.unwrap();
        assert!(!entry.is_interactive_boundary);
        assert!(matches!(entry.output(), ModuleOutput::Passthrough(s) if s.contains("add")));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 0);
        assert_eq!(cache.state(&path), EntryState::Ready);
    }

    #[tokio::test]
    async fn test_boundary_module_is_wrapped() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "Counter.tsx", COUNTER);
        let cache = ModuleTransformCache::new(gated(None));

        let entry = cache.load(&path).await.unwrap();
        assert!(entry.is_interactive_boundary);
        assert_eq!(entry.exported_symbols.len(), 2);
        assert!(matches!(entry.wrapped_exports["Counter"], WrappedExport::Island(_)));
        assert_eq!(entry.wrapped_exports["start"], WrappedExport::Value);

        let raw_copy = entry.raw_copy.clone().unwrap();
        let stripped = std::fs::read_to_string(&raw_copy).unwrap();
        assert!(!exports::is_boundary(&stripped));
        assert!(entry.server_source().contains("registerIsland"));

        cache.cleanup().await;
        assert!(!raw_copy.exists());
    }

    #[tokio::test]
    async fn test_concurrent_loads_share_one_transform() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "Counter.tsx", COUNTER);
        let gate = Arc::new(Notify::new());
        let loader = gated(Some(gate.clone()));
        let cache = ModuleTransformCache::new(loader.clone());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let path = path.clone();
            handles.push(tokio::spawn(async move { cache.load(&path).await }));
        }
        while loader.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(cache.state(&path), EntryState::Pending);
        gate.notify_one();

        let mut entries = Vec::new();
        for handle in handles {
            entries.push(handle.await.unwrap().unwrap());
        }
        assert!(entries.iter().all(|e| Arc::ptr_eq(e, &entries[0])));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.transform_count(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_removes_once_and_retransforms_once() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "Counter.tsx", COUNTER);
        let cache = ModuleTransformCache::new(gated(None));

        cache.load(&path).await.unwrap();
        assert!(cache.invalidate(&path).await);
        assert!(!cache.invalidate(&path).await);
        assert_eq!(cache.state(&path), EntryState::Untransformed);

        let (a, b) = tokio::join!(cache.load(&path), cache.load(&path));
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(cache.transform_count(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_deletes_raw_copy() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "Counter.tsx", COUNTER);
        let cache = ModuleTransformCache::new(gated(None));

        let first = cache.load(&path).await.unwrap().raw_copy.clone().unwrap();
        assert!(first.exists());
        assert!(cache.invalidate(&path).await);
        assert!(!first.exists());

        let second = cache.load(&path).await.unwrap().raw_copy.clone().unwrap();
        assert_ne!(first, second);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(cache.invalidate_all().await, 1);
        assert!(!second.exists());
    }

    /// Loader that records the source of every raw copy it is handed and
    /// holds only its first call at a gate.
    struct RecordingLoader {
        seen: parking_lot::Mutex<Vec<String>>,
        gate: Notify,
    }

    #[async_trait]
    impl ModuleLoader for RecordingLoader {
        async fn load(&self, specifier: &ModuleSpecifier) -> Result<LoadedModule, LoadError> {
            let source = tokio::fs::read_to_string(&specifier.path).await.unwrap();
            let first = {
                let mut seen = self.seen.lock();
                seen.push(source);
                seen.len() == 1
            };
            if first {
                self.gate.notified().await;
            }
            SourceScanLoader.load(specifier).await
        }
    }

    #[tokio::test]
    async fn test_stale_transform_cannot_clobber_fresh_raw_copy() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "Counter.tsx", COUNTER);
        let loader = Arc::new(RecordingLoader {
            seen: parking_lot::Mutex::new(Vec::new()),
            gate: Notify::new(),
        });
        let cache = ModuleTransformCache::new(loader.clone());

        let stale = {
            let cache = cache.clone();
            let path = path.clone();
            tokio::spawn(async move { cache.load(&path).await })
        };
        while loader.seen.lock().is_empty() {
            tokio::task::yield_now().await;
        }

        std::fs::write(&path, "\"use client\";\nexport function Renamed() {}\n").unwrap();
        assert!(cache.invalidate(&path).await);
        let fresh = cache.load(&path).await.unwrap();
        let fresh_copy = fresh.raw_copy.clone().unwrap();

        // Let the old transform finish; its waiter retries onto the fresh entry.
        loader.gate.notify_one();
        let retried = stale.await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&retried, &fresh));

        let seen = loader.seen.lock().clone();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].contains("Counter"));
        assert!(seen[1].contains("Renamed") && !seen[1].contains("Counter"));

        assert!(fresh.wrapped_exports.contains_key("Renamed"));
        assert!(!fresh.wrapped_exports.contains_key("Counter"));
        let on_disk = std::fs::read_to_string(&fresh_copy).unwrap();
        assert!(on_disk.contains("Renamed"));
        assert!(fresh.server_source().contains(&*fresh_copy.to_string_lossy()));

        let stale_copy = raw_copy_path(&path, 1);
        assert_ne!(stale_copy, fresh_copy);
        assert!(!stale_copy.exists());
    }

    #[tokio::test]
    async fn test_invalidate_all_discards_in_flight_result() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "Counter.tsx", COUNTER);
        let gate = Arc::new(Notify::new());
        let loader = gated(Some(gate.clone()));
        let cache = ModuleTransformCache::new(loader.clone());

        let waiter = {
            let cache = cache.clone();
            let path = path.clone();
            tokio::spawn(async move { cache.load(&path).await })
        };
        while loader.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        // Structural change while the first transform is still running
        std::fs::write(&path, "\"use client\";\nexport function Renamed() {}\n").unwrap();
        assert_eq!(cache.invalidate_all().await, 1);
        gate.notify_one();
        // Let the stale transform finish, then release the retry.
        while loader.calls.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
        gate.notify_one();

        let entry = waiter.await.unwrap().unwrap();
        assert!(entry.wrapped_exports.contains_key("Renamed"));
        assert!(!entry.wrapped_exports.contains_key("Counter"));
        assert_eq!(cache.transform_count(), 2);
    }

    #[tokio::test]
    async fn test_failure_leaves_entry_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.tsx");
        let cache = ModuleTransformCache::new(gated(None));

        let err = cache.load(&path).await.unwrap_err();
        assert!(matches!(err, TransformError::Read { .. }));
        assert_eq!(cache.state(&path), EntryState::Untransformed);

        std::fs::write(&path, COUNTER).unwrap();
        assert!(cache.load(&path).await.is_ok());
    }

    /// Loader that routes the raw load back through the cache in
    /// transform mode, which must be detected instead of deadlocking.
    struct ReentrantLoader {
        cache: parking_lot::Mutex<Option<ModuleTransformCache>>,
        original: PathBuf,
    }

    #[async_trait]
    impl ModuleLoader for ReentrantLoader {
        async fn load(&self, _specifier: &ModuleSpecifier) -> Result<LoadedModule, LoadError> {
            let cache = self.cache.lock().clone().unwrap();
            cache
                .load(&self.original)
                .await
                .map(|_| unreachable!())
                .map_err(|e| LoadError::new(e.to_string()))
        }
    }

    #[tokio::test]
    async fn test_reentrant_load_is_a_cycle_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "Counter.tsx", COUNTER);
        let loader = Arc::new(ReentrantLoader {
            cache: parking_lot::Mutex::new(None),
            original: path.clone(),
        });
        let cache = ModuleTransformCache::new(loader.clone());
        *loader.cache.lock() = Some(cache.clone());

        let err = cache.load(&path).await.unwrap_err();
        assert!(err.to_string().contains("imports itself"));
    }

    #[tokio::test]
    async fn test_raw_specifier_bypasses_transform() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "Counter.isle-raw.tsx", "export function Counter() {}\n");
        let cache = ModuleTransformCache::new(gated(None));

        let module = cache.load_specifier(&ModuleSpecifier::raw(&path)).await.unwrap();
        assert_eq!(module.exports.len(), 1);
        assert_eq!(cache.transform_count(), 0);
        assert!(cache.is_empty());
    }
}
