//! Coalescing rebuild scheduler.
//!
//! At most one rebuild runs at a time. Triggers that arrive while a rebuild
//! is in flight only mark the scheduler dirty, and exactly one follow-up
//! rebuild runs once the current one finishes.

use super::builder::BundleBuilder;
use crate::broadcast::{Broadcaster, UpdateEvent};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// Build status tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStatus {
    /// No build has been performed yet
    NotStarted,
    /// Build is currently in progress
    InProgress { started_at: Instant },
    /// Build completed successfully
    Success { duration_ms: u64 },
    /// Build failed with error
    Failed { error: String },
}

impl BuildStatus {
    pub fn is_in_progress(&self) -> bool {
        matches!(self, BuildStatus::InProgress { .. })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BuildStatus::Success { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            BuildStatus::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// Milliseconds the finished build took, or the running one has taken
    /// so far.
    pub fn duration_ms(&self) -> Option<u64> {
        match self {
            BuildStatus::InProgress { started_at } => Some(started_at.elapsed().as_millis() as u64),
            BuildStatus::Success { duration_ms } => Some(*duration_ms),
            BuildStatus::NotStarted | BuildStatus::Failed { .. } => None,
        }
    }

    /// Short label used by the status endpoint.
    pub fn label(&self) -> &'static str {
        match self {
            BuildStatus::NotStarted => "idle",
            BuildStatus::InProgress { .. } => "building",
            BuildStatus::Success { .. } => "ok",
            BuildStatus::Failed { .. } => "failed",
        }
    }
}

/// Why a rebuild was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildTrigger {
    Initial,
    Structural,
    Module(PathBuf),
}

#[derive(Debug, Default)]
struct SchedulerState {
    running: bool,
    dirty: bool,
    reload_pending: bool,
    /// Changed module -> sequence number of its latest change
    pending_updates: HashMap<PathBuf, u64>,
    seq: u64,
}

struct Inner {
    builder: BundleBuilder,
    broadcaster: Arc<Broadcaster>,
    state: Mutex<SchedulerState>,
    status: RwLock<BuildStatus>,
    rebuilds: AtomicU64,
    busy: watch::Sender<bool>,
}

/// Serializes client bundle rebuilds and announces their results.
#[derive(Clone)]
pub struct RebuildScheduler {
    inner: Arc<Inner>,
}

impl RebuildScheduler {
    pub fn new(builder: BundleBuilder, broadcaster: Arc<Broadcaster>) -> Self {
        let (busy, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                builder,
                broadcaster,
                state: Mutex::new(SchedulerState::default()),
                status: RwLock::new(BuildStatus::NotStarted),
                rebuilds: AtomicU64::new(0),
                busy,
            }),
        }
    }

    pub fn builder(&self) -> &BundleBuilder {
        &self.inner.builder
    }

    pub fn status(&self) -> BuildStatus {
        self.inner.status.read().clone()
    }

    /// Number of rebuilds started so far.
    pub fn rebuild_count(&self) -> u64 {
        self.inner.rebuilds.load(Ordering::Relaxed)
    }

    /// Records `trigger` and makes sure a rebuild will run after it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn request(&self, trigger: RebuildTrigger) {
        let spawn = {
            let mut state = self.inner.state.lock();
            match trigger {
                RebuildTrigger::Initial => {}
                RebuildTrigger::Structural => state.reload_pending = true,
                RebuildTrigger::Module(path) => {
                    state.seq += 1;
                    let seq = state.seq;
                    state.pending_updates.insert(path, seq);
                }
            }
            if state.running {
                state.dirty = true;
                false
            } else {
                state.running = true;
                // Flipped under the state lock so it always agrees with `running`.
                self.inner.busy.send_replace(true);
                true
            }
        };

        if spawn {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move { drive(inner).await });
        }
    }

    /// Resolves once no rebuild is running or queued.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.busy.subscribe();
        // The sender lives in `inner`, which `self` keeps alive.
        let _ = rx.wait_for(|busy| !busy).await;
    }

    pub fn is_idle(&self) -> bool {
        !*self.inner.busy.borrow()
    }
}

async fn drive(inner: Arc<Inner>) {
    loop {
        let (updates, reload) = {
            let mut state = inner.state.lock();
            state.dirty = false;
            let updates: Vec<(PathBuf, u64)> = state.pending_updates.drain().collect();
            (updates, std::mem::take(&mut state.reload_pending))
        };

        inner.rebuilds.fetch_add(1, Ordering::Relaxed);
        *inner.status.write() = BuildStatus::InProgress {
            started_at: Instant::now(),
        };

        let result = inner.builder.rebuild().await;

        let succeeded = match &result {
            Ok(outcome) => {
                tracing::info!(
                    version = outcome.version,
                    islands = outcome.islands.len(),
                    files = outcome.files,
                    "client bundle rebuilt in {}ms",
                    outcome.duration.as_millis()
                );
                *inner.status.write() = BuildStatus::Success {
                    duration_ms: outcome.duration.as_millis() as u64,
                };
                true
            }
            Err(e) => {
                tracing::error!("client bundle rebuild failed: {}", e);
                *inner.status.write() = BuildStatus::Failed { error: e.to_string() };
                false
            }
        };

        if reload {
            inner.broadcaster.broadcast(&UpdateEvent::FullReload);
        } else {
            let mut announce = Vec::new();
            {
                let mut state = inner.state.lock();
                for (path, seq) in updates {
                    // A newer change for this path is queued; the follow-up
                    // rebuild announces it.
                    if state.pending_updates.contains_key(&path) {
                        continue;
                    }
                    if succeeded {
                        announce.push(path);
                    } else {
                        state.pending_updates.insert(path, seq);
                    }
                }
            }
            announce.sort();
            for path in announce {
                let display = inner.builder.options().display_path(&path);
                inner.broadcaster.broadcast(&UpdateEvent::ModuleUpdate { path: display });
            }
        }

        let mut state = inner.state.lock();
        if !state.dirty {
            state.running = false;
            inner.busy.send_replace(false);
            return;
        }
    }
}
