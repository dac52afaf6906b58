//! Change classification.
//!
//! Raw filesystem events are debounced per path and then classified:
//!
//! - [`ChangeEvent::Structural`] when the application's structure may have
//!   changed (a config file, or anything under the routes directory)
//! - [`ChangeEvent::Module`] for every other source file
//!
//! The classifier runs as its own task between the watcher and the runtime.

mod debounce;

pub use debounce::Debouncer;

use crate::options::DevOptions;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

/// Kind of a raw filesystem event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventKind {
    Created,
    Modified,
    Removed,
}

/// A path-level filesystem event, before debouncing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub path: PathBuf,
    pub kind: RawEventKind,
}

impl RawEvent {
    pub fn new(path: impl Into<PathBuf>, kind: RawEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Why a structural change was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralReason {
    /// A config file changed
    Config,
    /// A route module was added, changed or removed
    Route,
    /// Requested by the operator
    Manual,
}

/// A classified, debounced change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// The route set or app config may have changed: full reload
    Structural {
        path: Option<PathBuf>,
        reason: StructuralReason,
    },
    /// A single module body changed
    Module { path: PathBuf, kind: RawEventKind },
}

impl ChangeEvent {
    /// The operator-triggered structural change.
    pub fn manual_reload() -> Self {
        ChangeEvent::Structural {
            path: None,
            reason: StructuralReason::Manual,
        }
    }

    pub fn is_structural(&self) -> bool {
        matches!(self, ChangeEvent::Structural { .. })
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            ChangeEvent::Structural { path, .. } => path.as_deref(),
            ChangeEvent::Module { path, .. } => Some(path),
        }
    }
}

/// Static classification rules for one project.
#[derive(Debug, Clone)]
pub struct ClassifyRules {
    routes_dir: PathBuf,
    config_files: Vec<PathBuf>,
}

impl ClassifyRules {
    pub fn new(routes_dir: PathBuf, config_files: Vec<PathBuf>) -> Self {
        Self {
            routes_dir,
            config_files,
        }
    }

    pub fn from_options(options: &DevOptions) -> Self {
        Self::new(
            options.routes_path(),
            options
                .config_files
                .iter()
                .map(|name| options.root.join(name))
                .collect(),
        )
    }

    pub fn classify(&self, event: RawEvent) -> ChangeEvent {
        if self.config_files.iter().any(|f| f == &event.path) {
            return ChangeEvent::Structural {
                path: Some(event.path),
                reason: StructuralReason::Config,
            };
        }
        if event.path.starts_with(&self.routes_dir) {
            return ChangeEvent::Structural {
                path: Some(event.path),
                reason: StructuralReason::Route,
            };
        }
        ChangeEvent::Module {
            path: event.path,
            kind: event.kind,
        }
    }
}

/// Spawns the debounce/classify loop.
///
/// The task ends when `raw_rx` closes (after flushing pending paths) or when
/// the receiving side of `tx` is dropped.
pub fn spawn_classifier(
    rules: ClassifyRules,
    window: Duration,
    raw_rx: mpsc::Receiver<RawEvent>,
    tx: mpsc::Sender<ChangeEvent>,
) -> JoinHandle<()> {
    tokio::spawn(run_classifier(rules, window, raw_rx, tx))
}

async fn run_classifier(
    rules: ClassifyRules,
    window: Duration,
    mut raw_rx: mpsc::Receiver<RawEvent>,
    tx: mpsc::Sender<ChangeEvent>,
) {
    let mut debouncer = Debouncer::new(window);

    loop {
        let deadline = debouncer.next_deadline();
        tokio::select! {
            received = raw_rx.recv() => match received {
                Some(event) => {
                    tracing::trace!(path = %event.path.display(), kind = ?event.kind, "raw event");
                    debouncer.push(event, Instant::now());
                }
                None => {
                    for event in debouncer.flush() {
                        if tx.send(rules.classify(event)).await.is_err() {
                            return;
                        }
                    }
                    return;
                }
            },
            _ = sleep_until(deadline) => {
                for event in debouncer.drain_due(Instant::now()) {
                    let change = rules.classify(event);
                    tracing::debug!(?change, "classified change");
                    if tx.send(change).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
