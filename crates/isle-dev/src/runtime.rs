//! Wiring of the dev pipeline.
//!
//! ```text
//! watcher ─raw─▶ classifier ─ChangeEvent─▶ change loop ─▶ cache / scheduler ─▶ broadcaster
//!                                   ▲
//!                     reload_routes()
//! ```

use crate::bundle::RebuildTrigger;
use crate::classifier::{spawn_classifier, ChangeEvent, ClassifyRules, RawEvent};
use crate::error::{DevError, Result};
use crate::pipeline::RouteTable;
use crate::state::DevState;
use crate::watcher::FileWatcher;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const CHANNEL_CAPACITY: usize = 256;

/// Builder for a running dev pipeline.
pub struct DevRuntime {
    state: DevState,
    route_table: Option<Arc<dyn RouteTable>>,
    watch: bool,
}

impl DevRuntime {
    pub fn new(state: DevState) -> Self {
        Self {
            state,
            route_table: None,
            watch: true,
        }
    }

    /// Route table told about every structural change.
    pub fn with_route_table(mut self, route_table: Arc<dyn RouteTable>) -> Self {
        self.route_table = Some(route_table);
        self
    }

    /// Skips the file system watcher; raw events can still be fed through
    /// [`DevHandle::raw_events`].
    pub fn without_watcher(mut self) -> Self {
        self.watch = false;
        self
    }

    /// Starts the classifier and change loop and requests the initial
    /// rebuild.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the project root is missing or the watcher cannot
    /// be attached.
    pub fn start(self) -> Result<DevHandle> {
        let options = Arc::clone(&self.state.options);
        if !options.root.is_dir() {
            return Err(DevError::RootNotFound(options.root.clone()));
        }

        let (raw_tx, raw_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (change_tx, change_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let watcher = if self.watch {
            Some(FileWatcher::start(
                options.root.clone(),
                options.watch_ignore.clone(),
                raw_tx.clone(),
            )?)
        } else {
            None
        };

        let classifier = spawn_classifier(
            ClassifyRules::from_options(&options),
            options.debounce(),
            raw_rx,
            change_tx.clone(),
        );
        let changes = tokio::spawn(change_loop(self.state.clone(), self.route_table, change_rx));

        tracing::info!(root = %options.root.display(), "dev pipeline started");
        self.state.scheduler.request(RebuildTrigger::Initial);

        Ok(DevHandle {
            state: self.state,
            raw_tx,
            change_tx,
            watcher,
            tasks: vec![classifier, changes],
        })
    }
}

/// Handle to a running dev pipeline.
pub struct DevHandle {
    state: DevState,
    raw_tx: mpsc::Sender<RawEvent>,
    change_tx: mpsc::Sender<ChangeEvent>,
    watcher: Option<FileWatcher>,
    tasks: Vec<JoinHandle<()>>,
}

impl DevHandle {
    pub fn state(&self) -> &DevState {
        &self.state
    }

    /// Sender into the debouncing classifier.
    pub fn raw_events(&self) -> mpsc::Sender<RawEvent> {
        self.raw_tx.clone()
    }

    /// Sender of already classified changes.
    pub fn changes(&self) -> mpsc::Sender<ChangeEvent> {
        self.change_tx.clone()
    }

    /// Treats the project as structurally changed.
    pub async fn reload_routes(&self) {
        if self.change_tx.send(ChangeEvent::manual_reload()).await.is_err() {
            tracing::warn!("change loop is not running, reload ignored");
        }
    }

    /// Stops watching, lets the current rebuild finish and removes generated
    /// raw copies.
    pub async fn shutdown(mut self) {
        self.watcher.take();
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.state.scheduler.wait_idle().await;
        self.state.cache.cleanup().await;
        tracing::info!("dev pipeline stopped");
    }
}

async fn change_loop(
    state: DevState,
    route_table: Option<Arc<dyn RouteTable>>,
    mut rx: mpsc::Receiver<ChangeEvent>,
) {
    while let Some(change) = rx.recv().await {
        apply_change(&state, route_table.as_deref(), change).await;
    }
}

/// Routes one classified change to the cache and the scheduler.
pub async fn apply_change(state: &DevState, route_table: Option<&dyn RouteTable>, change: ChangeEvent) {
    match change {
        ChangeEvent::Structural { path, reason } => {
            match &path {
                Some(path) => tracing::info!(?reason, "structural change: {}", state.options.display_path(path)),
                None => tracing::info!(?reason, "structural change"),
            }
            if let Some(route_table) = route_table {
                route_table.on_structural_change();
            }
            state.cache.invalidate_all().await;
            state.scheduler.request(RebuildTrigger::Structural);
        }
        ChangeEvent::Module { path, kind } => {
            tracing::info!(?kind, "changed: {}", state.options.display_path(&path));
            state.cache.invalidate(&path).await;
            state.scheduler.request(RebuildTrigger::Module(path));
        }
    }
}
