//! # isle-dev
//!
//! Development pipeline for isle applications: file changes are debounced
//! and classified, interactive boundary modules are transformed into
//! server-safe island wrappers, the client bundle is rebuilt with coalescing,
//! and connected browsers receive reload, update or error messages.
//!
//! ## Example
//!
//! ```rust,no_run
//! use isle_dev::{DevOptions, DevRuntime, DevState, Pipeline};
//! # use isle_dev::{RenderError, Renderer, Request, Response};
//! # use std::sync::Arc;
//! # struct App;
//! # #[async_trait::async_trait]
//! # impl Renderer for App {
//! #     async fn render(&self, _req: Request) -> Result<Response, RenderError> {
//! #         unimplemented!()
//! #     }
//! # }
//!
//! # async fn run() -> isle_dev::Result<()> {
//! let state = DevState::new(DevOptions::new("/path/to/project"));
//! let handle = DevRuntime::new(state.clone()).start()?;
//!
//! let router = isle_dev::router(Pipeline::dev(&state, Arc::new(App)), state.broadcaster.clone());
//! let listener = isle_dev::bind("127.0.0.1", 3000).await?;
//! isle_dev::serve(listener, router, std::future::pending()).await?;
//!
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod broadcast;
pub mod bundle;
pub mod classifier;
pub mod client;
pub mod error;
pub mod exports;
pub mod options;
pub mod pipeline;
pub mod runtime;
pub mod server;
pub mod state;
pub mod transform;
pub mod watcher;

pub use broadcast::{Broadcaster, DevSession, SessionId, UpdateEvent};
pub use bundle::{
    ArtifactStore, BuildStatus, BundleArtifactSet, BundleBuilder, Bundler, RebuildScheduler,
    RebuildTrigger, RolldownBundler,
};
pub use classifier::{ChangeEvent, ClassifyRules, RawEvent, RawEventKind, StructuralReason};
pub use error::{BundleError, DevError, RenderError, Result, TransformError};
pub use options::{DevOptions, BUNDLE_PREFIX, INTERNAL_PREFIX};
pub use pipeline::{Interceptor, Next, Pipeline, Renderer, Request, Response, RouteTable};
pub use runtime::{DevHandle, DevRuntime};
pub use server::{bind, router, serve};
pub use state::DevState;
pub use transform::{
    ModuleCacheEntry, ModuleLoader, ModuleOutput, ModuleTransformCache, SourceScanLoader,
};
pub use watcher::FileWatcher;
