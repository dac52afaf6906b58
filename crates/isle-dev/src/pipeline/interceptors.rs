//! Built-in pipeline stages.

use super::{Interceptor, Next, Request, Response};
use crate::broadcast::{Broadcaster, UpdateEvent};
use crate::bundle::ArtifactStore;
use crate::client::{CLIENT_SCRIPT, CLIENT_SCRIPT_URL, OVERLAY_SCRIPT, OVERLAY_SCRIPT_URL};
use crate::error::RenderError;
use crate::exports;
use crate::options::BUNDLE_PREFIX;
use crate::state::DevState;
use crate::transform::WrappedExport;
use async_trait::async_trait;
use axum::http::{header, Method, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use path_clean::PathClean;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// Server-safe module source endpoint prefix.
pub const SSR_PREFIX: &str = "/__isle/ssr/";

/// Pipeline status endpoint.
pub const STATUS_URL: &str = "/__isle/status";

const NO_STORE: &str = "no-store";

fn is_read(req: &Request) -> bool {
    req.method() == Method::GET || req.method() == Method::HEAD
}

/// Serves the current client bundle under `/_isle/`.
pub struct ArtifactInterceptor {
    store: Arc<ArtifactStore>,
}

impl ArtifactInterceptor {
    pub fn new(store: Arc<ArtifactStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Interceptor for ArtifactInterceptor {
    async fn handle(&self, req: Request, next: Next<'_>) -> Result<Response, RenderError> {
        if !is_read(&req) {
            return next.run(req).await;
        }
        let Some(relative) = req.uri().path().strip_prefix(BUNDLE_PREFIX) else {
            return next.run(req).await;
        };

        // One snapshot per request: a concurrent swap never mixes versions.
        let snapshot = self.store.snapshot();
        match snapshot.get(relative) {
            Some(artifact) => Ok((
                [
                    (header::CONTENT_TYPE, artifact.content_type),
                    (header::CACHE_CONTROL, NO_STORE),
                ],
                artifact.bytes.clone(),
            )
                .into_response()),
            None => Ok((
                StatusCode::NOT_FOUND,
                [(header::CACHE_CONTROL, NO_STORE)],
                format!("Bundle artifact not found: {}", relative),
            )
                .into_response()),
        }
    }
}

/// Serves the update client and the error overlay scripts.
pub struct ClientScriptInterceptor;

#[async_trait]
impl Interceptor for ClientScriptInterceptor {
    async fn handle(&self, req: Request, next: Next<'_>) -> Result<Response, RenderError> {
        let script = match req.uri().path() {
            CLIENT_SCRIPT_URL => Some(CLIENT_SCRIPT),
            OVERLAY_SCRIPT_URL => Some(OVERLAY_SCRIPT),
            _ => None,
        };
        let Some(script) = script.filter(|_| is_read(&req)) else {
            return next.run(req).await;
        };
        Ok((
            [
                (header::CONTENT_TYPE, "text/javascript; charset=utf-8"),
                (header::CACHE_CONTROL, NO_STORE),
            ],
            script,
        )
            .into_response())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModuleExport {
    name: String,
    default: bool,
    function_like: bool,
    island: Option<String>,
}

#[derive(Debug, Serialize)]
struct ServerModule {
    path: String,
    boundary: bool,
    exports: Vec<ModuleExport>,
    code: String,
}

/// Exposes the transform cache to an out-of-process renderer.
///
/// `GET /__isle/ssr/<project path>` answers with the module's server-safe
/// source and export table.
pub struct ServerModuleInterceptor {
    state: DevState,
}

impl ServerModuleInterceptor {
    pub fn new(state: DevState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Interceptor for ServerModuleInterceptor {
    async fn handle(&self, req: Request, next: Next<'_>) -> Result<Response, RenderError> {
        if !is_read(&req) {
            return next.run(req).await;
        }
        let Some(relative) = req.uri().path().strip_prefix(SSR_PREFIX) else {
            return next.run(req).await;
        };

        let root = &self.state.options.root;
        let path = root.join(relative.trim_start_matches('/')).clean();
        let is_file = path.starts_with(root)
            && tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file());
        if !is_file {
            return Ok((
                StatusCode::NOT_FOUND,
                Json(json!({ "error": format!("Module not found: /{}", relative) })),
            )
                .into_response());
        }

        let entry = match self.state.cache.load(&path).await {
            Ok(entry) => entry,
            Err(err) => {
                tracing::error!("{}", err);
                self.state.broadcaster.broadcast(&UpdateEvent::RuntimeError {
                    message: err.to_string(),
                    stack: None,
                });
                return Ok((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": err.to_string() })),
                )
                    .into_response());
            }
        };

        let symbols = if entry.is_interactive_boundary {
            entry.exported_symbols.clone()
        } else {
            exports::scan_exports(&entry.raw_source)
        };
        let exports = symbols
            .into_iter()
            .map(|symbol| {
                let island = match entry.wrapped_exports.get(&symbol.name) {
                    Some(WrappedExport::Island(handle)) => Some(handle.island_name.clone()),
                    _ => None,
                };
                ModuleExport {
                    name: symbol.name,
                    default: symbol.is_default,
                    function_like: symbol.is_function_like,
                    island,
                }
            })
            .collect();

        let module = ServerModule {
            path: self.state.options.display_path(&path),
            boundary: entry.is_interactive_boundary,
            exports,
            code: entry.server_source(),
        };
        Ok(([(header::CACHE_CONTROL, NO_STORE)], Json(module)).into_response())
    }
}

/// Reports build, bundle, session and cache state as JSON.
pub struct StatusInterceptor {
    state: DevState,
}

impl StatusInterceptor {
    pub fn new(state: DevState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Interceptor for StatusInterceptor {
    async fn handle(&self, req: Request, next: Next<'_>) -> Result<Response, RenderError> {
        if req.uri().path() != STATUS_URL || !is_read(&req) {
            return next.run(req).await;
        }

        let status = self.state.scheduler.status();
        let snapshot = self.state.store.snapshot();
        let body = json!({
            "build": {
                "status": status.label(),
                "error": status.error(),
                "duration_ms": status.duration_ms(),
                "rebuilds": self.state.scheduler.rebuild_count(),
            },
            "bundle": {
                "version": snapshot.version(),
                "entry": snapshot.entry(),
                "files": snapshot.paths().collect::<Vec<_>>(),
            },
            "islands": self.state.scheduler.builder().islands().len(),
            "sessions": self.state.broadcaster.session_count(),
            "modules": self.state.cache.len(),
            "transforms": self.state.cache.transform_count(),
        });
        Ok(([(header::CACHE_CONTROL, NO_STORE)], Json(body)).into_response())
    }
}

/// Reports renderer failures to connected browsers.
pub struct RenderErrorInterceptor {
    broadcaster: Arc<Broadcaster>,
}

impl RenderErrorInterceptor {
    pub fn new(broadcaster: Arc<Broadcaster>) -> Self {
        Self { broadcaster }
    }
}

#[async_trait]
impl Interceptor for RenderErrorInterceptor {
    async fn handle(&self, req: Request, next: Next<'_>) -> Result<Response, RenderError> {
        let result = next.run(req).await;
        if let Err(err) = &result {
            self.broadcaster.broadcast(&UpdateEvent::RuntimeError {
                message: err.message.clone(),
                stack: err.stack.clone(),
            });
        }
        result
    }
}
