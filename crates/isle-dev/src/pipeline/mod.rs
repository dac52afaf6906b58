//! Dev request pipeline.
//!
//! Requests flow through an ordered chain of [`Interceptor`]s and end at the
//! application's [`Renderer`]. Each interceptor either answers the request
//! itself or forwards it with [`Next::run`], optionally rewriting the
//! response on the way back out.

mod error_page;
mod inject;
mod interceptors;

pub use error_page::{error_page, html_escape};
pub use inject::{inject_scripts, HtmlInjectInterceptor};
pub use interceptors::{
    ArtifactInterceptor, ClientScriptInterceptor, RenderErrorInterceptor, ServerModuleInterceptor,
    StatusInterceptor, SSR_PREFIX, STATUS_URL,
};

use crate::error::RenderError;
use crate::state::DevState;
use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use std::sync::Arc;

pub type Request = axum::extract::Request;
pub type Response = axum::response::Response;

/// One stage of the pipeline.
#[async_trait]
pub trait Interceptor: Send + Sync + 'static {
    async fn handle(&self, req: Request, next: Next<'_>) -> Result<Response, RenderError>;
}

/// Produces the application's response for a request.
#[async_trait]
pub trait Renderer: Send + Sync + 'static {
    async fn render(&self, req: Request) -> Result<Response, RenderError>;
}

/// Application route set, told when the project structure changed.
pub trait RouteTable: Send + Sync + 'static {
    fn on_structural_change(&self);
}

/// The remainder of the chain after the current interceptor.
pub struct Next<'a> {
    rest: &'a [Arc<dyn Interceptor>],
    renderer: &'a dyn Renderer,
}

impl<'a> Next<'a> {
    pub async fn run(self, req: Request) -> Result<Response, RenderError> {
        match self.rest.split_first() {
            Some((interceptor, rest)) => {
                interceptor
                    .handle(
                        req,
                        Next {
                            rest,
                            renderer: self.renderer,
                        },
                    )
                    .await
            }
            None => self.renderer.render(req).await,
        }
    }
}

/// Ordered interceptors terminated by a renderer.
#[derive(Clone)]
pub struct Pipeline {
    interceptors: Vec<Arc<dyn Interceptor>>,
    renderer: Arc<dyn Renderer>,
}

impl Pipeline {
    /// A pipeline with no interceptors.
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self {
            interceptors: Vec::new(),
            renderer,
        }
    }

    /// The standard dev chain in front of `renderer`.
    pub fn dev(state: &DevState, renderer: Arc<dyn Renderer>) -> Self {
        Self::new(renderer)
            .with(ArtifactInterceptor::new(Arc::clone(&state.store)))
            .with(ClientScriptInterceptor)
            .with(ServerModuleInterceptor::new(state.clone()))
            .with(StatusInterceptor::new(state.clone()))
            .with(HtmlInjectInterceptor)
            .with(RenderErrorInterceptor::new(Arc::clone(&state.broadcaster)))
    }

    /// Appends an interceptor; it runs after every one already added.
    pub fn with(mut self, interceptor: impl Interceptor) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub async fn handle(&self, req: Request) -> Result<Response, RenderError> {
        Next {
            rest: &self.interceptors,
            renderer: self.renderer.as_ref(),
        }
        .run(req)
        .await
    }

    /// Runs the pipeline, turning a render error into a 500 error page.
    pub async fn respond(&self, req: Request) -> Response {
        match self.handle(req).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!("render failed: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, Html(error_page(&err))).into_response()
            }
        }
    }
}
