//! HTTP surface of the dev pipeline.
//!
//! The router exposes the update event stream directly and hands every
//! other request to the [`Pipeline`].

use crate::broadcast::{Broadcaster, SessionId};
use crate::client::EVENTS_URL;
use crate::error::{DevError, Result};
use crate::pipeline::{Pipeline, Request, Response};
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use axum::routing::get;
use axum::Router;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tower_http::cors::{Any, CorsLayer};

/// How many ports after the requested one are tried before giving up.
pub const PORT_FALLBACK_ATTEMPTS: u16 = 10;

#[derive(Clone)]
struct ServerState {
    pipeline: Arc<Pipeline>,
    broadcaster: Arc<Broadcaster>,
}

/// Builds the dev router.
pub fn router(pipeline: Pipeline, broadcaster: Arc<Broadcaster>) -> Router {
    let state = ServerState {
        pipeline: Arc::new(pipeline),
        broadcaster,
    };

    Router::new()
        .route(EVENTS_URL, get(handle_events))
        .fallback(handle_request)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn handle_request(State(state): State<ServerState>, req: Request) -> Response {
    state.pipeline.respond(req).await
}

/// Event stream of one session; dropping it unregisters the session.
struct SessionStream {
    id: SessionId,
    rx: ReceiverStream<String>,
    broadcaster: Arc<Broadcaster>,
}

impl Stream for SessionStream {
    type Item = std::result::Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|message| message.map(|data| Ok(Event::default().data(data))))
    }
}

impl Drop for SessionStream {
    fn drop(&mut self) {
        self.broadcaster.unregister(self.id);
    }
}

async fn handle_events(State(state): State<ServerState>) -> Sse<KeepAliveStream<SessionStream>> {
    let (id, rx) = state.broadcaster.connect();
    let stream = SessionStream {
        id,
        rx: ReceiverStream::new(rx),
        broadcaster: Arc::clone(&state.broadcaster),
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

/// Binds `host:port`, falling back to the next free port.
pub async fn bind(host: &str, port: u16) -> Result<TcpListener> {
    let mut last_error = None;
    for offset in 0..=PORT_FALLBACK_ATTEMPTS {
        let Some(candidate) = port.checked_add(offset) else {
            break;
        };
        match TcpListener::bind((host, candidate)).await {
            Ok(listener) => {
                if offset > 0 {
                    tracing::warn!("port {} in use, using {}", port, candidate);
                }
                return Ok(listener);
            }
            Err(e) => {
                tracing::debug!("cannot bind {}:{}: {}", host, candidate, e);
                last_error = Some(e);
            }
        }
    }

    Err(DevError::Server(match last_error {
        Some(e) => format!("Failed to bind {}:{} (and next {} ports): {}", host, port, PORT_FALLBACK_ATTEMPTS, e),
        None => format!("Failed to bind {}:{}", host, port),
    }))
}

/// Serves `router` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::debug!("serving on {}", addr);
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| DevError::Server(format!("Server error: {}", e)))
}
