//! Static route table and renderer used by `isle dev`.
//!
//! Every `*.html` file under the routes directory is a page:
//!
//! | file                  | URL      |
//! |-----------------------|----------|
//! | `index.html`          | `/`      |
//! | `about.html`          | `/about` |
//! | `blog/index.html`     | `/blog`  |
//! | `blog/first-post.html`| `/blog/first-post` |
//!
//! Requests that match no page fall through to the public directory and then
//! to a 404 page. The table is rebuilt on every structural change, so adding
//! or removing a page never needs a restart.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, StatusCode};
use axum::response::{Html, IntoResponse};
use indexmap::IndexMap;
use isle_dev::bundle::content_type_for;
use isle_dev::{RenderError, Renderer, Request, Response, RouteTable};
use parking_lot::RwLock;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

const NOT_FOUND_PAGE: &str = "<!DOCTYPE html>\n<html>\n<head><title>404 Not Found</title></head>\n<body>\n<h1>404</h1>\n<p>No route matches this URL.</p>\n</body>\n</html>\n";

/// Page routes discovered from the file system.
pub struct StaticRoutes {
    routes_dir: PathBuf,
    public_dir: PathBuf,
    table: RwLock<IndexMap<String, PathBuf>>,
}

impl StaticRoutes {
    /// Scans `routes_dir` immediately.
    pub fn new(routes_dir: impl Into<PathBuf>, public_dir: impl Into<PathBuf>) -> Self {
        let routes = Self {
            routes_dir: routes_dir.into(),
            public_dir: public_dir.into(),
            table: RwLock::new(IndexMap::new()),
        };
        routes.rescan();
        routes
    }

    /// Rebuilds the URL table from disk.
    pub fn rescan(&self) {
        let table = scan_routes(&self.routes_dir);
        tracing::debug!("{} route(s) in {}", table.len(), self.routes_dir.display());
        *self.table.write() = table;
    }

    /// Page file serving `url`, if any.
    pub fn resolve(&self, url: &str) -> Option<PathBuf> {
        let key = normalize_url(url);
        self.table.read().get(&key).cloned()
    }

    /// Known URLs in discovery order.
    pub fn urls(&self) -> Vec<String> {
        self.table.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }

    async fn render_page(&self, page: &Path) -> Result<Response, RenderError> {
        match tokio::fs::read_to_string(page).await {
            Ok(html) => Ok(Html(html).into_response()),
            Err(e) => Err(RenderError::new(format!("Failed to read page {}: {}", page.display(), e))
                .with_stack(format!("at {}", page.display()))),
        }
    }

    async fn public_file(&self, url: &str) -> Option<Response> {
        let rel = safe_relative(url.trim_start_matches('/'))?;
        let path = self.public_dir.join(rel);
        if !tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
            return None;
        }
        match tokio::fs::read(&path).await {
            Ok(bytes) => Some(
                (
                    [(header::CONTENT_TYPE, content_type_for(&path.to_string_lossy()))],
                    Body::from(bytes),
                )
                    .into_response(),
            ),
            Err(e) => {
                tracing::warn!("failed to read {}: {}", path.display(), e);
                None
            }
        }
    }
}

#[async_trait]
impl Renderer for StaticRoutes {
    async fn render(&self, req: Request) -> Result<Response, RenderError> {
        if req.method() != Method::GET && req.method() != Method::HEAD {
            return Ok(StatusCode::METHOD_NOT_ALLOWED.into_response());
        }
        let url = req.uri().path().to_string();

        if let Some(page) = self.resolve(&url) {
            return self.render_page(&page).await;
        }
        if let Some(response) = self.public_file(&url).await {
            return Ok(response);
        }
        Ok((StatusCode::NOT_FOUND, Html(NOT_FOUND_PAGE)).into_response())
    }
}

impl RouteTable for StaticRoutes {
    fn on_structural_change(&self) {
        self.rescan();
    }
}

/// Maps every `*.html` file under `dir` to its URL.
pub fn scan_routes(dir: &Path) -> IndexMap<String, PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "html"))
        .collect();
    files.sort();

    files
        .into_iter()
        .filter_map(|path| {
            let rel = path.strip_prefix(dir).ok()?;
            Some((route_url(rel), path))
        })
        .collect()
}

/// URL for a page file given relative to the routes directory.
pub fn route_url(rel: &Path) -> String {
    let mut segments: Vec<String> = rel
        .with_extension("")
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if segments.last().is_some_and(|last| last == "index") {
        segments.pop();
    }
    format!("/{}", segments.join("/"))
}

fn normalize_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `rel` as a path that cannot leave its base directory.
fn safe_relative(rel: &str) -> Option<PathBuf> {
    if rel.is_empty() {
        return None;
    }
    let path = Path::new(rel);
    path.components()
        .all(|c| matches!(c, Component::Normal(_)))
        .then(|| path.to_path_buf())
}
