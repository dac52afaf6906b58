//! Script injection into HTML responses.

use super::{Interceptor, Next, Request, Response};
use crate::client::SCRIPT_TAGS;
use crate::error::RenderError;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::header;

/// Inserts the dev scripts before the last `</body>`, or appends them when
/// the document has none.
pub fn inject_scripts(html: &str) -> String {
    let mut out = String::with_capacity(html.len() + SCRIPT_TAGS.len() + 1);
    match html.rfind("</body>") {
        Some(pos) => {
            out.push_str(&html[..pos]);
            out.push_str(SCRIPT_TAGS);
            out.push('\n');
            out.push_str(&html[pos..]);
        }
        None => {
            out.push_str(html);
            out.push('\n');
            out.push_str(SCRIPT_TAGS);
        }
    }
    out
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"))
}

/// Adds the update client and overlay to every HTML response.
pub struct HtmlInjectInterceptor;

#[async_trait]
impl Interceptor for HtmlInjectInterceptor {
    async fn handle(&self, req: Request, next: Next<'_>) -> Result<Response, RenderError> {
        let response = next.run(req).await?;
        if !is_html(&response) {
            return Ok(response);
        }

        let (mut parts, body) = response.into_parts();
        let bytes = to_bytes(body, usize::MAX)
            .await
            .map_err(|e| RenderError::new(format!("Failed to read page body: {}", e)))?;
        let html = inject_scripts(&String::from_utf8_lossy(&bytes));

        parts.headers.remove(header::CONTENT_LENGTH);
        Ok(Response::from_parts(parts, Body::from(html)))
    }
}
