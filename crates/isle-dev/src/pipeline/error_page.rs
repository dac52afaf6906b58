//! Error page served when rendering fails.
//!
//! The page carries the dev scripts itself, so the browser stays subscribed
//! to updates and reloads once the error is fixed.

use crate::client::SCRIPT_TAGS;
use crate::error::RenderError;

/// Escapes `&`, `<`, `>`, `"` and `'` for embedding in HTML.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn error_page(err: &RenderError) -> String {
    let stack = err
        .stack
        .as_deref()
        .map(|stack| format!("<pre class=\"stack\">{}</pre>\n", html_escape(stack)))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Render Error</title>
<style>
  body {{ margin: 0; padding: 32px; background: #18181b; color: #f4f4f5; font: 14px/1.5 ui-monospace, Menlo, Consolas, monospace; }}
  h1 {{ color: #f87171; font-size: 20px; margin: 0 0 16px; }}
  pre {{ white-space: pre-wrap; margin: 0 0 16px; }}
  .stack {{ color: #a1a1aa; }}
</style>
</head>
<body>
<h1>Render Error</h1>
<pre class="message">{message}</pre>
{stack}{scripts}
</body>
</html>
"#,
        message = html_escape(&err.message),
        stack = stack,
        scripts = SCRIPT_TAGS,
    )
}
