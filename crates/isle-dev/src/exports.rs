//! Lightweight syntactic scanning of module sources.
//!
//! Two questions are answered here without a full parse:
//!
//! - Is the file an interactive boundary? It is when its first statement is
//!   the `"use client"` directive (comments and whitespace may precede it).
//! - Which symbols does it export, and is each one function-like?
//!
//! Comments and string contents are blanked before matching so that code in
//! a template literal or a commented-out export is never picked up. Blanking
//! keeps byte offsets and newlines intact, so match positions map back to the
//! original source.

use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

/// The directive that marks a module as an interactive boundary.
pub const BOUNDARY_DIRECTIVE: &str = "use client";

/// One export discovered in a module, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedSymbol {
    /// Export name; `"default"` for the default export
    pub name: String,
    pub is_default: bool,
    /// Functions, arrow functions and classes
    pub is_function_like: bool,
}

impl ExportedSymbol {
    fn new(name: impl Into<String>, is_default: bool, is_function_like: bool) -> Self {
        Self {
            name: name.into(),
            is_default,
            is_function_like,
        }
    }
}

/// Returns true if `source` starts with the boundary directive.
pub fn is_boundary(source: &str) -> bool {
    directive_span(source).is_some()
}

/// Removes the boundary directive, keeping every other byte and line in place.
///
/// Sources without the directive are returned unchanged.
pub fn strip_boundary_marker(source: &str) -> String {
    match directive_span(source) {
        Some(span) => {
            let mut out = String::with_capacity(source.len());
            out.push_str(&source[..span.start]);
            out.push_str(&source[span.end..]);
            out
        }
        None => source.to_string(),
    }
}

/// Byte range of the leading directive statement, including a trailing `;`.
fn directive_span(source: &str) -> Option<Range<usize>> {
    let bytes = source.as_bytes();
    let mut i = 0;

    if source.starts_with('\u{feff}') {
        i += '\u{feff}'.len_utf8();
    }
    if source[i..].starts_with("#!") {
        i += source[i..].find('\n').unwrap_or(source.len() - i);
    }

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if source[i..].starts_with("//") {
            i += source[i..].find('\n').unwrap_or(source.len() - i);
        } else if source[i..].starts_with("/*") {
            i += source[i..].find("*/").map(|p| p + 2)?;
        } else {
            break;
        }
    }

    let start = i;
    let quote = *bytes.get(i)?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let body_end = i + 1 + BOUNDARY_DIRECTIVE.len();
    if source.get(i + 1..body_end)? != BOUNDARY_DIRECTIVE || bytes.get(body_end) != Some(&quote) {
        return None;
    }

    let literal = start..body_end + 1;
    let mut end = body_end + 1;
    let mut crossed_comment = false;
    loop {
        while end < bytes.len() && (bytes[end] == b' ' || bytes[end] == b'\t') {
            end += 1;
        }
        if source[end..].starts_with("//") {
            return Some(literal);
        }
        if source[end..].starts_with("/*") {
            let close = end + source[end..].find("*/")? + 2;
            // A line break inside the comment terminates the statement.
            if source[end..close].contains('\n') {
                return Some(literal);
            }
            crossed_comment = true;
            end = close;
            continue;
        }
        break;
    }
    match bytes.get(end) {
        // Only a `;` right after the literal goes with it; past a comment the
        // empty statement is left in place.
        Some(b';') if !crossed_comment => Some(start..end + 1),
        Some(b';') | None | Some(b'\n') | Some(b'\r') => Some(literal),
        // `"use client".length` and friends are expressions, not directives
        _ => None,
    }
}

const IDENT: &str = r"[A-Za-z_$][\w$]*";

struct Patterns {
    export_function: Regex,
    export_class: Regex,
    export_binding: Regex,
    export_default_expr: Regex,
    export_list: Regex,
    export_enum: Regex,
    local_function: Regex,
    local_class: Regex,
    local_binding: Regex,
    arrow_ident: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, regex::Error> {
        let type_annotation = r"(?::[^=;]*(?:=>[^=;]*)*)?";
        Ok(Self {
            export_function: Regex::new(&format!(
                r"(?m)^[ \t]*export\s+(default\s+)?(?:async\s+)?function\b\s*\*?\s*({IDENT})?"
            ))?,
            export_class: Regex::new(&format!(
                r"(?m)^[ \t]*export\s+(default\s+)?(?:abstract\s+)?class\b\s*({IDENT})?"
            ))?,
            export_binding: Regex::new(&format!(
                r"(?m)^[ \t]*export\s+(?:const|let|var)\s+({IDENT})\s*{type_annotation}=\s*"
            ))?,
            export_default_expr: Regex::new(r"(?m)^[ \t]*export\s+default\s+")?,
            export_list: Regex::new(r"(?m)^[ \t]*export\s*\{([^}]*)\}\s*(from\b)?")?,
            export_enum: Regex::new(&format!(
                r"(?m)^[ \t]*export\s+(?:const\s+)?enum\s+({IDENT})"
            ))?,
            local_function: Regex::new(&format!(
                r"(?m)^[ \t]*(?:async\s+)?function\b\s*\*?\s*({IDENT})"
            ))?,
            local_class: Regex::new(&format!(r"(?m)^[ \t]*(?:abstract\s+)?class\s+({IDENT})"))?,
            local_binding: Regex::new(&format!(
                r"(?m)^[ \t]*(?:const|let|var)\s+({IDENT})\s*{type_annotation}=\s*"
            ))?,
            arrow_ident: Regex::new(&format!(r"^{IDENT}\s*=>"))?,
        })
    }
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| match Patterns::compile() {
            Ok(patterns) => Some(patterns),
            Err(e) => {
                tracing::error!("export patterns failed to compile: {}", e);
                None
            }
        })
        .as_ref()
}

/// Scans `source` for its exports, in source order.
///
/// `export * from` and type-only exports are not reported. Names re-exported
/// from another module (`export { X } from "./x"`) cannot be inspected here
/// and are reported as non-function values.
pub fn scan_exports(source: &str) -> Vec<ExportedSymbol> {
    let Some(p) = patterns() else {
        return Vec::new();
    };
    let code = blank_comments_and_strings(source);
    let locals = LocalDeclarations::collect(p, &code);
    let mut found: Vec<(usize, ExportedSymbol)> = Vec::new();

    for caps in p.export_function.captures_iter(&code) {
        let at = caps.get(0).map_or(0, |m| m.start());
        let is_default = caps.get(1).is_some();
        match (is_default, caps.get(2)) {
            (true, _) => found.push((at, ExportedSymbol::new("default", true, true))),
            (false, Some(name)) => found.push((at, ExportedSymbol::new(name.as_str(), false, true))),
            (false, None) => {}
        }
    }

    for caps in p.export_class.captures_iter(&code) {
        let at = caps.get(0).map_or(0, |m| m.start());
        let is_default = caps.get(1).is_some();
        match (is_default, caps.get(2)) {
            (true, _) => found.push((at, ExportedSymbol::new("default", true, true))),
            (false, Some(name)) => found.push((at, ExportedSymbol::new(name.as_str(), false, true))),
            (false, None) => {}
        }
    }

    for caps in p.export_binding.captures_iter(&code) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let rhs = &code[whole.end()..];
        found.push((
            whole.start(),
            ExportedSymbol::new(name.as_str(), false, looks_function_like(rhs)),
        ));
    }

    for m in p.export_default_expr.find_iter(&code) {
        let rhs = code[m.end()..].trim_start();
        if starts_with_keyword(rhs, "function")
            || starts_with_keyword(rhs, "class")
            || starts_with_keyword(rhs, "abstract")
            || (starts_with_keyword(rhs, "async") && starts_with_keyword(rhs[5..].trim_start(), "function"))
        {
            // Already reported by the declaration patterns.
            continue;
        }
        let function_like = looks_function_like(rhs) || locals.is_function_like(leading_identifier(rhs));
        found.push((m.start(), ExportedSymbol::new("default", true, function_like)));
    }

    for caps in p.export_list.captures_iter(&code) {
        let (Some(whole), Some(list)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let re_export = caps.get(2).is_some();
        for spec in list.as_str().split(',') {
            let spec = spec.trim();
            if spec.is_empty() || spec.starts_with("type ") {
                continue;
            }
            let (local, exported) = match spec.split_once(" as ") {
                Some((local, exported)) => (local.trim(), exported.trim()),
                None => (spec, spec),
            };
            let is_default = exported == "default";
            let function_like = !re_export && locals.is_function_like(Some(local));
            found.push((whole.start(), ExportedSymbol::new(exported, is_default, function_like)));
        }
    }

    for caps in p.export_enum.captures_iter(&code) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        found.push((whole.start(), ExportedSymbol::new(name.as_str(), false, false)));
    }

    found.sort_by_key(|(at, _)| *at);
    let mut seen = std::collections::HashSet::new();
    found
        .into_iter()
        .map(|(_, symbol)| symbol)
        .filter(|symbol| seen.insert(symbol.name.clone()))
        .collect()
}

/// Function-likeness of top-level declarations, for `export { X }` and
/// `export default X`.
struct LocalDeclarations {
    names: std::collections::HashMap<String, bool>,
}

impl LocalDeclarations {
    fn collect(p: &Patterns, code: &str) -> Self {
        let mut names = std::collections::HashMap::new();
        for caps in p.local_function.captures_iter(code) {
            if let Some(name) = caps.get(1) {
                names.insert(name.as_str().to_string(), true);
            }
        }
        for caps in p.local_class.captures_iter(code) {
            if let Some(name) = caps.get(1) {
                names.insert(name.as_str().to_string(), true);
            }
        }
        for caps in p.local_binding.captures_iter(code) {
            if let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) {
                names
                    .entry(name.as_str().to_string())
                    .or_insert_with(|| looks_function_like(&code[whole.end()..]));
            }
        }
        Self { names }
    }

    fn is_function_like(&self, name: Option<&str>) -> bool {
        name.and_then(|n| self.names.get(n).copied()).unwrap_or(false)
    }
}

fn starts_with_keyword(s: &str, keyword: &str) -> bool {
    s.starts_with(keyword)
        && !s[keyword.len()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

fn leading_identifier(s: &str) -> Option<&str> {
    let end = s
        .char_indices()
        .find(|(i, c)| !(c.is_alphanumeric() || *c == '_' || *c == '$') || (*i == 0 && c.is_numeric()))
        .map_or(s.len(), |(i, _)| i);
    let ident = &s[..end];
    let rest = s[end..].trim_start();
    let terminated = rest.is_empty() || rest.starts_with(';') || rest.starts_with('\n');
    (!ident.is_empty() && terminated).then_some(ident)
}

/// Heuristic check for a function-valued initializer.
fn looks_function_like(rhs: &str) -> bool {
    let mut rhs = rhs.trim_start();
    if starts_with_keyword(rhs, "async") {
        rhs = rhs[5..].trim_start();
    }
    if starts_with_keyword(rhs, "function") || starts_with_keyword(rhs, "class") {
        return true;
    }
    if patterns().is_some_and(|p| p.arrow_ident.is_match(rhs)) {
        return true;
    }
    if rhs.starts_with('<') {
        // Generic arrow: `<T,>(props: T) => ...`
        match rhs.find('>') {
            Some(close) => rhs = rhs[close + 1..].trim_start(),
            None => return false,
        }
    }
    if !rhs.starts_with('(') {
        return false;
    }

    let mut depth = 0usize;
    for (i, c) in rhs.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    let after = rhs[i + 1..].trim_start();
                    if after.starts_with("=>") {
                        return true;
                    }
                    // Return type annotation before the arrow
                    if let Some(annotation) = after.strip_prefix(':') {
                        let line_end = annotation.find(['\n', ';']).unwrap_or(annotation.len());
                        return annotation[..line_end].contains("=>");
                    }
                    return false;
                }
            }
            _ => {}
        }
    }
    false
}

/// Replaces comment text and string/template contents with spaces.
///
/// Quotes and newlines are kept so offsets and line numbers are unchanged.
fn blank_comments_and_strings(source: &str) -> String {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Str(char),
    }

    let mut out = String::with_capacity(source.len());
    let mut state = State::Code;
    let mut chars = source.chars().peekable();

    let blank = |out: &mut String, c: char| {
        if c == '\n' {
            out.push('\n');
        } else {
            out.extend(std::iter::repeat_n(' ', c.len_utf8()));
        }
    };

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    out.push_str("  ");
                    state = State::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    out.push_str("  ");
                    state = State::BlockComment;
                }
                '"' | '\'' | '`' => {
                    out.push(c);
                    state = State::Str(c);
                }
                _ => out.push(c),
            },
            State::LineComment => {
                if c == '\n' {
                    out.push('\n');
                    state = State::Code;
                } else {
                    blank(&mut out, c);
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("  ");
                    state = State::Code;
                } else {
                    blank(&mut out, c);
                }
            }
            State::Str(quote) => {
                if c == '\\' {
                    blank(&mut out, c);
                    if let Some(next) = chars.next() {
                        blank(&mut out, next);
                    }
                } else if c == quote {
                    out.push(c);
                    state = State::Code;
                } else if c == '\n' && quote != '`' {
                    // Unterminated literal; resync at the line break.
                    out.push('\n');
                    state = State::Code;
                } else {
                    blank(&mut out, c);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(symbols: &[ExportedSymbol]) -> Vec<(&str, bool, bool)> {
        symbols
            .iter()
            .map(|s| (s.name.as_str(), s.is_default, s.is_function_like))
            .collect()
    }

    #[test]
    fn test_boundary_directive_variants() {
        assert!(is_boundary("\"use client\";\nexport function A() {}"));
        assert!(is_boundary("'use client'\nexport function A() {}"));
        assert!(is_boundary("// header\n/* more */\n  \"use client\";\n"));
        assert!(!is_boundary("import x from 'y';\n\"use client\";"));
        assert!(!is_boundary("\"use server\";"));
        assert!(!is_boundary("\"use client\".length"));
        assert!(!is_boundary(""));

        assert!(is_boundary("\"use client\" // island\nexport function A() {}"));
        assert!(is_boundary("\"use client\"; // island\nexport function A() {}"));
        assert!(is_boundary("\"use client\"\t/* x */\nexport function A() {}"));
        assert!(is_boundary("'use client' /* x */;\n"));
        assert!(is_boundary("\"use client\" /* spans\nlines */ export function A() {}"));
        assert!(!is_boundary("\"use client\" /* x */ .length"));
    }

    #[test]
    fn test_strip_directive_with_trailing_comment() {
        let source = "\"use client\" // island\nexport function Counter() {}\n";
        let stripped = strip_boundary_marker(source);
        assert!(!is_boundary(&stripped));
        assert_eq!(stripped.lines().count(), source.lines().count());
        assert_eq!(scan_exports(&stripped).len(), 1);
    }

    #[test]
    fn test_strip_keeps_line_numbers() {
        let source = "\"use client\";\nexport function Counter() {}\n";
        let stripped = strip_boundary_marker(source);
        assert!(!is_boundary(&stripped));
        assert_eq!(stripped.lines().count(), source.lines().count());
        assert_eq!(stripped.lines().nth(1), Some("export function Counter() {}"));
    }

    #[test]
    fn test_strip_without_marker_is_identity() {
        let source = "export const x = 1;\n";
        assert_eq!(strip_boundary_marker(source), source);
    }

    #[test]
    fn test_scan_declarations() {
        let source = r#""use client";
export function Counter() {}
export async function load() {}
export const Toggle = (props) => null;
export const typed: Props = ({ a }: Props): Element => null;
export const limit = 10;
export class Widget {}
export default function Page() {}
"#;
        assert_eq!(
            names(&scan_exports(source)),
            vec![
                ("Counter", false, true),
                ("load", false, true),
                ("Toggle", false, true),
                ("typed", false, true),
                ("limit", false, false),
                ("Widget", false, true),
                ("default", true, true),
            ]
        );
    }

    #[test]
    fn test_scan_export_list_resolves_locals() {
        let source = r#"
function Counter() {}
const label = "hi";
const Toggle = () => null;
export { Counter, label as text, Toggle as default };
export { Other } from "./other";
"#;
        assert_eq!(
            names(&scan_exports(source)),
            vec![
                ("Counter", false, true),
                ("text", false, false),
                ("default", true, true),
                ("Other", false, false),
            ]
        );
    }

    #[test]
    fn test_scan_default_identifier_and_value() {
        let source = "const Counter = function () {};\nexport default Counter;\n";
        assert_eq!(names(&scan_exports(source)), vec![("default", true, true)]);

        let source = "export default { a: 1 };\n";
        assert_eq!(names(&scan_exports(source)), vec![("default", true, false)]);
    }

    #[test]
    fn test_scan_ignores_comments_and_strings() {
        let source = r#"
// export function Hidden() {}
/* export const Gone = () => 1; */
const doc = `
export function InTemplate() {}
`;
export function Visible() {}
"#;
        assert_eq!(names(&scan_exports(source)), vec![("Visible", false, true)]);
    }

    #[test]
    fn test_scan_enum_is_value() {
        let source = "export enum Mode { A, B }\nexport type Props = {};\n";
        assert_eq!(names(&scan_exports(source)), vec![("Mode", false, false)]);
    }
}
