//! Virtual client entry synthesis.
//!
//! The entry imports every island, registers each one under its island
//! name, then continues with the user's client entry (or a default
//! bootstrap). It is written under the scratch directory, outside the source
//! tree, so every import in it is made absolute.

use super::scan::IslandExport;
use path_clean::PathClean;
use regex::{Captures, Regex};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Module providing `registerIsland` and `hydrateIslands` to the browser.
pub const CLIENT_RUNTIME: &str = "isle/client";

/// File name of the materialized entry inside the scratch directory.
pub const ENTRY_FILE_NAME: &str = "client-entry.tsx";

const REGISTER_BINDING: &str = "__isleRegisterIsland";

/// Used when the project has no client entry of its own.
pub const DEFAULT_BOOTSTRAP: &str = "import { hydrateIslands } from \"isle/client\";\nhydrateIslands();\n";

/// User-supplied client entry.
#[derive(Debug, Clone)]
pub struct UserEntry<'a> {
    pub path: &'a Path,
    pub source: &'a str,
}

/// Builds the virtual entry source.
pub fn synthesize(
    islands: &[IslandExport],
    user_entry: Option<UserEntry<'_>>,
    aliases: &[(String, PathBuf)],
) -> String {
    let mut out = String::from("// Generated by isle dev. Do not edit.\n");
    out.push_str(&format!(
        "import {{ registerIsland as {} }} from {:?};\n",
        REGISTER_BINDING, CLIENT_RUNTIME
    ));

    for (i, island) in islands.iter().enumerate() {
        let specifier = slash_path(&island.path);
        if island.is_default_export {
            out.push_str(&format!("import __island{} from {:?};\n", i, specifier));
        } else {
            out.push_str(&format!(
                "import {{ {} as __island{} }} from {:?};\n",
                island.export_name, i, specifier
            ));
        }
    }
    for (i, island) in islands.iter().enumerate() {
        out.push_str(&format!(
            "{}({:?}, __island{});\n",
            REGISTER_BINDING,
            island.island_name(),
            i
        ));
    }
    out.push('\n');

    match user_entry {
        Some(entry) => {
            let dir = entry.path.parent().unwrap_or_else(|| Path::new("/"));
            out.push_str(&rewrite_imports(entry.source, dir, aliases));
        }
        None => out.push_str(DEFAULT_BOOTSTRAP),
    }
    out
}

fn import_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r#"(?P<pre>\b(?:import|export)\b[^'";]*?\bfrom\s*|\bimport\s*\(\s*|\bimport\s+)(?P<q>["'])(?P<spec>[^"'\n]+)["']"#,
            )
            .map_err(|e| tracing::error!("import pattern failed to compile: {}", e))
            .ok()
        })
        .as_ref()
}

/// Makes relative and aliased import specifiers absolute.
///
/// `importer_dir` is the directory of the file the source came from. Bare
/// package specifiers and URLs are left alone.
pub fn rewrite_imports(source: &str, importer_dir: &Path, aliases: &[(String, PathBuf)]) -> String {
    let Some(pattern) = import_pattern() else {
        return source.to_string();
    };
    pattern
        .replace_all(source, |caps: &Captures<'_>| {
            let spec = &caps["spec"];
            let quote = &caps["q"];
            let resolved = resolve_specifier(spec, importer_dir, aliases).unwrap_or_else(|| spec.to_string());
            format!("{}{}{}{}", &caps["pre"], quote, resolved, quote)
        })
        .into_owned()
}

/// Absolute form of `spec`, or `None` if it should stay as written.
pub fn resolve_specifier(spec: &str, importer_dir: &Path, aliases: &[(String, PathBuf)]) -> Option<String> {
    if spec.starts_with("./") || spec.starts_with("../") || spec == "." || spec == ".." {
        return Some(slash_path(&importer_dir.join(spec).clean()));
    }

    for (prefix, target) in aliases {
        let rest = if prefix.ends_with('/') {
            spec.strip_prefix(prefix.as_str())
        } else if spec == prefix {
            Some("")
        } else {
            spec.strip_prefix(prefix.as_str()).and_then(|r| r.strip_prefix('/'))
        };
        if let Some(rest) = rest {
            let path = if rest.is_empty() {
                target.clone()
            } else {
                target.join(rest)
            };
            return Some(slash_path(&path.clean()));
        }
    }
    None
}

fn slash_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
