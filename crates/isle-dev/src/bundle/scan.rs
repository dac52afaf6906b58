//! Island discovery over the component directory.
//!
//! Reads sources straight from disk rather than through the transform cache,
//! so a rebuild never has to wait for every island to be server-transformed.

use crate::exports;
use crate::transform::{island_name, RAW_COPY_TAG};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

const SCRIPT_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "mjs"];

/// One function export of a boundary file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct IslandExport {
    pub path: PathBuf,
    pub export_name: String,
    pub is_default_export: bool,
}

impl IslandExport {
    /// Name the island is registered under on both server and client.
    pub fn island_name(&self) -> String {
        island_name(&self.path, &self.export_name, self.is_default_export)
    }
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.') || name == "node_modules")
}

fn is_script(path: &Path) -> bool {
    let is_raw_copy = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.contains(RAW_COPY_TAG));
    !is_raw_copy
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| SCRIPT_EXTENSIONS.contains(&ext))
}

/// Finds every island export under `components_dir`, sorted by path then
/// source order.
///
/// A missing directory yields no islands. Unreadable files are skipped with
/// a warning.
pub fn scan_islands(components_dir: &Path) -> Vec<IslandExport> {
    if !components_dir.is_dir() {
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = WalkDir::new(components_dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| !is_skipped_dir(entry))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_script(entry.path()))
        .map(DirEntry::into_path)
        .collect();
    files.sort();

    let mut islands = Vec::new();
    for path in files {
        let source = match std::fs::read_to_string(&path) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!("failed to read {}: {}", path.display(), e);
                continue;
            }
        };
        if !exports::is_boundary(&source) {
            continue;
        }
        islands.extend(
            exports::scan_exports(&source)
                .into_iter()
                .filter(|symbol| symbol.is_function_like)
                .map(|symbol| IslandExport {
                    path: path.clone(),
                    export_name: symbol.name,
                    is_default_export: symbol.is_default,
                }),
        );
    }
    islands
}
