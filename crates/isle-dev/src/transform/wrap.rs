//! Island wrapping of loaded exports and the server wrapper source.

use super::loader::{LoadedExport, ModuleSpecifier};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Module providing `registerIsland` to server code.
pub const SERVER_RUNTIME: &str = "isle/server";

/// Infix marking stripped copies, e.g. `Counter.isle-raw.3.tsx`.
pub const RAW_COPY_TAG: &str = ".isle-raw";

/// A function export tagged for client hydration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IslandHandle {
    /// Original (unstripped) module path
    pub module: PathBuf,
    /// Export name in the module; `"default"` for the default export
    pub export_name: String,
    /// Name the client bundle registers the island under
    pub island_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WrappedExport {
    Island(IslandHandle),
    /// Non-function export, passed through unchanged
    Value,
}

/// Registration name of an island.
///
/// Named exports register under their own name; a default export registers
/// under the module's file stem. The client bundle uses the same rule.
pub fn island_name(module: &Path, export_name: &str, is_default: bool) -> String {
    if !is_default {
        return export_name.to_string();
    }
    module
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|stem| stem.split('.').next().unwrap_or(stem).to_string())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "default".to_string())
}

/// Path of the stripped copy written next to `path` by transform `ticket`.
///
/// Every transform writes its own copy, so a stale transform finishing late
/// never overwrites the file a newer one loads from.
pub fn raw_copy_path(path: &Path, ticket: u64) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("module");
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}{RAW_COPY_TAG}.{ticket}.{ext}"),
        None => format!("{stem}{RAW_COPY_TAG}.{ticket}"),
    };
    path.with_file_name(name)
}

pub(crate) fn wrap_exports(module: &Path, exports: &[LoadedExport]) -> IndexMap<String, WrappedExport> {
    exports
        .iter()
        .map(|export| {
            let wrapped = if export.is_function {
                WrappedExport::Island(IslandHandle {
                    module: module.to_path_buf(),
                    export_name: export.name.clone(),
                    island_name: island_name(module, &export.name, export.is_default),
                })
            } else {
                WrappedExport::Value
            };
            (export.name.clone(), wrapped)
        })
        .collect()
}

/// Server-safe module source re-exporting the raw copy through
/// `registerIsland`.
pub(crate) fn server_source(raw_copy: &Path, wrapped: &IndexMap<String, WrappedExport>) -> String {
    let specifier = ModuleSpecifier::raw(raw_copy).to_string();
    let mut out = String::new();
    out.push_str(&format!("import * as __raw from {:?};\n", specifier));
    if wrapped.values().any(|w| matches!(w, WrappedExport::Island(_))) {
        out.push_str(&format!("import {{ registerIsland }} from {:?};\n", SERVER_RUNTIME));
    }

    for (name, export) in wrapped {
        let value = match export {
            WrappedExport::Island(handle) => format!(
                "registerIsland(__raw[{:?}], {:?})",
                handle.export_name, handle.island_name
            ),
            WrappedExport::Value => format!("__raw[{:?}]", name),
        };
        if name == "default" {
            out.push_str(&format!("export default {};\n", value));
        } else {
            out.push_str(&format!("export const {} = {};\n", name, value));
        }
    }
    out
}
