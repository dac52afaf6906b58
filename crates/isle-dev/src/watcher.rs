//! File system watcher feeding the change classifier.
//!
//! Watches the project root recursively and forwards path-level events,
//! dropping anything hidden, ignored, or generated by the dev server itself.
//! Debouncing happens downstream in the classifier.

use crate::classifier::{RawEvent, RawEventKind};
use crate::error::{DevError, Result};
use crate::transform::RAW_COPY_TAG;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Recursive watcher over a project root.
///
/// Dropping the watcher stops event delivery.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    /// Starts watching `root`, sending raw events to `tx`.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` doesn't exist or the platform watcher
    /// cannot be created.
    pub fn start(
        root: PathBuf,
        ignore_patterns: Vec<String>,
        tx: mpsc::Sender<RawEvent>,
    ) -> Result<Self> {
        if !root.is_dir() {
            return Err(DevError::RootNotFound(root));
        }

        let root_clone = root.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    // Watching continues for unaffected paths.
                    tracing::warn!("file watcher error: {}", e);
                    return;
                }
            };

            for path in &event.paths {
                if should_ignore(path, &root_clone, &ignore_patterns) {
                    continue;
                }
                let Some(kind) = raw_kind(&event.kind, path) else {
                    continue;
                };
                if tx.blocking_send(RawEvent::new(path.clone(), kind)).is_err() {
                    // Classifier has shut down.
                    return;
                }
            }
        })?;

        watcher.watch(&root, RecursiveMode::Recursive)?;
        tracing::debug!(root = %root.display(), "watching project");

        Ok(Self {
            _watcher: watcher,
            root,
        })
    }

    /// Get the root directory being watched.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn raw_kind(kind: &EventKind, path: &Path) -> Option<RawEventKind> {
    match kind {
        EventKind::Create(_) => Some(RawEventKind::Created),
        // Renames arrive as name modifications on both the old and new path.
        EventKind::Modify(ModifyKind::Name(_)) => Some(if path.exists() {
            RawEventKind::Created
        } else {
            RawEventKind::Removed
        }),
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => Some(RawEventKind::Modified),
        EventKind::Remove(_) => Some(RawEventKind::Removed),
        _ => None,
    }
}

/// Check if a path should be ignored.
///
/// Paths outside `root`, hidden components (`.git`, `.isle`), stripped raw
/// copies and anything matching an ignore pattern are skipped.
pub fn should_ignore(path: &Path, root: &Path, ignore_patterns: &[String]) -> bool {
    let rel_path = match path.strip_prefix(root) {
        Ok(p) => p,
        Err(_) => return true,
    };

    for component in rel_path.components() {
        if let Some(name) = component.as_os_str().to_str() {
            if name.starts_with('.') && name != "." && name != ".." {
                return true;
            }
        }
    }

    if path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.contains(RAW_COPY_TAG))
    {
        return true;
    }

    let path_str = rel_path.to_string_lossy().replace('\\', "/");
    for pattern in ignore_patterns {
        if let Some(suffix) = pattern.strip_prefix('*') {
            if path_str.ends_with(suffix) {
                return true;
            }
        } else if path_str == *pattern
            || path_str.starts_with(&format!("{}/", pattern))
            || path_str.contains(&format!("/{}/", pattern))
        {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn patterns() -> Vec<String> {
        vec!["node_modules".to_string(), "*.log".to_string()]
    }

    #[test]
    fn test_should_ignore_node_modules() {
        let root = PathBuf::from("/project");
        assert!(should_ignore(
            Path::new("/project/node_modules/react/index.js"),
            &root,
            &patterns()
        ));
        assert!(should_ignore(
            Path::new("/project/packages/ui/node_modules/x.js"),
            &root,
            &patterns()
        ));
        assert!(!should_ignore(
            Path::new("/project/app/node_modules_notes.ts"),
            &root,
            &patterns()
        ));
    }

    #[test]
    fn test_should_ignore_hidden_and_generated() {
        let root = PathBuf::from("/project");
        assert!(should_ignore(Path::new("/project/.git/HEAD"), &root, &[]));
        assert!(should_ignore(
            Path::new("/project/.isle/dev/client-entry.tsx"),
            &root,
            &[]
        ));
        assert!(should_ignore(
            Path::new("/project/app/components/Counter.isle-raw.tsx"),
            &root,
            &[]
        ));
        assert!(should_ignore(Path::new("/project/debug.log"), &root, &patterns()));
    }

    #[test]
    fn test_should_ignore_outside_root() {
        let root = PathBuf::from("/project");
        assert!(should_ignore(Path::new("/etc/passwd"), &root, &[]));
        assert!(!should_ignore(
            Path::new("/project/app/components/Counter.tsx"),
            &root,
            &[]
        ));
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let (tx, _rx) = mpsc::channel(1);
        let result = FileWatcher::start(PathBuf::from("/definitely/not/here"), vec![], tx);
        assert!(matches!(result, Err(DevError::RootNotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_watcher_reports_new_file() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        let (tx, mut rx) = mpsc::channel(64);
        let watcher = FileWatcher::start(root.clone(), patterns(), tx).unwrap();
        assert_eq!(watcher.root(), root.as_path());

        let file = root.join("utils.ts");
        std::fs::write(&file, "export const a = 1;").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match rx.recv().await {
                    Some(event) if event.path == file => return Some(event),
                    Some(_) => continue,
                    None => return None,
                }
            }
        })
        .await
        .unwrap();
        assert!(event.is_some());
    }
}
