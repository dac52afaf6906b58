//! Shared fixtures for isle-dev integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use isle_dev::bundle::{BundleOutputFile, BundleRequest, BundleResult, Bundler};
use isle_dev::{DevOptions, DevState, SourceScanLoader};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const COUNTER: &str = r#""use client";
import { useState } from "react";

export function Counter({ start = 0 }) {
  const [count, setCount] = useState(start);
  return <button onClick={() => setCount(count + 1)}>{count}</button>;
}
"#;

pub const UTILS: &str = "export const add = (a: number, b: number) => a + b;\n";

/// Bundler that serves the synthesized entry back as the bundle.
#[derive(Default)]
pub struct FakeBundler {
    pub fail: Mutex<bool>,
    pub entries: Mutex<Vec<String>>,
}

impl FakeBundler {
    pub fn calls(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn last_entry(&self) -> Option<String> {
        self.entries.lock().last().cloned()
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock() = fail;
    }
}

#[async_trait]
impl Bundler for FakeBundler {
    async fn bundle(&self, request: &BundleRequest) -> BundleResult {
        let entry = tokio::fs::read_to_string(&request.entry).await.unwrap_or_default();
        self.entries.lock().push(entry.clone());
        if *self.fail.lock() {
            return BundleResult::failed(vec!["Expected \";\" but found \"}\"".to_string()]);
        }
        BundleResult::succeeded(vec![
            BundleOutputFile {
                path: "client-entry.js".to_string(),
                content: entry.into_bytes(),
                is_entry: true,
            },
            BundleOutputFile {
                path: "chunks/shared.js".to_string(),
                content: b"export const shared = 1;\n".to_vec(),
                is_entry: false,
            },
        ])
    }
}

/// A throwaway project with the standard app layout.
pub struct Project {
    pub dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        for sub in ["app/routes", "app/components", "app/lib"] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        Self { dir }
    }

    pub fn root(&self) -> PathBuf {
        // Canonical so watcher paths and cache keys agree on macOS tmp dirs.
        self.dir.path().canonicalize().unwrap()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    pub fn write(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    pub fn options(&self) -> DevOptions {
        let mut options = DevOptions::new(self.root());
        options.debounce_ms = 200;
        options
    }

    pub fn state(&self, bundler: Arc<FakeBundler>) -> DevState {
        DevState::with_services(self.options(), Arc::new(SourceScanLoader), bundler)
    }
}

/// Waits until at least `rebuilds` rebuilds ran and the scheduler is idle.
pub async fn settle(state: &DevState, rebuilds: u64) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if state.scheduler.rebuild_count() >= rebuilds && state.scheduler.is_idle() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("scheduler did not settle");
}

/// Everything queued for a session so far.
pub fn drain(rx: &mut tokio::sync::mpsc::Receiver<String>) -> Vec<String> {
    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(message);
    }
    messages
}

pub fn display(root: &Path, path: &Path) -> String {
    format!("/{}", path.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
}
