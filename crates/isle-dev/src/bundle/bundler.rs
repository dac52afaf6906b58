//! Bundling seam and the rolldown-backed implementation.

use async_trait::async_trait;
use rolldown::{
    BundlerBuilder as RolldownBundlerBuilder, BundlerOptions, InputItem, OutputFormat, Platform,
    RawMinifyOptions, SourceMapType,
};
use rolldown_common::Output;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleTarget {
    Browser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMapMode {
    Inline,
}

/// What to bundle and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleRequest {
    /// Materialized virtual entry
    pub entry: PathBuf,
    /// Directory relative imports and bare specifiers resolve from
    pub cwd: PathBuf,
    pub target: BundleTarget,
    pub sourcemap: SourceMapMode,
    pub minify: bool,
}

impl BundleRequest {
    /// Dev-mode request: browser target, inline source maps, no minification.
    pub fn dev(entry: PathBuf, cwd: PathBuf) -> Self {
        Self {
            entry,
            cwd,
            target: BundleTarget::Browser,
            sourcemap: SourceMapMode::Inline,
            minify: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleOutputFile {
    /// Path relative to the bundle root, e.g. `client-entry.js`
    pub path: String,
    pub content: Vec<u8>,
    pub is_entry: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BundleResult {
    pub success: bool,
    pub outputs: Vec<BundleOutputFile>,
    pub diagnostics: Vec<String>,
}

impl BundleResult {
    pub fn succeeded(outputs: Vec<BundleOutputFile>) -> Self {
        Self {
            success: true,
            outputs,
            diagnostics: Vec::new(),
        }
    }

    pub fn failed(diagnostics: Vec<String>) -> Self {
        Self {
            success: false,
            outputs: Vec::new(),
            diagnostics,
        }
    }
}

/// The bundling subsystem.
#[async_trait]
pub trait Bundler: Send + Sync + 'static {
    async fn bundle(&self, request: &BundleRequest) -> BundleResult;
}

/// Bundles with rolldown: ESM output for the browser.
#[derive(Debug, Default, Clone)]
pub struct RolldownBundler;

impl RolldownBundler {
    fn options(request: &BundleRequest) -> BundlerOptions {
        BundlerOptions {
            input: Some(vec![InputItem {
                name: Some("client-entry".to_string()),
                import: request.entry.to_string_lossy().into_owned(),
            }]),
            cwd: Some(request.cwd.clone()),
            format: Some(OutputFormat::Esm),
            platform: Some(match request.target {
                BundleTarget::Browser => Platform::Browser,
            }),
            sourcemap: Some(match request.sourcemap {
                SourceMapMode::Inline => SourceMapType::Inline,
            }),
            minify: Some(RawMinifyOptions::from(request.minify)),
            ..Default::default()
        }
    }
}

async fn generate(options: BundlerOptions) -> BundleResult {
    let mut bundler = match RolldownBundlerBuilder::default().with_options(options).build() {
        Ok(bundler) => bundler,
        Err(errors) => return BundleResult::failed(vec![format!("{:?}", errors)]),
    };

    match bundler.generate().await {
        Ok(output) => BundleResult::succeeded(
            output
                .assets
                .iter()
                .map(|asset| match asset {
                    Output::Chunk(chunk) => BundleOutputFile {
                        path: chunk.filename.to_string(),
                        content: chunk.code.clone().into_bytes(),
                        is_entry: chunk.is_entry,
                    },
                    Output::Asset(asset) => BundleOutputFile {
                        path: asset.filename.to_string(),
                        content: asset.source.as_bytes().to_vec(),
                        is_entry: false,
                    },
                })
                .collect(),
        ),
        Err(errors) => BundleResult::failed(vec![format!("{:?}", errors)]),
    }
}

#[async_trait]
impl Bundler for RolldownBundler {
    async fn bundle(&self, request: &BundleRequest) -> BundleResult {
        let options = Self::options(request);
        // Rolldown's futures are not guaranteed to be Send; drive them on a
        // blocking thread so rebuilds can run from spawned tasks.
        let handle = tokio::runtime::Handle::current();
        match tokio::task::spawn_blocking(move || handle.block_on(generate(options))).await {
            Ok(result) => result,
            Err(e) => BundleResult::failed(vec![format!("bundler task failed: {}", e)]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dev_request_defaults() {
        let request = BundleRequest::dev(PathBuf::from("/p/.isle/dev/client-entry.tsx"), PathBuf::from("/p"));
        assert_eq!(request.target, BundleTarget::Browser);
        assert_eq!(request.sourcemap, SourceMapMode::Inline);
        assert!(!request.minify);
    }

    #[test]
    fn test_rolldown_options() {
        let request = BundleRequest::dev(PathBuf::from("/p/.isle/dev/client-entry.tsx"), PathBuf::from("/p"));
        let options = RolldownBundler::options(&request);
        let input = options.input.unwrap();
        assert_eq!(input.len(), 1);
        assert_eq!(input[0].import, "/p/.isle/dev/client-entry.tsx");
        assert_eq!(options.cwd, Some(PathBuf::from("/p")));
        assert!(matches!(options.platform, Some(Platform::Browser)));
        assert!(matches!(options.sourcemap, Some(SourceMapType::Inline)));
    }

    #[test]
    fn test_failed_result() {
        let result = BundleResult::failed(vec!["Unexpected token".into()]);
        assert!(!result.success);
        assert!(result.outputs.is_empty());
    }
}
