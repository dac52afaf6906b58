//! Development server command implementation.
//!
//! Orchestrates the dev server lifecycle:
//! - Layered configuration and project root resolution
//! - The isle-dev pipeline (watcher, classifier, transform cache, rebuilds)
//! - HTTP server with the static route table behind the dev pipeline
//! - Keyboard shortcuts and graceful shutdown on Ctrl+C

use crate::app::StaticRoutes;
use crate::cli::DevArgs;
use crate::config::IsleConfig;
use crate::error::{CliError, Result, ResultExt};
use crate::ui;
use isle_dev::{ChangeEvent, DevRuntime, DevState, Pipeline};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::{mpsc, watch};

/// A keyboard shortcut typed into the dev server terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    /// Rescan routes and reload every browser
    ReloadRoutes,
    /// Clear the terminal
    Clear,
    /// Stop the server
    Quit,
    /// Print the shortcut legend
    Help,
}

impl Shortcut {
    /// Parses one line of terminal input.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "r" | "R" => Some(Shortcut::ReloadRoutes),
            "c" | "C" => Some(Shortcut::Clear),
            "q" | "Q" => Some(Shortcut::Quit),
            "h" | "H" | "?" => Some(Shortcut::Help),
            _ => None,
        }
    }
}

/// Execute the dev command.
///
/// # Process Flow
///
/// 1. Resolve the project root and load configuration
/// 2. Scan routes and start the dev pipeline (initial rebuild included)
/// 3. Bind the server, falling back to the next free port
/// 4. Serve until Ctrl+C or `q`, then stop the pipeline
///
/// # Errors
///
/// Returns errors for invalid configuration, a missing project root, a
/// watcher that cannot attach, or no bindable port.
pub async fn execute(args: DevArgs) -> Result<()> {
    ui::info("Starting development server...");

    let root = resolve_root(args.cwd.as_deref())?;
    let config = IsleConfig::load(&root, &args)?;
    let options = config.to_dev_options(&root);

    let routes = Arc::new(StaticRoutes::new(
        options.routes_path(),
        config.public_path(&root),
    ));
    if routes.is_empty() {
        ui::warning(&format!(
            "No pages found in {}",
            options.routes_path().display()
        ));
    } else {
        ui::info(&format!("Found {} route(s)", routes.len()));
    }

    let state = DevState::new(options);
    let handle = DevRuntime::new(state.clone())
        .with_route_table(routes.clone())
        .start()?;

    let router = isle_dev::router(
        Pipeline::dev(&state, routes.clone()),
        state.broadcaster.clone(),
    );
    let listener = match isle_dev::bind(&config.host, config.port).await {
        Ok(listener) => listener,
        Err(e) => {
            handle.shutdown().await;
            return Err(e.into());
        }
    };
    let url = server_url(listener.local_addr()?);

    ui::banner(&url, &root.display().to_string());
    if config.open {
        open_browser(&url);
    }

    let (quit_tx, quit_rx) = watch::channel(false);
    if ui::is_interactive() {
        ui::shortcuts();
        tokio::spawn(read_shortcuts(handle.changes(), quit_tx.clone()));
    } else {
        ui::info("Press Ctrl+C to stop");
    }

    let result = isle_dev::serve(listener, router, shutdown_signal(quit_rx)).await;

    ui::info("Shutting down development server...");
    handle.shutdown().await;
    result?;

    ui::success("Development server stopped");
    Ok(())
}

/// Canonical project root: `--cwd` or the current directory.
fn resolve_root(cwd: Option<&Path>) -> Result<PathBuf> {
    let root = match cwd {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir()?,
    };
    let root = root
        .canonicalize()
        .with_path(&root)
        .with_hint("Pass an existing project directory with --cwd")?;
    if !root.is_dir() {
        return Err(CliError::InvalidArgument(format!(
            "{} is not a directory",
            root.display()
        )));
    }
    Ok(root)
}

/// Browser URL for a bound address. Unspecified addresses map to localhost.
pub fn server_url(addr: SocketAddr) -> String {
    if addr.ip().is_unspecified() || addr.ip().is_loopback() {
        format!("http://localhost:{}", addr.port())
    } else {
        format!("http://{}", addr)
    }
}

async fn shutdown_signal(mut quit: watch::Receiver<bool>) {
    tokio::select! {
        result = signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!("failed to listen for Ctrl+C: {}", e);
                // Fall back to waiting on the quit key alone.
                let _ = quit.wait_for(|quit| *quit).await;
            }
        }
        _ = async { let _ = quit.wait_for(|quit| *quit).await; } => {}
    }
}

async fn read_shortcuts(changes: mpsc::Sender<ChangeEvent>, quit: watch::Sender<bool>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!("stopped reading shortcuts: {}", e);
                break;
            }
        };

        match Shortcut::parse(&line) {
            Some(Shortcut::ReloadRoutes) => {
                ui::info("Reloading routes...");
                if changes.send(ChangeEvent::manual_reload()).await.is_err() {
                    break;
                }
            }
            Some(Shortcut::Clear) => {
                if let Err(e) = console::Term::stderr().clear_screen() {
                    tracing::debug!("failed to clear screen: {}", e);
                }
            }
            Some(Shortcut::Quit) => {
                let _ = quit.send(true);
                break;
            }
            Some(Shortcut::Help) => ui::shortcuts(),
            None => {}
        }
    }
}

/// Open the server URL in the default browser.
///
/// Uses platform-specific commands:
/// - macOS: `open`
/// - Windows: `start`
/// - Linux: `xdg-open`
fn open_browser(url: &str) {
    use std::process::Command;

    let result = if cfg!(target_os = "macos") {
        Command::new("open").arg(url).spawn()
    } else if cfg!(target_os = "windows") {
        Command::new("cmd").args(["/C", "start", url]).spawn()
    } else {
        Command::new("xdg-open").arg(url).spawn()
    };

    match result {
        Ok(_) => ui::info(&format!("Opened browser at {}", url)),
        Err(e) => ui::warning(&format!("Failed to open browser: {}", e)),
    }
}
