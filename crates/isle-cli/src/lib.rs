//! Isle CLI - development server for island-based applications.
//!
//! # Architecture
//!
//! - [`cli`] - Argument definitions
//! - [`config`] - Layered configuration (file, environment, flags)
//! - [`commands`] - Command implementations
//! - [`app`] - Static route table and renderer used by `isle dev`
//! - [`error`] - CLI error types with actionable hints
//! - [`logger`] - Tracing subscriber setup
//! - [`ui`] - Terminal status output
//!
//! The development pipeline itself lives in `isle-dev`.

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logger;
pub mod ui;

pub use error::{CliError, ConfigError, Result, ResultExt};
