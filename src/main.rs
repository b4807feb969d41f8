//! MenuBar - a desktop bar that docks to a screen edge and reserves its space
//!
//! Registers the bar as an AppBar with the shell, keeps the reservation in
//! step with DPI, display and full-screen changes, and moves its shadow and
//! secondary taskbar along with it.

#![cfg_attr(windows, windows_subsystem = "windows")]
#![cfg_attr(not(windows), allow(dead_code))]

mod app;
mod appbar;
mod companion;
mod config;
mod dispatch;
mod error;
mod geometry;
mod notification;
mod probe;
mod shutdown;
#[cfg(test)]
mod testing;
#[cfg(windows)]
mod utils;
#[cfg(windows)]
mod window;

use anyhow::Result;
use log::{info, LevelFilter};
use std::sync::Arc;

use crate::config::Config;

fn main() -> Result<()> {
    // Initialize logging
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .format_timestamp_millis()
        .init();

    info!("Starting MenuBar v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Arc::new(Config::load_or_default()?);
    info!("Configuration loaded successfully");

    run(config)?;

    info!("MenuBar shutting down gracefully");
    Ok(())
}

#[cfg(windows)]
fn run(config: Arc<Config>) -> Result<()> {
    let manager = window::WindowManager::new(config)?;
    manager.run_message_loop()
}

#[cfg(not(windows))]
fn run(_config: Arc<Config>) -> Result<()> {
    anyhow::bail!("MenuBar needs the Windows shell to reserve screen space")
}
