// SPDX-License-Identifier: MIT OR Apache-2.0
//! `atlas` - headless dataflow host.
//!
//! Loads a graph snapshot (or builds a demo dashboard), then runs one
//! execution cycle per refresh tick until Ctrl-C or the configured cycle
//! limit, and optionally saves the graph on the way out.
//!
//! Usage: `atlas [CONFIG]` where `CONFIG` defaults to `atlas.ron`.

mod config;
mod demo;
mod driver;
mod error;
mod persist;

use atlas_graph::kinds::{builtin_registry, default_graph_config};
use atlas_graph::Session;
use config::{HostConfig, DEFAULT_CONFIG_FILE};
use driver::Driver;
use error::Result;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from);

    let loaded = match HostConfig::load(&config_path) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("atlas: {e}");
            return ExitCode::FAILURE;
        }
    };
    let found = loaded.is_some();
    let config = loaded.unwrap_or_default();

    if let Err(e) = init_tracing(&config.log_filter) {
        eprintln!("atlas: {e}");
        return ExitCode::FAILURE;
    }

    tracing::info!("Starting atlas v{}", env!("CARGO_PKG_VERSION"));
    if !found {
        tracing::info!(path = %config_path.display(), "no config file found; using defaults");
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Host failed: {e}");
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins over the configured directives
fn init_tracing(default_filter: &str) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)?,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
    Ok(())
}

async fn run(config: HostConfig) -> Result<()> {
    let mut session = Session::new(Arc::new(builtin_registry()));
    // Snapshots carrying their own graph config replace this on import
    session.set_graph_config(default_graph_config());
    match &config.snapshot_path {
        Some(path) => {
            let snapshot = persist::load_snapshot(path)?;
            session.import_snapshot(&snapshot)?;
            tracing::info!(path = %path.display(), "snapshot loaded");
        }
        None => demo::build_demo_graph(&mut session)?,
    }

    let save_path = config.save_path.clone();
    let driver = Driver::new(Arc::new(Mutex::new(session)), config);

    let terminate = driver.terminate_handle();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {e}");
            return;
        }
        tracing::info!("Ctrl-C received; stopping after the current cycle");
        terminate.store(true, Ordering::SeqCst);
    });

    driver.run().await;

    if let Some(path) = save_path {
        let snapshot = driver.session().lock().export_snapshot();
        persist::save_snapshot(&path, &snapshot)?;
        tracing::info!(path = %path.display(), "snapshot saved");
    }
    Ok(())
}
