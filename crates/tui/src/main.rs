mod app;

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    sync::Mutex,
};

use hoteldesk_core::{
    config::{self, AppConfig},
    DataWatcher, Ledger,
};
use tokio::sync::mpsc;
use tracing::warn;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    config::ensure_default_config()?;
    let config = AppConfig::load()?;
    init_logging(&config)?;

    let ledger = Ledger::open(&config).context("failed to open data files")?;

    let (data_tx, data_rx) = mpsc::channel(16);
    let watcher = if config.watch_files {
        match DataWatcher::spawn(&config, data_tx) {
            Ok(watcher) => Some(watcher),
            Err(err) => {
                warn!("File watching disabled: {err:#}");
                None
            }
        }
    } else {
        None
    };

    let mut app = app::DeskApp::new(ledger, config);
    if watcher.is_some() {
        app.attach_watcher(data_rx);
    }
    let result = app.run().await;
    drop(watcher);
    result
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let log_dir = config.log_dir();
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;
    let log_path = log_dir.join("hoteldesk.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(())
}
