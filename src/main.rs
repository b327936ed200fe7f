// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use convoy::config::Config;
use convoy::deploy::Reconciler;
use convoy::dispatch::{Dispatcher, DispatcherHandle};
use convoy::kubernetes::KubeConnector;
use convoy::types::event::{ReleaseEvent, StatusEvent};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr, stdout carries status events
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting convoy release reconciler");

    let config = Config::from_env()?;
    info!(
        "Configuration loaded: deploy_timeout={}s poll_interval={}s",
        config.deploy_timeout.as_secs(),
        config.poll_interval.as_secs()
    );

    let reconciler = Reconciler::new(Arc::new(KubeConnector), config.clone());
    let (dispatcher, handle, statuses) = Dispatcher::new(reconciler, &config);

    info!("Reading release events from stdin...");

    tokio::try_join!(
        dispatcher.run(),
        read_events(handle),
        write_statuses(statuses)
    )?;

    info!("All release events processed");
    Ok(())
}

/// Newline-delimited JSON release events
async fn read_events(handle: DispatcherHandle) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ReleaseEvent>(&line) {
            Ok(event) => handle.send(event).await,
            Err(e) => warn!("Skipping malformed release event: {}", e),
        }
    }
    info!("Input closed");
    Ok(())
}

async fn write_statuses(mut statuses: mpsc::Receiver<StatusEvent>) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(status) = statuses.recv().await {
        let mut line = serde_json::to_string(&status)?;
        line.push('\n');
        stdout.write_all(line.as_bytes()).await?;
        stdout.flush().await?;
    }
    Ok(())
}
