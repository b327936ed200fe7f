// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Receives release events and runs each reconciliation on its own task.

use crate::config::Config;
use crate::deploy::{Reconciler, StatusReporter};
use crate::types::event::{ReleaseEvent, StatusEvent};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

/// Fans release events out to reconciliation tasks and funnels their status events back
pub struct Dispatcher {
    reconciler: Arc<Reconciler>,
    event_rx: mpsc::Receiver<ReleaseEvent>,
    status_tx: mpsc::Sender<StatusEvent>,
}

/// Handle to submit release events to the Dispatcher
#[derive(Clone)]
pub struct DispatcherHandle {
    event_tx: mpsc::Sender<ReleaseEvent>,
}

impl DispatcherHandle {
    pub async fn send(&self, event: ReleaseEvent) {
        if let Err(e) = self.event_tx.send(event).await {
            error!("Failed to send event to Dispatcher: {}", e);
        }
    }
}

impl Dispatcher {
    pub fn new(
        reconciler: Reconciler,
        config: &Config,
    ) -> (Self, DispatcherHandle, mpsc::Receiver<StatusEvent>) {
        let (event_tx, event_rx) = mpsc::channel(config.worker_queue);
        let (status_tx, status_rx) = mpsc::channel(config.worker_queue);

        let dispatcher = Self {
            reconciler: Arc::new(reconciler),
            event_rx,
            status_tx,
        };

        (dispatcher, DispatcherHandle { event_tx }, status_rx)
    }

    /// Run until every handle is dropped, then wait for in-flight reconciliations
    pub async fn run(mut self) -> anyhow::Result<()> {
        info!("Dispatcher started, waiting for release events...");

        let mut workers: Vec<JoinHandle<()>> = Vec::new();
        while let Some(event) = self.event_rx.recv().await {
            workers.retain(|w| !w.is_finished());
            workers.push(self.spawn(event));
        }

        info!(
            "Event channel closed, waiting for {} reconciliations to finish",
            workers.len()
        );
        for result in join_all(workers).await {
            if let Err(e) = result {
                error!("Reconciliation task failed: {}", e);
            }
        }

        Ok(())
    }

    #[instrument(skip(self, event), fields(event = %event.id, release = %event.release.id))]
    fn spawn(&self, event: ReleaseEvent) -> JoinHandle<()> {
        debug!("Dispatching {:?} for {}", event.action, event.release.namespace());
        let reconciler = self.reconciler.clone();
        let reporter = StatusReporter::new(&event, self.status_tx.clone());

        tokio::spawn(async move {
            reconciler.handle(event, &reporter).await;
        })
    }
}
