// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! End-to-end reconciliation of one release event.
//!
//! Phases run strictly in order: artifacts, cluster session, namespace and secrets,
//! one-shot Jobs, Deployments, then orphan cleanup. The first failing phase ends the
//! run with a single `failed` status event.

use crate::config::Config;
use crate::deploy::artifacts::DeployArtifacts;
use crate::deploy::jobs::run_one_shots;
use crate::deploy::orphans::cleanup_orphans;
use crate::deploy::pods::PodContext;
use crate::deploy::rollout::{apply_deployment, build_deployment, wait_for_rollout};
use crate::deploy::secrets::{ensure_image_pull_secret, materialize_secrets};
use crate::deploy::unwind::{record_generations, unwind_failed_rollout};
use crate::error::{DeployError, Result};
use crate::kubernetes::services::{
    reconcile_load_balancer, LoadBalancerEndpoint, LoadBalancerSpec,
};
use crate::kubernetes::{ensure_namespace_exists, ClusterConnector, ClusterCredentials};
use crate::types::event::{Action, ReleaseEvent, ServiceStatus, StatusEvent};
use crate::types::release::{
    deployment_name, one_shot_name, Release, Service, ServiceType, State,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};

/// Sends status events for one release event
#[derive(Clone)]
pub struct StatusReporter {
    event_id: String,
    release_id: String,
    tx: mpsc::Sender<StatusEvent>,
}

impl StatusReporter {
    pub fn new(event: &ReleaseEvent, tx: mpsc::Sender<StatusEvent>) -> Self {
        StatusReporter {
            event_id: event.id.clone(),
            release_id: event.release.id.clone(),
            tx,
        }
    }

    async fn send(
        &self,
        state: State,
        message: String,
        code: Option<String>,
        services: Vec<ServiceStatus>,
    ) {
        let event = StatusEvent {
            event_id: self.event_id.clone(),
            release_id: self.release_id.clone(),
            state,
            message,
            code,
            services,
        };
        if let Err(e) = self.tx.send(event).await {
            error!("Failed to send status for release {}: {}", self.release_id, e);
        }
    }

    pub async fn running(&self, message: &str) {
        self.send(State::Running, message.to_string(), None, Vec::new())
            .await;
    }

    pub async fn complete(&self, message: &str, services: Vec<ServiceStatus>) {
        self.send(State::Complete, message.to_string(), None, services)
            .await;
    }

    pub async fn failed(&self, code: &str, message: String, services: Vec<ServiceStatus>) {
        self.send(State::Failed, message, Some(code.to_string()), services)
            .await;
    }
}

/// Services of a release split by how they run
#[derive(Debug, Default)]
struct Plan {
    one_shots: Vec<Service>,
    generals: Vec<Service>,
}

impl Plan {
    fn from_release(release: &Release) -> Result<Self> {
        if release.services.is_empty() {
            return Err(DeployError::NoServices);
        }

        let mut plan = Plan::default();
        for service in &release.services {
            match service.service_type {
                ServiceType::OneShot if release.is_rollback => {
                    info!("Skipping one-shot {} for rollback", service.name);
                }
                ServiceType::OneShot => plan.one_shots.push(service.clone()),
                ServiceType::General => plan.generals.push(service.clone()),
                ServiceType::Unsupported => {
                    return Err(DeployError::ServiceTypeNotSupported(service.name.clone()))
                }
            }
        }
        Ok(plan)
    }

    fn statuses(&self) -> Vec<ServiceStatus> {
        self.one_shots
            .iter()
            .chain(&self.generals)
            .map(ServiceStatus::from)
            .collect()
    }
}

/// Terminal failure as reported on the status channel
#[derive(Debug)]
struct Failure {
    code: &'static str,
    message: String,
}

impl From<DeployError> for Failure {
    fn from(e: DeployError) -> Self {
        Failure {
            code: e.code(),
            message: e.to_string(),
        }
    }
}

/// Drives release events through every deployment phase
pub struct Reconciler {
    connector: Arc<dyn ClusterConnector>,
    config: Config,
}

impl Reconciler {
    pub fn new(connector: Arc<dyn ClusterConnector>, config: Config) -> Self {
        Self { connector, config }
    }

    /// Reconcile one release event, always ending with exactly one terminal status event
    #[instrument(skip_all, fields(event = %event.id, release = %event.release.id))]
    pub async fn handle(&self, event: ReleaseEvent, reporter: &StatusReporter) {
        if event.action == Action::Delete {
            info!("Release deleted, nothing to do");
            reporter
                .complete("Release deleted, nothing to do", Vec::new())
                .await;
            return;
        }

        let prepared = DeployArtifacts::resolve(&event.artifacts)
            .and_then(|artifacts| Ok((artifacts, Plan::from_release(&event.release)?)));
        let (artifacts, mut plan) = match prepared {
            Ok(p) => p,
            Err(e) => {
                error!("Rejecting release: {}", e);
                reporter.failed(e.code(), e.to_string(), Vec::new()).await;
                return;
            }
        };

        match self
            .reconcile(&event.release, &artifacts, &mut plan, reporter)
            .await
        {
            Ok(()) => {
                info!("Release {} deployed", event.release.id);
                reporter.complete("Deploy complete", plan.statuses()).await;
            }
            Err(failure) => {
                error!("Release {} failed: {}", event.release.id, failure.message);
                reporter
                    .failed(failure.code, failure.message, plan.statuses())
                    .await;
            }
        }
    }

    /// Reconcile a load balancer in the release namespace, waiting up to the configured budget
    #[instrument(skip_all, fields(release = %release.id, name = %spec.name))]
    pub async fn load_balancer(
        &self,
        release: &Release,
        credentials: &ClusterCredentials,
        spec: &LoadBalancerSpec,
    ) -> Result<LoadBalancerEndpoint> {
        let session = self.connector.connect(credentials).await?;
        reconcile_load_balancer(
            session.as_ref(),
            &release.namespace(),
            &release.project_slug(),
            spec,
            self.config.poll_interval,
            self.config.lb_timeout,
        )
        .await
    }

    fn rollout_timeout(&self, release: &Release) -> Duration {
        match release.timeout {
            Some(secs) if secs > 0 => Duration::from_secs(secs),
            _ => self.config.deploy_timeout,
        }
    }

    async fn reconcile(
        &self,
        release: &Release,
        artifacts: &DeployArtifacts,
        plan: &mut Plan,
        reporter: &StatusReporter,
    ) -> std::result::Result<(), Failure> {
        let session = self.connector.connect(&artifacts.credentials).await?;
        let cluster = session.as_ref();
        reporter.running("Deploy in-progress").await;

        let slug = release.project_slug();
        let namespace = release.namespace();
        let poll_interval = self.config.poll_interval;
        let timeout = self.rollout_timeout(release);

        ensure_namespace_exists(cluster, &namespace).await?;
        ensure_image_pull_secret(cluster, &namespace, artifacts.registry.as_ref()).await?;
        let projections = materialize_secrets(cluster, &namespace, &slug, &release.secrets).await?;
        reporter.running("Secrets created").await;

        let ctx = PodContext {
            release,
            image: &artifacts.image,
            projections: &projections,
            node_selector: self.config.node_selector.as_ref(),
        };

        run_one_shots(
            cluster,
            &namespace,
            &slug,
            &ctx,
            &mut plan.one_shots,
            poll_interval,
            timeout,
        )
        .await?;

        let generations = record_generations(cluster, &namespace).await?;
        let names: Vec<String> = plan
            .generals
            .iter()
            .map(|s| deployment_name(&slug, &s.name))
            .collect();

        for (service, name) in plan.generals.iter_mut().zip(&names) {
            let desired = build_deployment(&ctx, service, name, release.is_rollback);
            apply_deployment(cluster, &namespace, desired).await?;
            service.set_state(State::Running, format!("Deployment {} applied", name));
        }

        if let Err(e) = wait_for_rollout(
            cluster,
            &namespace,
            &mut plan.generals,
            &names,
            poll_interval,
            timeout,
        )
        .await
        {
            warn!("Rollout failed, unwinding: {}", e);
            let message = match unwind_failed_rollout(cluster, &namespace, &names, &generations)
                .await
            {
                Ok(()) if generations.is_empty() => format!("{} - Unwinding Deploy First Deploy", e),
                Ok(()) => format!("{} - Unwinding Deploy", e),
                Err(unwind) => format!("{} - Unwinding Deploy FAILED", unwind),
            };
            return Err(Failure {
                code: e.code(),
                message,
            });
        }

        let one_shot_names: Vec<String> = release
            .services
            .iter()
            .filter(|s| s.is_one_shot())
            .map(|s| one_shot_name(&slug, &s.name))
            .collect();
        cleanup_orphans(cluster, &namespace, &one_shot_names, &names).await;

        Ok(())
    }
}
