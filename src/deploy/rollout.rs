// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Deployments for general services: create-or-update, then watch until every one is available.

use crate::constants::{annotations, defaults, labels};
use crate::deploy::pods::{detect_pod_failure, PodContext, PodWaiting, WorkloadKind};
use crate::error::{DeployError, Result};
use crate::kubernetes::api::{app_selector, DeploymentClient, PodClient, ReplicaSetClient};
use crate::types::release::{Service, State, StrategyType};
use k8s_openapi::api::apps::v1::{
    Deployment, DeploymentSpec, DeploymentStrategy, RollingUpdateDeployment,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, instrument, warn};

fn rolling_update(max_unavailable: u32, max_surge: u32) -> DeploymentStrategy {
    DeploymentStrategy {
        type_: Some("RollingUpdate".to_string()),
        rolling_update: Some(RollingUpdateDeployment {
            max_unavailable: Some(IntOrString::String(format!("{}%", max_unavailable))),
            max_surge: Some(IntOrString::String(format!("{}%", max_surge))),
        }),
    }
}

pub fn deployment_strategy(service: &Service, rollback: bool) -> DeploymentStrategy {
    if rollback {
        return rolling_update(70, 100);
    }

    match service.deployment_strategy.as_ref() {
        Some(custom) => match custom.strategy_type {
            StrategyType::Recreate => DeploymentStrategy {
                type_: Some("Recreate".to_string()),
                rolling_update: None,
            },
            StrategyType::RollingUpdate => {
                rolling_update(custom.max_unavailable, custom.max_surge)
            }
            StrategyType::Default => rolling_update(30, 60),
        },
        None => rolling_update(30, 60),
    }
}

pub fn build_deployment(
    ctx: &PodContext<'_>,
    service: &Service,
    name: &str,
    rollback: bool,
) -> Deployment {
    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            progress_deadline_seconds: Some(defaults::PROGRESS_DEADLINE_SECS),
            replicas: Some(service.desired_replicas()),
            strategy: Some(deployment_strategy(service, rollback)),
            revision_history_limit: Some(defaults::REVISION_HISTORY_LIMIT),
            template: ctx.template(service, name, WorkloadKind::Deployment),
            selector: LabelSelector {
                match_labels: Some(BTreeMap::from([(
                    labels::APP.to_string(),
                    name.to_string(),
                )])),
                ..Default::default()
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Create the Deployment, or replace it keeping the server's resource version
#[instrument(skip(client, desired), fields(deployment = %desired.name_any()))]
pub async fn apply_deployment<C>(client: &C, namespace: &str, mut desired: Deployment) -> Result<()>
where
    C: DeploymentClient + ?Sized,
{
    let name = desired.name_any();
    match client.get_deployment(namespace, &name).await? {
        Some(existing) => {
            desired.metadata.resource_version = existing.metadata.resource_version.clone();
            client
                .replace_deployment(namespace, &desired)
                .await
                .map_err(|source| DeployError::DeploymentUpdate {
                    name: name.clone(),
                    source,
                })?;
            info!("Updated deployment {}", name);
        }
        None => {
            warn!("Existing deployment not found for {}, creating", name);
            client
                .create_deployment(namespace, &desired)
                .await
                .map_err(|source| DeployError::DeploymentCreate {
                    name: name.clone(),
                    source,
                })?;
            info!("Created deployment {}", name);
        }
    }
    Ok(())
}

/// Observed, updated to the desired count and fully available
pub fn is_rollout_complete(deployment: &Deployment) -> bool {
    let generation = deployment.metadata.generation.unwrap_or(0);
    let desired = deployment.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
    let Some(status) = deployment.status.as_ref() else {
        return false;
    };

    let updated = status.updated_replicas.unwrap_or(0);
    status.observed_generation.unwrap_or(0) >= generation
        && updated == desired
        && status.available_replicas.unwrap_or(0) >= updated
        && status.unavailable_replicas.unwrap_or(0) == 0
}

fn revision(meta: &ObjectMeta) -> Option<&str> {
    meta.annotations
        .as_ref()
        .and_then(|a| a.get(annotations::REVISION))
        .map(String::as_str)
}

/// Look for a permanently waiting pod in the Deployment's current ReplicaSet
async fn check_current_pods<C>(
    client: &C,
    namespace: &str,
    deployment: &Deployment,
) -> Option<PodWaiting>
where
    C: ReplicaSetClient + PodClient + ?Sized,
{
    let name = deployment.name_any();
    let selector = app_selector(&name);
    let latest = revision(&deployment.metadata)?;

    let replica_sets = match client.list_replica_sets(namespace, Some(&selector)).await {
        Ok(rs) => rs,
        Err(e) => {
            warn!("Failed to list replica sets of {}: {}", name, e);
            return None;
        }
    };
    let current = replica_sets
        .iter()
        .find(|rs| revision(&rs.metadata) == Some(latest))?
        .name_any();

    let pods = match client.list_pods(namespace, Some(&selector)).await {
        Ok(pods) => pods,
        Err(e) => {
            warn!("Failed to list pods of {}: {}", name, e);
            return None;
        }
    };

    for pod in pods.iter().filter(|pod| {
        pod.owner_references()
            .iter()
            .any(|r| r.kind == "ReplicaSet" && r.name == current)
    }) {
        match detect_pod_failure(pod) {
            Some(waiting) if waiting.permanent => return Some(waiting),
            Some(waiting) => debug!("{}", waiting.message),
            None => {}
        }
    }
    None
}

/// Poll until every Deployment is complete, a pod waits forever, or the budget runs out
#[instrument(skip(client, services, names))]
pub async fn wait_for_rollout<C>(
    client: &C,
    namespace: &str,
    services: &mut [Service],
    names: &[String],
    poll_interval: Duration,
    timeout: Duration,
) -> Result<()>
where
    C: DeploymentClient + ReplicaSetClient + PodClient + ?Sized,
{
    for service in services.iter_mut() {
        service.set_state(State::Waiting, "Waiting for deployment");
    }

    info!("Waiting {}s for deployments to succeed", timeout.as_secs());
    let started = Instant::now();
    loop {
        let mut complete = 0;

        // Every Deployment is re-read on each pass, success needs all of them at once
        for (service, name) in services.iter_mut().zip(names) {
            let deployment = match client.get_deployment(namespace, name).await {
                Ok(Some(d)) => d,
                Ok(None) => {
                    warn!("Deployment {} not found while waiting", name);
                    service.set_state(State::Waiting, "Waiting for deployment");
                    continue;
                }
                Err(e) => {
                    warn!("Error fetching deployment status for {}: {}", name, e);
                    service.set_state(State::Waiting, "Waiting for deployment");
                    continue;
                }
            };

            if is_rollout_complete(&deployment) {
                complete += 1;
                service.set_state(State::Complete, "Deployment available");
                info!(
                    "{}: {} of {} deployments successful",
                    name,
                    complete,
                    names.len()
                );
                continue;
            }

            if service.state == State::Complete {
                warn!("Deployment {} is no longer available", name);
            }
            service.set_state(State::Waiting, "Waiting for deployment");

            let unavailable = deployment
                .status
                .as_ref()
                .and_then(|s| s.unavailable_replicas)
                .unwrap_or(0);
            if unavailable > 0 {
                if let Some(waiting) = check_current_pods(client, namespace, &deployment).await {
                    error!("{}", waiting.message);
                    service.set_state(State::Failed, waiting.message.clone());
                    return Err(DeployError::PodWaitingForever(waiting.message));
                }
            }
        }

        if complete == services.len() {
            info!("All deployments in {} are available", namespace);
            return Ok(());
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            error!("Timeout reached waiting for all deployments to succeed");
            for service in services.iter_mut().filter(|s| s.state != State::Complete) {
                service.set_state(State::Failed, "Timeout waiting for deployment");
            }
            return Err(DeployError::DeploymentTimeout);
        }
        sleep(poll_interval.min(timeout - elapsed)).await;
    }
}
