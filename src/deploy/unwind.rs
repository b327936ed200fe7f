// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Roll Deployments back after a failed rollout

use crate::constants::annotations;
use crate::error::{is_not_found, DeployError, Result};
use crate::kubernetes::api::{app_selector, DeploymentClient, PodClient, ReplicaSetClient};
use k8s_openapi::api::apps::v1::Deployment;
use kube::ResourceExt;
use std::collections::HashMap;
use tracing::{info, instrument, warn};

/// Revision each Deployment was at before this reconciliation touched it
pub type Generations = HashMap<String, String>;

fn current_revision(deployment: &Deployment) -> Option<String> {
    deployment
        .annotations()
        .get(annotations::REVISION)
        .cloned()
        .or_else(|| deployment.metadata.generation.map(|g| g.to_string()))
}

#[instrument(skip(client))]
pub async fn record_generations<C>(client: &C, namespace: &str) -> Result<Generations>
where
    C: DeploymentClient + ?Sized,
{
    let deployments = client
        .list_deployments(namespace)
        .await
        .map_err(|source| DeployError::Listing {
            kind: "deployments",
            source,
        })?;

    Ok(deployments
        .iter()
        .filter_map(|d| current_revision(d).map(|rev| (d.name_any(), rev)))
        .collect())
}

/// Unwind every named Deployment, continuing past failures and returning the first one
#[instrument(skip(client, names, generations))]
pub async fn unwind_failed_rollout<C>(
    client: &C,
    namespace: &str,
    names: &[String],
    generations: &Generations,
) -> Result<()>
where
    C: DeploymentClient + ReplicaSetClient + PodClient + ?Sized,
{
    let mut first_error = None;
    for name in names {
        if let Err(e) = unwind_deployment(client, namespace, name, generations).await {
            warn!("Failed to unwind deployment {}: {}", name, e);
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}

async fn unwind_deployment<C>(
    client: &C,
    namespace: &str,
    name: &str,
    generations: &Generations,
) -> Result<()>
where
    C: DeploymentClient + ReplicaSetClient + PodClient + ?Sized,
{
    let selector = app_selector(name);
    let replica_sets = client
        .list_replica_sets(namespace, Some(&selector))
        .await
        .map_err(|source| DeployError::Listing {
            kind: "replicasets",
            source,
        })?;

    let Some(mut deployment) = client.get_deployment(namespace, name).await? else {
        warn!("Deployment {} is gone, nothing to unwind", name);
        return Ok(());
    };

    if generations.is_empty() && replica_sets.len() == 1 {
        info!("Removing first deploy of {}", name);
        if let Some(spec) = deployment.spec.as_mut() {
            spec.replicas = Some(0);
        }
        client
            .replace_deployment(namespace, &deployment)
            .await
            .map_err(|source| DeployError::DeploymentUpdate {
                name: name.to_string(),
                source,
            })?;

        match client.delete_deployment(namespace, name).await {
            Err(e) if !is_not_found(&e) => return Err(e.into()),
            _ => {}
        }
        for rs in &replica_sets {
            if let Err(e) = client.delete_replica_set(namespace, &rs.name_any()).await {
                warn!("Failed to delete replica set {}: {}", rs.name_any(), e);
            }
        }
        match client.list_pods(namespace, Some(&selector)).await {
            Ok(pods) => {
                for pod in pods {
                    if let Err(e) = client.delete_pod(namespace, &pod.name_any()).await {
                        warn!("Failed to delete pod {}: {}", pod.name_any(), e);
                    }
                }
            }
            Err(e) => warn!("Failed to list pods of {}: {}", name, e),
        }
        return Ok(());
    }

    let Some(recorded) = generations.get(name) else {
        warn!("No previous revision recorded for {}, leaving it in place", name);
        return Ok(());
    };
    let previous = replica_sets.iter().find(|rs| {
        rs.annotations().get(annotations::REVISION) == Some(recorded)
    });
    let Some(template) = previous
        .and_then(|rs| rs.spec.as_ref())
        .and_then(|spec| spec.template.clone())
    else {
        warn!("Replica set for revision {} of {} not found", recorded, name);
        return Ok(());
    };

    if let Some(spec) = deployment.spec.as_mut() {
        spec.template = template;
    }
    client
        .replace_deployment(namespace, &deployment)
        .await
        .map_err(|source| DeployError::DeploymentUpdate {
            name: name.to_string(),
            source,
        })?;

    info!("Restored {} to revision {}", name, recorded);
    Ok(())
}
