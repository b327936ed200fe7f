// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Remove Jobs and Deployments left behind by services that were renamed or dropped.
//!
//! Every failure here is logged and swallowed: the release has already rolled out.

use crate::constants::{labels, names};
use crate::kubernetes::api::{DeploymentClient, JobClient, PodClient, ReplicaSetClient};
use kube::api::{DeleteParams, PropagationPolicy};
use kube::ResourceExt;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, error, info, instrument};

#[instrument(skip(client, one_shot_names, deployment_names))]
pub async fn cleanup_orphans<C>(
    client: &C,
    namespace: &str,
    one_shot_names: &[String],
    deployment_names: &[String],
) where
    C: JobClient + DeploymentClient + ReplicaSetClient + PodClient + ?Sized,
{
    let one_shots: HashSet<&str> = one_shot_names.iter().map(String::as_str).collect();
    let current: HashSet<&str> = deployment_names.iter().map(String::as_str).collect();

    cleanup_jobs(client, namespace, &one_shots).await;

    let deployments = match client.list_deployments(namespace).await {
        Ok(d) => d,
        Err(e) => {
            error!("Error listing deployments during cleanup of {}: {}", namespace, e);
            return;
        }
    };

    let orphans: Vec<String> = deployments
        .iter()
        .map(|d| d.name_any())
        .filter(|name| !current.contains(name.as_str()))
        .filter(|name| !name.starts_with(names::KEEP_PREFIX))
        .collect();

    if orphans.is_empty() {
        debug!("No orphaned deployments in {}", namespace);
        return;
    }

    // Preload once, every orphan is matched by its app label
    let replica_sets = client
        .list_replica_sets(namespace, None)
        .await
        .unwrap_or_else(|e| {
            error!("Error retrieving replica sets for {}: {}", namespace, e);
            Vec::new()
        });
    let pods = client.list_pods(namespace, None).await.unwrap_or_else(|e| {
        error!("Error retrieving pods for {}: {}", namespace, e);
        Vec::new()
    });

    for orphan in &orphans {
        info!("Deleting orphaned deployment {}", orphan);
        if let Err(e) = client.delete_deployment(namespace, orphan).await {
            error!("Error deleting deployment {}: {}", orphan, e);
        }

        for rs in replica_sets.iter().filter(|rs| app_of(rs.labels()) == Some(orphan)) {
            debug!("Deleting orphaned replica set {}", rs.name_any());
            if let Err(e) = client.delete_replica_set(namespace, &rs.name_any()).await {
                error!("Error deleting replica set {}: {}", rs.name_any(), e);
            }
        }

        for pod in pods.iter().filter(|p| app_of(p.labels()) == Some(orphan)) {
            debug!("Deleting orphaned pod {}", pod.name_any());
            if let Err(e) = client.delete_pod(namespace, &pod.name_any()).await {
                error!("Error deleting pod {}: {}", pod.name_any(), e);
            }
        }
    }
}

fn app_of(object_labels: &BTreeMap<String, String>) -> Option<&String> {
    object_labels.get(labels::APP)
}

/// Jobs whose app label matches none of the current one-shot services
async fn cleanup_jobs<C>(client: &C, namespace: &str, one_shots: &HashSet<&str>)
where
    C: JobClient + ?Sized,
{
    let jobs = match client.list_jobs(namespace, None).await {
        Ok(jobs) => jobs,
        Err(e) => {
            error!("Failed to list existing jobs in {}: {}", namespace, e);
            return;
        }
    };

    let dp = DeleteParams {
        grace_period_seconds: Some(0),
        propagation_policy: Some(PropagationPolicy::Orphan),
        ..Default::default()
    };

    for job in jobs {
        let app = job.labels().get(labels::APP).map(String::as_str).unwrap_or_default();
        if one_shots.contains(app) {
            continue;
        }
        debug!("Deleting orphaned job {}", job.name_any());
        if let Err(e) = client.delete_job(namespace, &job.name_any(), &dp).await {
            error!("Failed to delete orphaned job {}: {}", job.name_any(), e);
        }
    }
}
