// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! One-shot services run as Jobs, strictly one after the other, before any Deployment is touched.

use crate::constants::{defaults, labels};
use crate::deploy::pods::{detect_pod_failure, PodContext, WorkloadKind};
use crate::error::{DeployError, Result};
use crate::kubernetes::api::{app_selector, JobClient, PodClient};
use crate::types::release::{one_shot_name, Service, State};
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use kube::api::{DeleteParams, ObjectMeta};
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Status counters of a Job, absent values read as zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct JobCounters {
    active: i32,
    succeeded: i32,
    failed: i32,
}

impl JobCounters {
    fn of(job: &Job) -> Self {
        let status = job.status.as_ref();
        JobCounters {
            active: status.and_then(|s| s.active).unwrap_or(0),
            succeeded: status.and_then(|s| s.succeeded).unwrap_or(0),
            failed: status.and_then(|s| s.failed).unwrap_or(0),
        }
    }

    fn untouched(&self) -> bool {
        self.active == 0 && self.succeeded == 0 && self.failed == 0
    }
}

/// A Job that has not started yet or still has active pods blocks a new run
pub fn job_in_flight(job: &Job) -> bool {
    let completions = job.spec.as_ref().and_then(|s| s.completions).unwrap_or(1);
    let counters = JobCounters::of(job);
    completions > 0 && (counters.untouched() || counters.active > 0)
}

pub fn build_job(ctx: &PodContext<'_>, service: &Service, name: &str) -> Job {
    Job {
        metadata: ObjectMeta {
            generate_name: Some(format!("{}-", name)),
            labels: Some(BTreeMap::from([(labels::APP.to_string(), name.to_string())])),
            ..Default::default()
        },
        spec: Some(JobSpec {
            parallelism: Some(1),
            completions: Some(service.replicas),
            template: ctx.template(service, name, WorkloadKind::Job),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Refuse to run while a previous Job is in flight, otherwise remove stale Jobs and their Pods
#[instrument(skip(client))]
async fn clear_previous_jobs<C>(client: &C, namespace: &str, name: &str) -> Result<()>
where
    C: JobClient + PodClient + ?Sized,
{
    let selector = app_selector(name);
    let existing = client
        .list_jobs(namespace, Some(&selector))
        .await
        .map_err(|source| DeployError::Listing {
            kind: "jobs",
            source,
        })?;

    if let Some(active) = existing.iter().find(|job| job_in_flight(job)) {
        error!(
            "Previous one-shot {} is still active, refusing to start a new one",
            active.name_any()
        );
        return Err(DeployError::OneShotActive(active.name_any()));
    }

    let dp = DeleteParams {
        grace_period_seconds: Some(0),
        ..Default::default()
    };
    for job in &existing {
        let job_name = job.name_any();
        if let Err(e) = client.delete_job(namespace, &job_name, &dp).await {
            warn!("Failed to delete job {}: {}", job_name, e);
        }
    }

    if existing.is_empty() {
        return Ok(());
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

    Ok(())
}

/// Mark a failed Job with a short active deadline so the cluster terminates it
async fn terminate_failed_job<C>(client: &C, namespace: &str, mut job: Job)
where
    C: JobClient + ?Sized,
{
    if let Some(spec) = job.spec.as_mut() {
        spec.active_deadline_seconds = Some(defaults::FAILED_JOB_DEADLINE_SECS);
    }
    if let Err(e) = client.replace_job(namespace, &job).await {
        warn!("Failed to set deadline on job {}: {}", job.name_any(), e);
    }
}

/// Run a single one-shot service to completion
#[instrument(skip(client, ctx, service), fields(job = %name))]
pub async fn run_one_shot<C>(
    client: &C,
    namespace: &str,
    ctx: &PodContext<'_>,
    service: &mut Service,
    name: &str,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<()>
where
    C: JobClient + PodClient + ?Sized,
{
    clear_previous_jobs(client, namespace, name).await?;

    let created = client
        .create_job(namespace, &build_job(ctx, service, name))
        .await
        .map_err(|e| DeployError::JobCreate(format!("{}: {}", name, e)))?;
    let job_name = created.name_any();
    info!("Created job {}", job_name);
    service.set_state(State::Running, format!("Job {} created", job_name));

    let selector = app_selector(name);
    let started = Instant::now();
    loop {
        match client.get_job(namespace, &job_name).await {
            Ok(job) => {
                let counters = JobCounters::of(&job);
                debug!(
                    "Job status: active={} succeeded={} failed={}",
                    counters.active, counters.succeeded, counters.failed
                );

                if counters.failed > 0 {
                    terminate_failed_job(client, namespace, job).await;
                    service.set_state(State::Failed, format!("Job {} has failed", job_name));
                    return Err(DeployError::JobFailed(name.to_string()));
                }

                if counters.active == 0 && counters.succeeded >= service.replicas {
                    info!("Job {} completed", job_name);
                    service.set_state(State::Complete, format!("Job {} completed", job_name));
                    return Ok(());
                }
                // No active pod between two completions is not a failure
                if counters.active == 0 && counters.succeeded > 0 {
                    debug!(
                        "Job {} completed {} of {} pods",
                        job_name, counters.succeeded, service.replicas
                    );
                }

                let pods = client
                    .list_pods(namespace, Some(&selector))
                    .await
                    .map_err(|source| DeployError::Listing {
                        kind: "pods",
                        source,
                    })?;
                for waiting in pods.iter().filter_map(detect_pod_failure) {
                    if waiting.permanent {
                        error!("{}", waiting.message);
                        service.set_state(State::Failed, waiting.message.clone());
                        return Err(DeployError::PodWaitingForever(waiting.message));
                    }
                    debug!("{}", waiting.message);
                }
            }
            Err(e) => warn!("Error fetching status of job {}: {}", job_name, e),
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            service.set_state(
                State::Failed,
                format!("Timeout waiting for job {}", job_name),
            );
            return Err(DeployError::JobTimeout(name.to_string()));
        }
        sleep(poll_interval.min(timeout - elapsed)).await;
    }
}

/// Run every one-shot service in order, stopping at the first failure
pub async fn run_one_shots<C>(
    client: &C,
    namespace: &str,
    project_slug: &str,
    ctx: &PodContext<'_>,
    services: &mut [Service],
    poll_interval: Duration,
    timeout: Duration,
) -> Result<()>
where
    C: JobClient + PodClient + ?Sized,
{
    for service in services.iter_mut() {
        let name = one_shot_name(project_slug, &service.name);
        run_one_shot(client, namespace, ctx, service, &name, poll_interval, timeout).await?;
    }
    Ok(())
}
