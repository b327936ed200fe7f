// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test doubles: an in-memory cluster and a canned-response HTTP service for `kube::Client`.

use crate::constants::{annotations, labels};
use crate::error::Result as DeployResult;
use crate::kubernetes::api::{
    Cluster, DeploymentClient, JobClient, NamespaceClient, PodClient, ReplicaSetClient,
    SecretClient, ServiceClient,
};
use crate::kubernetes::client::{ClusterConnector, ClusterCredentials};
use async_trait::async_trait;
use http::{Request, Response};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentStatus, ReplicaSet, ReplicaSetSpec};
use k8s_openapi::api::batch::v1::{Job, JobStatus};
use k8s_openapi::api::core::v1::{
    ContainerState, ContainerStateWaiting, ContainerStatus, LoadBalancerIngress,
    LoadBalancerStatus, Namespace, Pod, PodStatus, Secret, Service, ServiceStatus,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{DeleteParams, ObjectMeta};
use kube::client::Body;
use kube::error::ErrorResponse;
use kube::{Client, ResourceExt};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service as TowerService;

/// How a created Job progresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Fails when the container runs `/bin/false`, succeeds otherwise
    Auto,
    Succeed,
    Fail,
    /// Stays active with a pod stuck in CrashLoopBackOff
    CrashLoop,
    /// Stays active forever with a healthy-looking pod
    Pending,
    /// Completes one more pod on every read, with no pod active in between
    OnePodAtATime,
}

/// How a created or updated Deployment progresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloutOutcome {
    /// Crash loops when the container runs `/bin/false`, available otherwise
    Auto,
    Available,
    NeverAvailable,
    CrashLoop,
}

#[derive(Default)]
struct FakeState {
    namespaces: BTreeMap<String, Namespace>,
    secrets: BTreeMap<(String, String), Secret>,
    jobs: BTreeMap<(String, String), Job>,
    deployments: BTreeMap<(String, String), Deployment>,
    replica_sets: BTreeMap<(String, String), ReplicaSet>,
    pods: BTreeMap<(String, String), Pod>,
    services: BTreeMap<(String, String), Service>,
    calls: Vec<String>,
    failures: HashSet<String>,
    job_outcome: Option<JobOutcome>,
    rollout_outcome: Option<RolloutOutcome>,
    rollout_overrides: HashMap<String, RolloutOutcome>,
    availability: HashMap<String, VecDeque<bool>>,
    lb_hostname: Option<String>,
    counter: u32,
}

/// In-memory cluster that advances object status as soon as objects are written
#[derive(Clone, Default)]
pub struct FakeCluster {
    state: Arc<Mutex<FakeState>>,
}

fn key(namespace: &str, name: &str) -> (String, String) {
    (namespace.to_string(), name.to_string())
}

fn server_error(op: &str) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("injected failure for {}", op),
        reason: "InternalError".to_string(),
        code: 500,
    })
}

fn not_found(name: &str) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("\"{}\" not found", name),
        reason: "NotFound".to_string(),
        code: 404,
    })
}

fn matches_selector(meta: &ObjectMeta, selector: Option<&str>) -> bool {
    let Some(selector) = selector else {
        return true;
    };
    let labels = meta.labels.clone().unwrap_or_default();
    selector.split(',').all(|pair| match pair.split_once('=') {
        Some((k, v)) => labels.get(k.trim()).map(String::as_str) == Some(v.trim()),
        None => labels.contains_key(pair.trim()),
    })
}

fn app_labels(app: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(labels::APP.to_string(), app.to_string())])
}

fn first_args(template: Option<&k8s_openapi::api::core::v1::PodTemplateSpec>) -> Vec<String> {
    template
        .and_then(|t| t.spec.as_ref())
        .and_then(|s| s.containers.first())
        .and_then(|c| c.args.clone())
        .unwrap_or_default()
}

fn runs_false(args: &[String]) -> bool {
    args.first().map(String::as_str) == Some("/bin/false")
}

fn make_pod(
    namespace: &str,
    name: &str,
    app: &str,
    owner: Option<(&str, &str)>,
    waiting_reason: Option<&str>,
) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(app_labels(app)),
            owner_references: owner.map(|(kind, owner_name)| {
                vec![OwnerReference {
                    kind: kind.to_string(),
                    name: owner_name.to_string(),
                    api_version: "apps/v1".to_string(),
                    uid: format!("uid-{}", owner_name),
                    ..Default::default()
                }]
            }),
            ..Default::default()
        },
        status: waiting_reason.map(|reason| PodStatus {
            container_statuses: Some(vec![ContainerStatus {
                name: app.to_string(),
                state: Some(ContainerState {
                    waiting: Some(ContainerStateWaiting {
                        reason: Some(reason.to_string()),
                        message: None,
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace(self, name: &str) -> Self {
        self.lock().namespaces.insert(
            name.to_string(),
            Namespace {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        self
    }

    pub fn with_secret(self, namespace: &str, name: &str) -> Self {
        self.lock().secrets.insert(
            key(namespace, name),
            Secret {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    namespace: Some(namespace.to_string()),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        self
    }

    pub fn with_job(self, namespace: &str, job: Job) -> Self {
        self.lock().jobs.insert(key(namespace, &job.name_any()), job);
        self
    }

    pub fn with_deployment(self, namespace: &str, deployment: Deployment) -> Self {
        self.lock()
            .deployments
            .insert(key(namespace, &deployment.name_any()), deployment);
        self
    }

    pub fn with_replica_set(self, namespace: &str, name: &str, app: &str, revision: &str) -> Self {
        let rs = ReplicaSet {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                labels: Some(app_labels(app)),
                annotations: Some(BTreeMap::from([(
                    annotations::REVISION.to_string(),
                    revision.to_string(),
                )])),
                ..Default::default()
            },
            ..Default::default()
        };
        self.lock().replica_sets.insert(key(namespace, name), rs);
        self
    }

    pub fn with_pod(self, namespace: &str, name: &str, app: &str) -> Self {
        let pod = make_pod(namespace, name, app, None, None);
        self.lock().pods.insert(key(namespace, name), pod);
        self
    }

    pub fn with_service(self, namespace: &str, service: Service) -> Self {
        self.lock()
            .services
            .insert(key(namespace, &service.name_any()), service);
        self
    }

    /// Make every call of the named operation fail with a 500
    pub fn fail_on(self, op: &str) -> Self {
        self.lock().failures.insert(op.to_string());
        self
    }

    pub fn with_job_outcome(self, outcome: JobOutcome) -> Self {
        self.lock().job_outcome = Some(outcome);
        self
    }

    pub fn with_rollout(self, outcome: RolloutOutcome) -> Self {
        self.lock().rollout_outcome = Some(outcome);
        self
    }

    pub fn with_rollout_for(self, deployment: &str, outcome: RolloutOutcome) -> Self {
        self.lock()
            .rollout_overrides
            .insert(deployment.to_string(), outcome);
        self
    }

    /// Script the availability reported by successive reads of a Deployment, the last entry repeats
    pub fn with_availability(self, deployment: &str, script: &[bool]) -> Self {
        self.lock()
            .availability
            .insert(deployment.to_string(), script.iter().copied().collect());
        self
    }

    pub fn with_lb_hostname(self, hostname: &str) -> Self {
        self.lock().lb_hostname = Some(hostname.to_string());
        self
    }

    pub fn has_namespace(&self, name: &str) -> bool {
        self.lock().namespaces.contains_key(name)
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.lock().secrets.get(&key(namespace, name)).cloned()
    }

    pub fn secrets(&self, namespace: &str) -> Vec<Secret> {
        self.lock()
            .secrets
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, s)| s.clone())
            .collect()
    }

    pub fn deployment(&self, namespace: &str, name: &str) -> Option<Deployment> {
        self.lock().deployments.get(&key(namespace, name)).cloned()
    }

    pub fn service(&self, namespace: &str, name: &str) -> Option<Service> {
        self.lock().services.get(&key(namespace, name)).cloned()
    }

    pub fn job_names(&self, namespace: &str) -> Vec<String> {
        self.names(|s| &s.jobs, namespace)
    }

    pub fn replica_set_names(&self, namespace: &str) -> Vec<String> {
        self.names(|s| &s.replica_sets, namespace)
    }

    pub fn pod_names(&self, namespace: &str) -> Vec<String> {
        self.names(|s| &s.pods, namespace)
    }

    /// Every recorded call as `op namespace/name`
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn count_calls(&self, op: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.split(' ').next() == Some(op))
            .count()
    }

    pub fn first_call(&self, op: &str) -> Option<usize> {
        self.lock()
            .calls
            .iter()
            .position(|c| c.split(' ').next() == Some(op))
    }

    pub fn last_call(&self, op: &str) -> Option<usize> {
        self.lock()
            .calls
            .iter()
            .rposition(|c| c.split(' ').next() == Some(op))
    }

    fn names<T>(
        &self,
        pick: impl Fn(&FakeState) -> &BTreeMap<(String, String), T>,
        namespace: &str,
    ) -> Vec<String> {
        let state = self.lock();
        pick(&state)
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, name)| name.clone())
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Record the call and fail it when injected
    fn record(&self, op: &str, namespace: &str, name: &str) -> kube::Result<()> {
        let mut state = self.lock();
        state.calls.push(format!("{} {}/{}", op, namespace, name));
        if state.failures.contains(op) {
            return Err(server_error(op));
        }
        Ok(())
    }

    fn generated_name(state: &mut FakeState, meta: &ObjectMeta) -> String {
        state.counter += 1;
        match (&meta.name, &meta.generate_name) {
            (Some(name), _) if !name.is_empty() => name.clone(),
            (_, Some(prefix)) => format!("{}{:05}", prefix, state.counter),
            _ => format!("object-{:05}", state.counter),
        }
    }

    /// Bump generation and materialize the ReplicaSet and Pods of a written Deployment
    fn roll(
        state: &mut FakeState,
        namespace: &str,
        mut deployment: Deployment,
        previous: Option<&Deployment>,
    ) -> Deployment {
        let name = deployment.name_any();
        let generation = previous.and_then(|d| d.metadata.generation).unwrap_or(0) + 1;
        let replicas = deployment
            .spec
            .as_ref()
            .and_then(|s| s.replicas)
            .unwrap_or(1);
        let template = deployment.spec.as_ref().map(|s| s.template.clone());

        let outcome = state
            .rollout_overrides
            .get(&name)
            .copied()
            .or(state.rollout_outcome)
            .unwrap_or(RolloutOutcome::Auto);
        let outcome = match outcome {
            RolloutOutcome::Auto if runs_false(&first_args(template.as_ref())) => {
                RolloutOutcome::CrashLoop
            }
            RolloutOutcome::Auto => RolloutOutcome::Available,
            other => other,
        };

        let previous_revision = previous
            .and_then(|d| d.annotations().get(annotations::REVISION).cloned())
            .and_then(|r| r.parse::<i64>().ok());
        let template_changed = previous.and_then(|d| d.spec.as_ref()).map(|s| &s.template)
            != template.as_ref();
        let revision = match previous_revision {
            Some(r) if !template_changed => r,
            Some(r) => r + 1,
            None => 1,
        }
        .to_string();

        deployment.metadata.generation = Some(generation);
        deployment.metadata.resource_version = Some(format!("rv-{}", generation));
        deployment
            .metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(annotations::REVISION.to_string(), revision.clone());

        let rs_name = format!("{}-{}", name, revision);
        let stale_pods: Vec<_> = state
            .pods
            .iter()
            .filter(|(_, p)| {
                p.owner_references()
                    .iter()
                    .any(|r| r.kind == "ReplicaSet" && r.name == rs_name)
            })
            .map(|(k, _)| k.clone())
            .collect();
        for k in stale_pods {
            state.pods.remove(&k);
        }
        state.replica_sets.insert(
            key(namespace, &rs_name),
            ReplicaSet {
                metadata: ObjectMeta {
                    name: Some(rs_name.clone()),
                    namespace: Some(namespace.to_string()),
                    labels: Some(app_labels(&name)),
                    annotations: Some(BTreeMap::from([(
                        annotations::REVISION.to_string(),
                        revision.clone(),
                    )])),
                    ..Default::default()
                },
                spec: Some(ReplicaSetSpec {
                    replicas: Some(replicas),
                    template: template.clone(),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );

        let waiting = match outcome {
            RolloutOutcome::CrashLoop => Some("CrashLoopBackOff"),
            RolloutOutcome::NeverAvailable => Some("ContainerCreating"),
            _ => None,
        };
        for i in 0..replicas {
            let pod_name = format!("{}-{}", rs_name, i);
            let pod = make_pod(
                namespace,
                &pod_name,
                &name,
                Some(("ReplicaSet", &rs_name)),
                waiting,
            );
            state.pods.insert(key(namespace, &pod_name), pod);
        }

        let available = if outcome == RolloutOutcome::Available {
            replicas
        } else {
            0
        };
        deployment.status = Some(DeploymentStatus {
            observed_generation: Some(generation),
            replicas: Some(replicas),
            updated_replicas: Some(replicas),
            available_replicas: Some(available),
            unavailable_replicas: Some(replicas - available),
            ..Default::default()
        });

        deployment
    }
}

#[async_trait]
impl NamespaceClient for FakeCluster {
    async fn get_namespace(&self, name: &str) -> kube::Result<Option<Namespace>> {
        self.record("get_namespace", "", name)?;
        Ok(self.lock().namespaces.get(name).cloned())
    }

    async fn create_namespace(&self, namespace: &Namespace) -> kube::Result<Namespace> {
        let name = namespace.name_any();
        self.record("create_namespace", "", &name)?;
        self.lock().namespaces.insert(name, namespace.clone());
        Ok(namespace.clone())
    }
}

#[async_trait]
impl SecretClient for FakeCluster {
    async fn get_secret(&self, namespace: &str, name: &str) -> kube::Result<Option<Secret>> {
        self.record("get_secret", namespace, name)?;
        Ok(self.lock().secrets.get(&key(namespace, name)).cloned())
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> kube::Result<Secret> {
        self.record("create_secret", namespace, &secret.name_any())?;
        let mut state = self.lock();
        let mut created = secret.clone();
        created.metadata.name = Some(Self::generated_name(&mut state, &secret.metadata));
        created.metadata.namespace = Some(namespace.to_string());
        state
            .secrets
            .insert(key(namespace, &created.name_any()), created.clone());
        Ok(created)
    }
}

#[async_trait]
impl JobClient for FakeCluster {
    async fn list_jobs(&self, namespace: &str, selector: Option<&str>) -> kube::Result<Vec<Job>> {
        self.record("list_jobs", namespace, selector.unwrap_or("*"))?;
        Ok(self
            .lock()
            .jobs
            .iter()
            .filter(|((ns, _), j)| ns == namespace && matches_selector(&j.metadata, selector))
            .map(|(_, j)| j.clone())
            .collect())
    }

    async fn get_job(&self, namespace: &str, name: &str) -> kube::Result<Job> {
        self.record("get_job", namespace, name)?;
        let mut state = self.lock();
        let one_at_a_time = state.job_outcome == Some(JobOutcome::OnePodAtATime);
        let job = state
            .jobs
            .get_mut(&key(namespace, name))
            .ok_or_else(|| not_found(name))?;
        if one_at_a_time {
            let completions = job.spec.as_ref().and_then(|s| s.completions).unwrap_or(1);
            if let Some(status) = job.status.as_mut() {
                status.succeeded = Some((status.succeeded.unwrap_or(0) + 1).min(completions));
            }
        }
        Ok(job.clone())
    }

    async fn create_job(&self, namespace: &str, job: &Job) -> kube::Result<Job> {
        self.record("create_job", namespace, &job.name_any())?;
        let mut state = self.lock();
        let mut created = job.clone();
        let name = Self::generated_name(&mut state, &job.metadata);
        created.metadata.name = Some(name.clone());
        created.metadata.namespace = Some(namespace.to_string());

        let app = job
            .labels()
            .get(labels::APP)
            .cloned()
            .unwrap_or_else(|| name.clone());
        let completions = job.spec.as_ref().and_then(|s| s.completions).unwrap_or(1);
        let template = job.spec.as_ref().map(|s| s.template.clone());
        let outcome = match state.job_outcome.unwrap_or(JobOutcome::Auto) {
            JobOutcome::Auto if runs_false(&first_args(template.as_ref())) => JobOutcome::Fail,
            JobOutcome::Auto => JobOutcome::Succeed,
            other => other,
        };

        created.status = Some(match outcome {
            JobOutcome::Succeed => JobStatus {
                active: Some(0),
                succeeded: Some(completions),
                ..Default::default()
            },
            JobOutcome::OnePodAtATime => JobStatus {
                active: Some(0),
                ..Default::default()
            },
            JobOutcome::Fail => JobStatus {
                active: Some(0),
                failed: Some(1),
                ..Default::default()
            },
            _ => JobStatus {
                active: Some(1),
                ..Default::default()
            },
        });

        let waiting = match outcome {
            JobOutcome::CrashLoop => Some("CrashLoopBackOff"),
            JobOutcome::Pending => Some("ContainerCreating"),
            _ => None,
        };
        let pod_name = format!("{}-pod", name);
        let pod = make_pod(namespace, &pod_name, &app, Some(("Job", &name)), waiting);
        state.pods.insert(key(namespace, &pod_name), pod);

        state.jobs.insert(key(namespace, &name), created.clone());
        Ok(created)
    }

    async fn replace_job(&self, namespace: &str, job: &Job) -> kube::Result<Job> {
        self.record("replace_job", namespace, &job.name_any())?;
        self.lock()
            .jobs
            .insert(key(namespace, &job.name_any()), job.clone());
        Ok(job.clone())
    }

    async fn delete_job(&self, namespace: &str, name: &str, _dp: &DeleteParams) -> kube::Result<()> {
        self.record("delete_job", namespace, name)?;
        self.lock()
            .jobs
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| not_found(name))
    }
}

#[async_trait]
impl DeploymentClient for FakeCluster {
    async fn list_deployments(&self, namespace: &str) -> kube::Result<Vec<Deployment>> {
        self.record("list_deployments", namespace, "*")?;
        Ok(self
            .lock()
            .deployments
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, d)| d.clone())
            .collect())
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> kube::Result<Option<Deployment>> {
        self.record("get_deployment", namespace, name)?;
        let mut state = self.lock();
        let available = state.availability.get_mut(name).and_then(|script| {
            if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().copied()
            }
        });
        Ok(state
            .deployments
            .get(&key(namespace, name))
            .cloned()
            .map(|mut deployment| {
                if let (Some(available), Some(status)) = (available, deployment.status.as_mut()) {
                    let replicas = status.replicas.unwrap_or(1);
                    let ready = if available { replicas } else { 0 };
                    status.available_replicas = Some(ready);
                    status.unavailable_replicas = Some(replicas - ready);
                }
                deployment
            }))
    }

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> kube::Result<Deployment> {
        let name = deployment.name_any();
        self.record("create_deployment", namespace, &name)?;
        let mut state = self.lock();
        let rolled = Self::roll(&mut state, namespace, deployment.clone(), None);
        state.deployments.insert(key(namespace, &name), rolled.clone());
        Ok(rolled)
    }

    async fn replace_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> kube::Result<Deployment> {
        let name = deployment.name_any();
        self.record("replace_deployment", namespace, &name)?;
        let mut state = self.lock();
        let previous = state
            .deployments
            .get(&key(namespace, &name))
            .cloned()
            .ok_or_else(|| not_found(&name))?;
        let rolled = Self::roll(&mut state, namespace, deployment.clone(), Some(&previous));
        state.deployments.insert(key(namespace, &name), rolled.clone());
        Ok(rolled)
    }

    async fn delete_deployment(&self, namespace: &str, name: &str) -> kube::Result<()> {
        self.record("delete_deployment", namespace, name)?;
        self.lock()
            .deployments
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| not_found(name))
    }
}

#[async_trait]
impl ReplicaSetClient for FakeCluster {
    async fn list_replica_sets(
        &self,
        namespace: &str,
        selector: Option<&str>,
    ) -> kube::Result<Vec<ReplicaSet>> {
        self.record("list_replica_sets", namespace, selector.unwrap_or("*"))?;
        Ok(self
            .lock()
            .replica_sets
            .iter()
            .filter(|((ns, _), rs)| ns == namespace && matches_selector(&rs.metadata, selector))
            .map(|(_, rs)| rs.clone())
            .collect())
    }

    async fn delete_replica_set(&self, namespace: &str, name: &str) -> kube::Result<()> {
        self.record("delete_replica_set", namespace, name)?;
        self.lock()
            .replica_sets
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| not_found(name))
    }
}

#[async_trait]
impl PodClient for FakeCluster {
    async fn list_pods(&self, namespace: &str, selector: Option<&str>) -> kube::Result<Vec<Pod>> {
        self.record("list_pods", namespace, selector.unwrap_or("*"))?;
        Ok(self
            .lock()
            .pods
            .iter()
            .filter(|((ns, _), p)| ns == namespace && matches_selector(&p.metadata, selector))
            .map(|(_, p)| p.clone())
            .collect())
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> kube::Result<()> {
        self.record("delete_pod", namespace, name)?;
        self.lock()
            .pods
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| not_found(name))
    }
}

#[async_trait]
impl ServiceClient for FakeCluster {
    async fn get_service(&self, namespace: &str, name: &str) -> kube::Result<Option<Service>> {
        self.record("get_service", namespace, name)?;
        let mut state = self.lock();
        let hostname = state.lb_hostname.clone();
        Ok(state.services.get_mut(&key(namespace, name)).map(|svc| {
            let is_lb = svc.spec.as_ref().and_then(|s| s.type_.as_deref()) == Some("LoadBalancer");
            if let (true, Some(hostname)) = (is_lb, hostname) {
                svc.status = Some(ServiceStatus {
                    load_balancer: Some(LoadBalancerStatus {
                        ingress: Some(vec![LoadBalancerIngress {
                            hostname: Some(hostname),
                            ..Default::default()
                        }]),
                    }),
                    ..Default::default()
                });
            }
            svc.clone()
        }))
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> kube::Result<Service> {
        let name = service.name_any();
        self.record("create_service", namespace, &name)?;
        let mut state = self.lock();
        state.counter += 1;
        let counter = state.counter;
        let mut created = service.clone();
        if let Some(spec) = created.spec.as_mut() {
            spec.cluster_ip.get_or_insert_with(|| format!("10.96.0.{}", counter));
            if spec.type_.as_deref() == Some("LoadBalancer") {
                for (i, port) in spec.ports.iter_mut().flatten().enumerate() {
                    port.node_port.get_or_insert(30000 + i as i32);
                }
            }
        }
        created.metadata.resource_version = Some(format!("rv-{}", counter));
        state.services.insert(key(namespace, &name), created.clone());
        Ok(created)
    }

    async fn replace_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> kube::Result<Service> {
        let name = service.name_any();
        self.record("replace_service", namespace, &name)?;
        let mut state = self.lock();
        if !state.services.contains_key(&key(namespace, &name)) {
            return Err(not_found(&name));
        }
        state.services.insert(key(namespace, &name), service.clone());
        Ok(service.clone())
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> kube::Result<()> {
        self.record("delete_service", namespace, name)?;
        self.lock()
            .services
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| not_found(name))
    }
}

/// Connector handing out a shared `FakeCluster`
#[derive(Clone, Default)]
pub struct FakeConnector {
    cluster: FakeCluster,
    connects: Arc<Mutex<u32>>,
    fail: bool,
}

impl FakeConnector {
    pub fn new(cluster: FakeCluster) -> Self {
        Self {
            cluster,
            connects: Arc::new(Mutex::new(0)),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn connects(&self) -> u32 {
        *self.connects.lock().unwrap()
    }
}

#[async_trait]
impl ClusterConnector for FakeConnector {
    async fn connect(&self, _credentials: &ClusterCredentials) -> DeployResult<Arc<dyn Cluster>> {
        *self.connects.lock().unwrap() += 1;
        if self.fail {
            return Err(crate::error::DeployError::KubeconfigError(
                "no usable kubeconfig".to_string(),
            ));
        }
        Ok(Arc::new(self.cluster.clone()))
    }
}

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Add a response for GET requests matching the exact path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    /// Add a response for POST requests matching the exact path
    pub fn on_post(self, path: &str, status: u16, body: &str) -> Self {
        self.on("POST", path, status, body)
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses.lock().unwrap().insert(
            (method.to_string(), path.to_string()),
            (status, body.to_string()),
        );
        self
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        self.responses
            .lock()
            .unwrap()
            .get(&(method.to_string(), path.to_string()))
            .cloned()
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl TowerService<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        let (status, body) = self
            .find_response(&method, &path)
            .unwrap_or_else(|| (404, not_found_json("object", &path)));

        Box::pin(async move {
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

/// Create a mock namespace JSON response
pub fn namespace_json(name: &str) -> String {
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {
            "name": name,
            "uid": "test-uid"
        }
    })
    .to_string()
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("{} \"{}\" not found", resource, name),
        "reason": "NotFound",
        "code": 404
    })
    .to_string()
}
