// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Narrow per-resource capabilities the reconciler needs from a cluster.
//!
//! Each trait covers one resource kind keyed by `(namespace, name)` or by a label
//! selector. `KubeCluster` implements them against a real API server; tests
//! substitute an in-memory cluster.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Namespace, Pod, Secret, Service};
use kube::api::DeleteParams;

#[async_trait]
pub trait NamespaceClient: Send + Sync {
    /// `Ok(None)` when the namespace does not exist
    async fn get_namespace(&self, name: &str) -> kube::Result<Option<Namespace>>;
    async fn create_namespace(&self, namespace: &Namespace) -> kube::Result<Namespace>;
}

#[async_trait]
pub trait SecretClient: Send + Sync {
    async fn get_secret(&self, namespace: &str, name: &str) -> kube::Result<Option<Secret>>;
    async fn create_secret(&self, namespace: &str, secret: &Secret) -> kube::Result<Secret>;
}

#[async_trait]
pub trait JobClient: Send + Sync {
    async fn list_jobs(&self, namespace: &str, selector: Option<&str>) -> kube::Result<Vec<Job>>;
    async fn get_job(&self, namespace: &str, name: &str) -> kube::Result<Job>;
    async fn create_job(&self, namespace: &str, job: &Job) -> kube::Result<Job>;
    async fn replace_job(&self, namespace: &str, job: &Job) -> kube::Result<Job>;
    async fn delete_job(&self, namespace: &str, name: &str, dp: &DeleteParams) -> kube::Result<()>;
}

#[async_trait]
pub trait DeploymentClient: Send + Sync {
    async fn list_deployments(&self, namespace: &str) -> kube::Result<Vec<Deployment>>;
    async fn get_deployment(&self, namespace: &str, name: &str)
        -> kube::Result<Option<Deployment>>;
    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> kube::Result<Deployment>;
    async fn replace_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> kube::Result<Deployment>;
    async fn delete_deployment(&self, namespace: &str, name: &str) -> kube::Result<()>;
}

#[async_trait]
pub trait ReplicaSetClient: Send + Sync {
    async fn list_replica_sets(
        &self,
        namespace: &str,
        selector: Option<&str>,
    ) -> kube::Result<Vec<ReplicaSet>>;
    async fn delete_replica_set(&self, namespace: &str, name: &str) -> kube::Result<()>;
}

#[async_trait]
pub trait PodClient: Send + Sync {
    async fn list_pods(&self, namespace: &str, selector: Option<&str>) -> kube::Result<Vec<Pod>>;
    async fn delete_pod(&self, namespace: &str, name: &str) -> kube::Result<()>;
}

#[async_trait]
pub trait ServiceClient: Send + Sync {
    async fn get_service(&self, namespace: &str, name: &str) -> kube::Result<Option<Service>>;
    async fn create_service(&self, namespace: &str, service: &Service) -> kube::Result<Service>;
    async fn replace_service(&self, namespace: &str, service: &Service)
        -> kube::Result<Service>;
    async fn delete_service(&self, namespace: &str, name: &str) -> kube::Result<()>;
}

/// Everything a release reconciliation touches
pub trait Cluster:
    NamespaceClient
    + SecretClient
    + JobClient
    + DeploymentClient
    + ReplicaSetClient
    + PodClient
    + ServiceClient
{
}

impl<T> Cluster for T where
    T: NamespaceClient
        + SecretClient
        + JobClient
        + DeploymentClient
        + ReplicaSetClient
        + PodClient
        + ServiceClient
{
}

/// `app={name}` label selector
pub fn app_selector(name: &str) -> String {
    format!("{}={}", crate::constants::labels::APP, name)
}
