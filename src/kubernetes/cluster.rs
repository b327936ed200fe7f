// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! `kube::Client` backed implementation of the cluster capabilities

use crate::kubernetes::api::{
    DeploymentClient, JobClient, NamespaceClient, PodClient, ReplicaSetClient, SecretClient,
    ServiceClient,
};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Namespace, Pod, Secret, Service};
use kube::{
    api::{DeleteParams, ListParams, PostParams},
    Api, Client, ResourceExt,
};

/// Live cluster session
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn namespaced<K>(&self, namespace: &str) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn list_params(selector: Option<&str>) -> ListParams {
    match selector {
        Some(s) => ListParams::default().labels(s),
        None => ListParams::default(),
    }
}

#[async_trait]
impl NamespaceClient for KubeCluster {
    async fn get_namespace(&self, name: &str) -> kube::Result<Option<Namespace>> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        namespaces.get_opt(name).await
    }

    async fn create_namespace(&self, namespace: &Namespace) -> kube::Result<Namespace> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        namespaces.create(&PostParams::default(), namespace).await
    }
}

#[async_trait]
impl SecretClient for KubeCluster {
    async fn get_secret(&self, namespace: &str, name: &str) -> kube::Result<Option<Secret>> {
        self.namespaced::<Secret>(namespace).get_opt(name).await
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> kube::Result<Secret> {
        self.namespaced::<Secret>(namespace)
            .create(&PostParams::default(), secret)
            .await
    }
}

#[async_trait]
impl JobClient for KubeCluster {
    async fn list_jobs(&self, namespace: &str, selector: Option<&str>) -> kube::Result<Vec<Job>> {
        let jobs = self
            .namespaced::<Job>(namespace)
            .list(&list_params(selector))
            .await?;
        Ok(jobs.items)
    }

    async fn get_job(&self, namespace: &str, name: &str) -> kube::Result<Job> {
        self.namespaced::<Job>(namespace).get(name).await
    }

    async fn create_job(&self, namespace: &str, job: &Job) -> kube::Result<Job> {
        self.namespaced::<Job>(namespace)
            .create(&PostParams::default(), job)
            .await
    }

    async fn replace_job(&self, namespace: &str, job: &Job) -> kube::Result<Job> {
        self.namespaced::<Job>(namespace)
            .replace(&job.name_any(), &PostParams::default(), job)
            .await
    }

    async fn delete_job(&self, namespace: &str, name: &str, dp: &DeleteParams) -> kube::Result<()> {
        self.namespaced::<Job>(namespace)
            .delete(name, dp)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl DeploymentClient for KubeCluster {
    async fn list_deployments(&self, namespace: &str) -> kube::Result<Vec<Deployment>> {
        let deployments = self
            .namespaced::<Deployment>(namespace)
            .list(&ListParams::default())
            .await?;
        Ok(deployments.items)
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> kube::Result<Option<Deployment>> {
        self.namespaced::<Deployment>(namespace).get_opt(name).await
    }

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> kube::Result<Deployment> {
        self.namespaced::<Deployment>(namespace)
            .create(&PostParams::default(), deployment)
            .await
    }

    async fn replace_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> kube::Result<Deployment> {
        self.namespaced::<Deployment>(namespace)
            .replace(&deployment.name_any(), &PostParams::default(), deployment)
            .await
    }

    async fn delete_deployment(&self, namespace: &str, name: &str) -> kube::Result<()> {
        self.namespaced::<Deployment>(namespace)
            .delete(name, &DeleteParams::background())
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl ReplicaSetClient for KubeCluster {
    async fn list_replica_sets(
        &self,
        namespace: &str,
        selector: Option<&str>,
    ) -> kube::Result<Vec<ReplicaSet>> {
        let replica_sets = self
            .namespaced::<ReplicaSet>(namespace)
            .list(&list_params(selector))
            .await?;
        Ok(replica_sets.items)
    }

    async fn delete_replica_set(&self, namespace: &str, name: &str) -> kube::Result<()> {
        self.namespaced::<ReplicaSet>(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl PodClient for KubeCluster {
    async fn list_pods(&self, namespace: &str, selector: Option<&str>) -> kube::Result<Vec<Pod>> {
        let pods = self
            .namespaced::<Pod>(namespace)
            .list(&list_params(selector))
            .await?;
        Ok(pods.items)
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> kube::Result<()> {
        self.namespaced::<Pod>(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl ServiceClient for KubeCluster {
    async fn get_service(&self, namespace: &str, name: &str) -> kube::Result<Option<Service>> {
        self.namespaced::<Service>(namespace).get_opt(name).await
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> kube::Result<Service> {
        self.namespaced::<Service>(namespace)
            .create(&PostParams::default(), service)
            .await
    }

    async fn replace_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> kube::Result<Service> {
        self.namespaced::<Service>(namespace)
            .replace(&service.name_any(), &PostParams::default(), service)
            .await
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> kube::Result<()> {
        self.namespaced::<Service>(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
    }
}
