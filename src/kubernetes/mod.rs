// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for cluster sessions, namespace management and load balancers.

pub mod api;
pub mod client;
pub mod cluster;
pub mod namespaces;
pub mod services;

pub use api::{
    app_selector, Cluster, DeploymentClient, JobClient, NamespaceClient, PodClient,
    ReplicaSetClient, SecretClient, ServiceClient,
};
pub use client::{ClusterConnector, ClusterCredentials, KubeConnector};
pub use cluster::KubeCluster;
pub use namespaces::ensure_namespace_exists;
