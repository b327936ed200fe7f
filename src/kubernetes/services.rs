// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Load balancer Services fronting a release Deployment.
//!
//! Create-or-update keeps the identity the API server allocated (`resourceVersion`,
//! `clusterIP`, per-port `nodePort`), then external kinds wait for the cloud
//! provider to publish a hostname.

use crate::constants::labels;
use crate::error::{is_not_found, DeployError, Result};
use crate::kubernetes::api::{NamespaceClient, ServiceClient};
use crate::kubernetes::namespaces::ensure_namespace_exists;
use crate::types::release::deployment_name;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument, warn};

const AWS_PREFIX: &str = "service.beta.kubernetes.io/aws-load-balancer-";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoadBalancerKind {
    /// ClusterIP only, reachable as `{name}.{namespace}`
    Internal,
    External,
    /// Cloud load balancer restricted to the private network
    Office,
}

impl LoadBalancerKind {
    fn has_cloud_balancer(self) -> bool {
        !matches!(self, LoadBalancerKind::Internal)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ListenerPair {
    pub port: i32,
    pub container_port: i32,
    /// One of HTTP, HTTPS, SSL, TCP, UDP
    pub protocol: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerSpec {
    pub name: String,
    /// Release service the load balancer routes to
    pub service: String,
    pub kind: LoadBalancerKind,
    pub listener_pairs: Vec<ListenerPair>,
    #[serde(default)]
    pub ssl_cert_arn: Option<String>,
    #[serde(default)]
    pub access_log_bucket: Option<String>,
}

/// Where a reconciled load balancer can be reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBalancerEndpoint {
    pub name: String,
    pub dns: String,
}

fn aws(key: &str) -> String {
    format!("{}{}", AWS_PREFIX, key)
}

/// Build the desired Service for a load balancer spec
pub fn build_service(spec: &LoadBalancerSpec, project_slug: &str) -> Result<Service> {
    let mut annotations = BTreeMap::new();

    let service_type = if spec.kind.has_cloud_balancer() {
        if spec.kind == LoadBalancerKind::Office {
            annotations.insert(aws("internal"), "0.0.0.0/0".to_string());
        }
        annotations.insert(aws("connection-draining-enabled"), "true".to_string());
        annotations.insert(aws("connection-draining-timeout"), "300".to_string());
        annotations.insert(aws("cross-zone-load-balancing-enabled"), "true".to_string());
        if let Some(bucket) = spec.access_log_bucket.as_deref().filter(|b| !b.is_empty()) {
            annotations.insert(aws("access-log-emit-interval"), "5".to_string());
            annotations.insert(aws("access-log-enabled"), "true".to_string());
            annotations.insert(aws("access-log-s3-bucket-name"), bucket.to_string());
            annotations.insert(
                aws("access-log-s3-bucket-prefix"),
                format!("{}/{}", project_slug, spec.service),
            );
        }
        "LoadBalancer"
    } else {
        "ClusterIP"
    };

    let mut ports = Vec::with_capacity(spec.listener_pairs.len());
    let mut ssl_ports = Vec::new();
    for pair in &spec.listener_pairs {
        let upper = pair.protocol.to_uppercase();
        let (backend, protocol) = match upper.as_str() {
            "HTTPS" | "HTTP" => (Some("http"), "TCP"),
            "SSL" | "TCP" => (Some("tcp"), "TCP"),
            "UDP" => (None, "UDP"),
            other => {
                return Err(DeployError::InvalidArtifact {
                    key: "listener_pairs".to_string(),
                    reason: format!("unsupported protocol '{}'", other),
                })
            }
        };
        if let Some(backend) = backend {
            annotations.insert(aws("backend-protocol"), backend.to_string());
        }
        if upper == "HTTPS" || upper == "SSL" {
            ssl_ports.push(pair.port.to_string());
        }
        ports.push(ServicePort {
            name: Some(
                format!("{}-{}-{}", pair.protocol, pair.port, pair.container_port).to_lowercase(),
            ),
            port: pair.port,
            target_port: Some(IntOrString::Int(pair.container_port)),
            protocol: Some(protocol.to_string()),
            ..Default::default()
        });
    }

    if !ssl_ports.is_empty() {
        annotations.insert(aws("ssl-ports"), ssl_ports.join(","));
        annotations.insert(
            aws("ssl-cert"),
            spec.ssl_cert_arn.clone().unwrap_or_default(),
        );
    }

    Ok(Service {
        metadata: ObjectMeta {
            name: Some(spec.name.clone()),
            annotations: Some(annotations),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(BTreeMap::from([(
                labels::APP.to_string(),
                deployment_name(project_slug, &spec.service),
            )])),
            type_: Some(service_type.to_string()),
            ports: Some(ports),
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Carry the server-allocated identity of `existing` over to `desired`
pub fn preserve_identity(desired: &mut Service, existing: &Service) {
    desired.metadata.resource_version = existing.metadata.resource_version.clone();

    let Some(existing_spec) = existing.spec.as_ref() else {
        return;
    };
    let Some(spec) = desired.spec.as_mut() else {
        return;
    };

    spec.cluster_ip = existing_spec.cluster_ip.clone();

    if existing_spec.type_.as_deref() != Some("LoadBalancer") {
        return;
    }
    let existing_ports = existing_spec.ports.as_deref().unwrap_or_default();
    for port in spec.ports.iter_mut().flatten() {
        let name = port.name.as_deref().unwrap_or_default().to_lowercase();
        if let Some(current) = existing_ports
            .iter()
            .find(|p| p.name.as_deref().unwrap_or_default().to_lowercase() == name)
        {
            port.node_port = current.node_port;
        }
    }
}

/// Create or update the load balancer Service and resolve its address
#[instrument(skip(client, spec), fields(name = %spec.name))]
pub async fn reconcile_load_balancer<C>(
    client: &C,
    namespace: &str,
    project_slug: &str,
    spec: &LoadBalancerSpec,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<LoadBalancerEndpoint>
where
    C: NamespaceClient + ServiceClient + ?Sized,
{
    ensure_namespace_exists(client, namespace).await?;

    let mut desired = build_service(spec, project_slug)?;

    match client.get_service(namespace, &spec.name).await? {
        Some(existing) => {
            preserve_identity(&mut desired, &existing);
            client
                .replace_service(namespace, &desired)
                .await
                .map_err(|source| DeployError::ServiceUpdate {
                    name: spec.name.clone(),
                    source,
                })?;
            debug!("Service {} updated", spec.name);
        }
        None => {
            client
                .create_service(namespace, &desired)
                .await
                .map_err(|source| DeployError::ServiceCreate {
                    name: spec.name.clone(),
                    source,
                })?;
            debug!("Service {} created", spec.name);
        }
    }

    let dns = if spec.kind.has_cloud_balancer() {
        wait_for_hostname(client, namespace, &spec.name, poll_interval, timeout).await?
    } else {
        format!("{}.{}", spec.name, namespace)
    };

    info!("Load balancer {} reachable at {}", spec.name, dns);
    Ok(LoadBalancerEndpoint {
        name: spec.name.clone(),
        dns,
    })
}

async fn wait_for_hostname<C>(
    client: &C,
    namespace: &str,
    name: &str,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<String>
where
    C: ServiceClient + ?Sized,
{
    let started = Instant::now();
    loop {
        match client.get_service(namespace, name).await {
            Ok(Some(service)) => {
                let hostname = service
                    .status
                    .and_then(|s| s.load_balancer)
                    .and_then(|lb| lb.ingress)
                    .and_then(|ingress| ingress.into_iter().next())
                    .and_then(|ingress| ingress.hostname);
                if let Some(hostname) = hostname {
                    return Ok(hostname);
                }
            }
            Ok(None) => warn!("Service {} disappeared while waiting for its hostname", name),
            Err(e) => warn!("Error describing service {}: {}", name, e),
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            return Err(DeployError::ServiceDnsTimeout(name.to_string()));
        }
        sleep(poll_interval.min(timeout - elapsed)).await;
    }
}

/// Remove a load balancer Service; a missing Service is an error
#[instrument(skip(client))]
pub async fn delete_load_balancer<C>(client: &C, namespace: &str, name: &str) -> Result<()>
where
    C: ServiceClient + ?Sized,
{
    match client.delete_service(namespace, name).await {
        Ok(()) => {
            info!("Deleted load balancer {}", name);
            Ok(())
        }
        Err(e) if is_not_found(&e) => Err(DeployError::ServiceDeleteNotFound(name.to_string())),
        Err(e) => Err(e.into()),
    }
}
