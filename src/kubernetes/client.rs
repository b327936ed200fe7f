// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cluster session creation from kubeconfig artifacts

use crate::error::{DeployError, Result};
use crate::kubernetes::api::Cluster;
use crate::kubernetes::cluster::KubeCluster;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config as KConfig};
use serde_yaml::{Mapping, Value};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Kubeconfig plus the PEM material it refers to
#[derive(Clone, Default)]
pub struct ClusterCredentials {
    pub kubeconfig: String,
    pub client_certificate: String,
    pub client_key: String,
    pub certificate_authority: String,
}

impl std::fmt::Debug for ClusterCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterCredentials")
            .field("kubeconfig_len", &self.kubeconfig.len())
            .finish_non_exhaustive()
    }
}

/// Turns credentials into a live cluster handle
#[async_trait]
pub trait ClusterConnector: Send + Sync {
    async fn connect(&self, credentials: &ClusterCredentials) -> Result<Arc<dyn Cluster>>;
}

/// Connector talking to real API servers
#[derive(Debug, Default, Clone)]
pub struct KubeConnector;

#[async_trait]
impl ClusterConnector for KubeConnector {
    async fn connect(&self, credentials: &ClusterCredentials) -> Result<Arc<dyn Cluster>> {
        let client = create_client(credentials).await?;
        Ok(Arc::new(KubeCluster::new(client)))
    }
}

/// Create a client from the release credentials, falling back to in-cluster config
#[instrument(skip(credentials))]
pub async fn create_client(credentials: &ClusterCredentials) -> Result<Client> {
    match create_client_from_credentials(credentials).await {
        Ok(client) => Ok(client),
        Err(explicit) => {
            warn!(
                "Explicit kubeconfig unusable ({}), trying in-cluster credentials",
                explicit
            );
            let config = KConfig::incluster().map_err(|e| {
                DeployError::KubeconfigError(format!(
                    "{}; in-cluster config also failed: {}",
                    explicit, e
                ))
            })?;
            info!("Using in-cluster credentials");
            Client::try_from(config).map_err(|e| {
                DeployError::KubeconfigError(format!("Failed to create client: {}", e))
            })
        }
    }
}

async fn create_client_from_credentials(credentials: &ClusterCredentials) -> Result<Client> {
    let kubeconfig = inline_credentials(credentials)?;

    let client_config = KConfig::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| DeployError::KubeconfigError(format!("Failed to create config: {}", e)))?;

    Client::try_from(client_config)
        .map_err(|e| DeployError::KubeconfigError(format!("Failed to create client: {}", e)))
}

/// Parse the kubeconfig and embed the PEM artifacts as inline `*-data` fields,
/// replacing any file path references.
pub fn inline_credentials(credentials: &ClusterCredentials) -> Result<Kubeconfig> {
    let mut doc: Value = serde_yaml::from_str(&credentials.kubeconfig)
        .map_err(|e| DeployError::KubeconfigError(format!("Failed to parse kubeconfig: {}", e)))?;

    if !doc.is_mapping() {
        return Err(DeployError::KubeconfigError(
            "Failed to parse kubeconfig: document is not a mapping".to_string(),
        ));
    }

    for user in nested_entries(&mut doc, "users", "user") {
        inline_pem(user, "client-certificate", &credentials.client_certificate);
        inline_pem(user, "client-key", &credentials.client_key);
    }

    for cluster in nested_entries(&mut doc, "clusters", "cluster") {
        inline_pem(cluster, "certificate-authority", &credentials.certificate_authority);
    }

    serde_yaml::from_value(doc)
        .map_err(|e| DeployError::KubeconfigError(format!("Failed to parse kubeconfig: {}", e)))
}

fn nested_entries<'a>(doc: &'a mut Value, list: &str, entry: &str) -> Vec<&'a mut Mapping> {
    let entry = entry.to_string();
    doc.get_mut(list)
        .and_then(Value::as_sequence_mut)
        .map(|items| {
            items
                .iter_mut()
                .filter_map(|item| item.get_mut(entry.as_str()))
                .filter_map(Value::as_mapping_mut)
                .collect()
        })
        .unwrap_or_default()
}

fn inline_pem(section: &mut Mapping, field: &str, pem: &str) {
    if pem.trim().is_empty() {
        return;
    }
    section.remove(field);
    section.insert(
        Value::from(format!("{}-data", field)),
        Value::from(STANDARD.encode(pem.as_bytes())),
    );
}
