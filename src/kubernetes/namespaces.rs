// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespace management utilities

use crate::error::{DeployError, Result};
use crate::kubernetes::api::NamespaceClient;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::ObjectMeta;
use tracing::{debug, info, instrument};

/// Ensure a namespace exists in the cluster, create if it doesn't.
/// Returns `true` when the namespace had to be created.
#[instrument(skip(client))]
pub async fn ensure_namespace_exists<C>(client: &C, namespace: &str) -> Result<bool>
where
    C: NamespaceClient + ?Sized,
{
    match client.get_namespace(namespace).await {
        Ok(Some(_)) => {
            debug!("Namespace {} already exists", namespace);
            Ok(false)
        }
        Ok(None) => {
            info!("Creating namespace {}", namespace);
            let ns = Namespace {
                metadata: ObjectMeta {
                    name: Some(namespace.to_string()),
                    ..Default::default()
                },
                ..Default::default()
            };
            client.create_namespace(&ns).await.map_err(|e| {
                DeployError::NamespaceError(format!(
                    "Failed to create namespace {}: {}",
                    namespace, e
                ))
            })?;
            info!("Namespace {} created successfully", namespace);
            Ok(true)
        }
        Err(e) => Err(DeployError::NamespaceError(format!(
            "Failed to check namespace {}: {}",
            namespace, e
        ))),
    }
}
