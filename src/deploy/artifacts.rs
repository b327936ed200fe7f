// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Typed view over the artifact map attached to a release event

use crate::error::{DeployError, Result};
use crate::kubernetes::ClusterCredentials;
use std::collections::HashMap;

pub const IMAGE: &str = "image";
pub const KUBECONFIG: &str = "kubeconfig";
pub const CLIENT_CERTIFICATE: &str = "client_certificate";
pub const CLIENT_KEY: &str = "client_key";
pub const CERTIFICATE_AUTHORITY: &str = "certificate_authority";
pub const REGISTRY_USER: &str = "user";
pub const REGISTRY_PASSWORD: &str = "password";
pub const REGISTRY_EMAIL: &str = "email";
pub const REGISTRY_HOST: &str = "host";

/// Pull credentials for the image registry
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryCredentials {
    pub user: String,
    pub password: String,
    pub email: String,
    pub host: String,
}

impl std::fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("user", &self.user)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

/// Everything a reconciliation needs from the artifact map, validated once
#[derive(Debug, Clone)]
pub struct DeployArtifacts {
    pub image: String,
    pub credentials: ClusterCredentials,
    /// Only needed when the namespace has no image pull secret yet
    pub registry: Option<RegistryCredentials>,
}

impl DeployArtifacts {
    pub fn resolve(artifacts: &HashMap<String, String>) -> Result<Self> {
        let required = |key: &str| -> Result<String> {
            artifacts
                .get(key)
                .cloned()
                .ok_or_else(|| DeployError::MissingArtifact(key.to_string()))
        };
        let non_blank = |key: &str| -> Result<String> {
            let value = required(key)?;
            if value.trim().is_empty() {
                return Err(DeployError::InvalidArtifact {
                    key: key.to_string(),
                    reason: "value is empty".to_string(),
                });
            }
            Ok(value)
        };

        let image = non_blank(IMAGE)?;
        let credentials = ClusterCredentials {
            kubeconfig: non_blank(KUBECONFIG)?,
            client_certificate: required(CLIENT_CERTIFICATE)?,
            client_key: required(CLIENT_KEY)?,
            certificate_authority: required(CERTIFICATE_AUTHORITY)?,
        };

        Ok(DeployArtifacts {
            image,
            credentials,
            registry: resolve_registry(artifacts)?,
        })
    }
}

/// Registry credentials come as a full set of four or not at all
fn resolve_registry(artifacts: &HashMap<String, String>) -> Result<Option<RegistryCredentials>> {
    let keys = [REGISTRY_USER, REGISTRY_PASSWORD, REGISTRY_EMAIL, REGISTRY_HOST];
    let present: Vec<&str> = keys
        .iter()
        .copied()
        .filter(|k| artifacts.contains_key(*k))
        .collect();

    if present.is_empty() {
        return Ok(None);
    }
    if let Some(missing) = keys.iter().find(|k| !artifacts.contains_key(**k)) {
        return Err(DeployError::MissingArtifact(missing.to_string()));
    }

    let get = |k: &str| artifacts.get(k).cloned().unwrap_or_default();
    Ok(Some(RegistryCredentials {
        user: get(REGISTRY_USER),
        password: get(REGISTRY_PASSWORD),
        email: get(REGISTRY_EMAIL),
        host: get(REGISTRY_HOST),
    }))
}
