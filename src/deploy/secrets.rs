// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Image pull secret and per-release secret materialization

use crate::constants::{defaults, names};
use crate::deploy::artifacts::RegistryCredentials;
use crate::error::{DeployError, Result};
use crate::kubernetes::api::SecretClient;
use crate::types::release::{Secret as ReleaseSecret, SecretType};
use base64::{engine::general_purpose::STANDARD, Engine};
use k8s_openapi::api::core::v1::{
    EnvVar, EnvVarSource, KeyToPath, ObjectFieldSelector, Secret, SecretKeySelector,
    SecretVolumeSource, Volume, VolumeMount,
};
use kube::api::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::{debug, error, info, instrument, warn};

/// How the materialized secret is wired into pod templates
#[derive(Debug, Clone, Default)]
pub struct SecretProjections {
    pub secret_name: String,
    pub env: Vec<EnvVar>,
    pub volume_mounts: Vec<VolumeMount>,
    pub volumes: Vec<Volume>,
}

/// Legacy `.dockercfg` payload for a single registry
pub fn dockercfg_json(registry: &RegistryCredentials) -> String {
    let auth = STANDARD.encode(format!("{}:{}", registry.user, registry.password));
    serde_json::json!({
        registry.host.as_str(): {
            "username": registry.user,
            "password": registry.password,
            "email": registry.email,
            "auth": auth,
        }
    })
    .to_string()
}

/// Create the `docker-io` pull secret unless the namespace already has one
#[instrument(skip(client, registry))]
pub async fn ensure_image_pull_secret<C>(
    client: &C,
    namespace: &str,
    registry: Option<&RegistryCredentials>,
) -> Result<()>
where
    C: SecretClient + ?Sized,
{
    let existing = client
        .get_secret(namespace, names::IMAGE_PULL_SECRET)
        .await
        .map_err(|e| {
            error!("Error looking up {} secret: {}", names::IMAGE_PULL_SECRET, e);
            DeployError::ImagePullSecretError(format!(
                "Failed to look up {}: {}",
                names::IMAGE_PULL_SECRET,
                e
            ))
        })?;

    if existing.is_some() {
        debug!("Image pull secret already present in {}", namespace);
        return Ok(());
    }

    let Some(registry) = registry else {
        return Err(DeployError::MissingArtifact(
            "registry credentials (user, password, email, host)".to_string(),
        ));
    };

    let secret = Secret {
        metadata: ObjectMeta {
            name: Some(names::IMAGE_PULL_SECRET.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        string_data: Some(BTreeMap::from([(
            names::DOCKERCFG_KEY.to_string(),
            dockercfg_json(registry),
        )])),
        type_: Some("kubernetes.io/dockercfg".to_string()),
        ..Default::default()
    };

    client.create_secret(namespace, &secret).await.map_err(|e| {
        DeployError::ImagePullSecretError(format!(
            "Failed to create {} in {}: {}",
            names::IMAGE_PULL_SECRET,
            namespace,
            e
        ))
    })?;

    info!("Created image pull secret in {}", namespace);
    Ok(())
}

/// Store every release secret in a freshly generated Secret and describe its projections
#[instrument(skip(client, secrets), fields(count = secrets.len()))]
pub async fn materialize_secrets<C>(
    client: &C,
    namespace: &str,
    project_slug: &str,
    secrets: &[ReleaseSecret],
) -> Result<SecretProjections>
where
    C: SecretClient + ?Sized,
{
    if secrets.is_empty() {
        warn!("There were no secrets found for this deploy");
    }

    let data: BTreeMap<String, String> = secrets
        .iter()
        .map(|s| (s.key.clone(), s.value.clone()))
        .collect();

    let secret = Secret {
        metadata: ObjectMeta {
            generate_name: Some(format!("{}-", project_slug)),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        string_data: Some(data),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    };

    let created = client
        .create_secret(namespace, &secret)
        .await
        .map_err(|e| DeployError::SecretCreate(e.to_string()))?;

    let secret_name = created.name_any();
    info!("Created secret {} in {}", secret_name, namespace);
    Ok(project(&secret_name, secrets))
}

/// Env vars for env-type secrets, a read-only mount for file-type secrets
pub fn project(secret_name: &str, secrets: &[ReleaseSecret]) -> SecretProjections {
    let mut env: Vec<EnvVar> = secrets
        .iter()
        .filter(|s| matches!(s.secret_type, SecretType::Env | SecretType::ProtectedEnv))
        .map(|s| EnvVar {
            name: s.key.clone(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: secret_name.to_string(),
                    key: s.key.clone(),
                    optional: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        })
        .collect();
    env.extend(pod_info_env());

    let items: Vec<KeyToPath> = secrets
        .iter()
        .filter(|s| s.secret_type == SecretType::File)
        .map(|s| KeyToPath {
            key: s.key.clone(),
            path: s.key.clone(),
            mode: Some(defaults::SECRET_FILE_MODE),
        })
        .collect();

    SecretProjections {
        secret_name: secret_name.to_string(),
        env,
        volume_mounts: vec![VolumeMount {
            name: secret_name.to_string(),
            mount_path: names::SECRETS_MOUNT_PATH.to_string(),
            read_only: Some(true),
            ..Default::default()
        }],
        volumes: vec![Volume {
            name: secret_name.to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(secret_name.to_string()),
                items: Some(items),
                default_mode: Some(defaults::SECRET_FILE_MODE),
                ..Default::default()
            }),
            ..Default::default()
        }],
    }
}

/// Downward API variables describing the running pod
fn pod_info_env() -> Vec<EnvVar> {
    [
        ("POD_IP", "status.podIP"),
        ("KUBE_NODE_NAME", "spec.nodeName"),
        ("KUBE_POD_NAME", "metadata.name"),
        ("KUBE_POD_NAMESPACE", "metadata.namespace"),
    ]
    .into_iter()
    .map(|(name, path)| EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                field_path: path.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    })
    .collect()
}
