// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Missing required artifact: {0}")]
    MissingArtifact(String),

    #[error("Invalid artifact '{key}': {reason}")]
    InvalidArtifact { key: String, reason: String },

    #[error("Failed to build cluster session: {0}")]
    KubeconfigError(String),

    #[error("Namespace creation failed: {0}")]
    NamespaceError(String),

    #[error("Image pull secret creation failed: {0}")]
    ImagePullSecretError(String),

    #[error("There was an error creating the secret: {0}")]
    SecretCreate(String),

    #[error("Zero services were found in the release")]
    NoServices,

    #[error("Service '{0}' has an unsupported type. Use either 'one-shot' or 'general'")]
    ServiceTypeNotSupported(String),

    #[error("Canceled deployment because one-shot '{0}' is still active. Redeploy your release once the currently running deployment process completes")]
    OneShotActive(String),

    #[error("Failed to list {kind}: {source}")]
    Listing {
        kind: &'static str,
        #[source]
        source: kube::Error,
    },

    #[error("Job has failed to create: {0}")]
    JobCreate(String),

    #[error("Job '{0}' has failed")]
    JobFailed(String),

    #[error("Timeout reached waiting for one-shot '{0}' to finish")]
    JobTimeout(String),

    #[error("Pod is waiting forever: {0}")]
    PodWaitingForever(String),

    #[error("failed to create deployment {name}: {source}")]
    DeploymentCreate {
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("failed to update deployment {name}: {source}")]
    DeploymentUpdate {
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("Timeout reached waiting for all deployments to succeed")]
    DeploymentTimeout,

    #[error("failed to create service {name}: {source}")]
    ServiceCreate {
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("failed to update service {name}: {source}")]
    ServiceUpdate {
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("Failed to find service '{0}' when deleting")]
    ServiceDeleteNotFound(String),

    #[error("Timeout waiting for load balancer hostname for '{0}'")]
    ServiceDnsTimeout(String),
}

impl DeployError {
    /// Stable identifier reported alongside the human readable message.
    pub fn code(&self) -> &'static str {
        match self {
            DeployError::KubeError(_) => "ErrorClusterApi",
            DeployError::MissingArtifact(_) => "ErrorMissingArtifact",
            DeployError::InvalidArtifact { .. } => "ErrorInvalidArtifact",
            DeployError::KubeconfigError(_) => "ErrorKubeconfig",
            DeployError::NamespaceError(_) => "ErrorNamespace",
            DeployError::ImagePullSecretError(_) => "ErrorImagePullSecret",
            DeployError::SecretCreate(_) => "ErrorSecretCreate",
            DeployError::NoServices => "ErrorNoServices",
            DeployError::ServiceTypeNotSupported(_) => "ErrorServiceTypeNotSupported",
            DeployError::OneShotActive(_) => "ErrorOneShotActive",
            DeployError::Listing { .. } => "ErrorListing",
            DeployError::JobCreate(_) => "ErrorJobCreate",
            DeployError::JobFailed(_) => "ErrorJobFailed",
            DeployError::JobTimeout(_) => "ErrorJobTimeout",
            DeployError::PodWaitingForever(_) => "ErrorPodWaitingForever",
            DeployError::DeploymentCreate { .. } => "ErrorDeploymentCreate",
            DeployError::DeploymentUpdate { .. } => "ErrorDeploymentUpdate",
            DeployError::DeploymentTimeout => "ErrorDeploymentTimeout",
            DeployError::ServiceCreate { .. } => "ErrorServiceCreate",
            DeployError::ServiceUpdate { .. } => "ErrorServiceUpdate",
            DeployError::ServiceDeleteNotFound(_) => "ErrorServiceDeleteNotFound",
            DeployError::ServiceDnsTimeout(_) => "ErrorServiceDnsTimeout",
        }
    }
}

/// True when the API server answered with 404 for the requested object.
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 404)
}

pub type Result<T> = std::result::Result<T, DeployError>;
