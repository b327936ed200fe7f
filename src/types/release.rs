// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// Progress of a release or one of its services
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Waiting,
    Running,
    Complete,
    Failed,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceAction {
    #[default]
    Create,
    Update,
    #[serde(alias = "delete")]
    Destroy,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub enum ServiceType {
    #[serde(rename = "one-shot")]
    OneShot,
    #[default]
    #[serde(rename = "general")]
    General,
    #[serde(other)]
    Unsupported,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub enum SecretType {
    #[default]
    #[serde(rename = "env")]
    Env,
    #[serde(rename = "protected-env")]
    ProtectedEnv,
    #[serde(rename = "file")]
    File,
    #[serde(rename = "internal")]
    Internal,
    #[serde(other)]
    Other,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default)]
    pub id: String,
    pub repository: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

impl Project {
    /// Slug used as the identity prefix of every derived cluster object
    pub fn slug(&self) -> String {
        match self.slug.as_deref() {
            Some(s) if !s.is_empty() => slugify(s),
            _ => slugify(&self.repository),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Listener {
    pub port: i32,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

fn default_protocol() -> String {
    "TCP".to_string()
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    #[serde(default)]
    pub cpu_request: String,
    #[serde(default)]
    pub cpu_limit: String,
    #[serde(default)]
    pub memory_request: String,
    #[serde(default)]
    pub memory_limit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_grace_period_seconds: Option<i64>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum StrategyType {
    #[default]
    Default,
    Recreate,
    RollingUpdate,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStrategy {
    #[serde(rename = "type", default)]
    pub strategy_type: StrategyType,
    /// Percentage of pods allowed to be unavailable during a rolling update
    #[serde(default)]
    pub max_unavailable: u32,
    /// Percentage of pods allowed above the desired count during a rolling update
    #[serde(default)]
    pub max_surge: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct HttpHeader {
    pub name: String,
    pub value: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMethod {
    Http,
    Exec,
    #[default]
    Tcp,
}

/// User supplied readiness/liveness probe; zero thresholds fall back to defaults
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealthProbe {
    #[serde(default)]
    pub method: ProbeMethod,
    #[serde(default)]
    pub port: i32,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub scheme: String,
    #[serde(default)]
    pub http_headers: Vec<HttpHeader>,
    #[serde(default)]
    pub initial_delay_seconds: i32,
    #[serde(default)]
    pub period_seconds: i32,
    #[serde(default)]
    pub success_threshold: i32,
    #[serde(default)]
    pub failure_threshold: i32,
    #[serde(default)]
    pub timeout_seconds: i32,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub listeners: Vec<Listener>,
    #[serde(default)]
    pub replicas: i32,
    #[serde(rename = "type", default)]
    pub service_type: ServiceType,
    #[serde(default)]
    pub action: ServiceAction,
    #[serde(default)]
    pub spec: ServiceSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_strategy: Option<DeploymentStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness_probe: Option<ServiceHealthProbe>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness_probe: Option<ServiceHealthProbe>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_stop_hook: Option<String>,
    #[serde(default)]
    pub state: State,
    #[serde(default)]
    pub state_message: String,
}

impl Service {
    pub fn is_one_shot(&self) -> bool {
        self.service_type == ServiceType::OneShot
    }

    /// Record a state transition together with its message
    pub fn set_state(&mut self, state: State, message: impl Into<String>) {
        self.state = state;
        self.state_message = message.into();
    }

    /// Replica count to request, forced to zero for destroyed services
    pub fn desired_replicas(&self) -> i32 {
        match self.action {
            ServiceAction::Destroy => 0,
            _ => self.replicas,
        }
    }

    /// First declared listener when it speaks TCP
    pub fn tcp_listener(&self) -> Option<&Listener> {
        self.listeners
            .first()
            .filter(|l| l.protocol.eq_ignore_ascii_case("TCP"))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    pub key: String,
    pub value: String,
    #[serde(rename = "type", default)]
    pub secret_type: SecretType,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    #[serde(default)]
    pub id: String,
    pub project: Project,
    pub environment: String,
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub secrets: Vec<Secret>,
    #[serde(default)]
    pub head_feature: Feature,
    #[serde(default)]
    pub is_rollback: bool,
    /// Rollout budget in seconds, overriding the configured default when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl Release {
    pub fn project_slug(&self) -> String {
        self.project.slug()
    }

    pub fn namespace(&self) -> String {
        namespace_name(&self.environment, &self.project_slug())
    }
}

/// `{environment}-{projectSlug}`
pub fn namespace_name(environment: &str, project_slug: &str) -> String {
    format!("{}-{}", environment, project_slug)
}

/// `{projectSlug}-{serviceName}`
pub fn deployment_name(project_slug: &str, service_name: &str) -> String {
    format!("{}-{}", project_slug, service_name).to_lowercase()
}

/// `os-{projectSlug}-{serviceName}`
pub fn one_shot_name(project_slug: &str, service_name: &str) -> String {
    format!("os-{}-{}", project_slug, service_name).to_lowercase()
}

/// Lowercase ASCII alphanumerics, every other run of characters collapsed to a single `-`
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}
