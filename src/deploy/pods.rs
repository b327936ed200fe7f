// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Pod templates shared by Jobs and Deployments, and pod health classification

use crate::constants::{defaults, labels, names};
use crate::deploy::secrets::SecretProjections;
use crate::types::release::{ProbeMethod, Release, Service, ServiceHealthProbe};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, ExecAction, HTTPGetAction, HTTPHeader, Lifecycle,
    LifecycleHandler, LocalObjectReference, Pod, PodSpec, PodTemplateSpec, Probe,
    ResourceRequirements, TCPSocketAction,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::warn;

/// Waiting reasons a container never recovers from on its own
const PERMANENT_WAIT_REASONS: &[&str] = &[
    "CrashLoopBackOff",
    "ImageInspectError",
    "ErrImageNeverPull",
    "RegistryUnavailable",
    "InvalidImageName",
];

/// Outcome of inspecting a pod that has a waiting container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodWaiting {
    pub message: String,
    /// True when the pod will wait forever
    pub permanent: bool,
}

/// Classify the waiting containers of a pod, permanent reasons first.
/// `None` when no container is waiting or no statuses are reported yet.
pub fn detect_pod_failure(pod: &Pod) -> Option<PodWaiting> {
    let statuses = pod.status.as_ref()?.container_statuses.as_ref()?;

    let reasons: Vec<String> = statuses
        .iter()
        .filter_map(|status| status.state.as_ref()?.waiting.as_ref())
        .map(|waiting| waiting.reason.clone().unwrap_or_default())
        .collect();

    if let Some(reason) = reasons
        .iter()
        .find(|r| PERMANENT_WAIT_REASONS.contains(&r.as_str()))
    {
        return Some(PodWaiting {
            message: format!(
                "Detected Pod '{}' is waiting forever because of '{}'",
                pod.name_any(),
                reason
            ),
            permanent: true,
        });
    }

    reasons.first().map(|reason| PodWaiting {
        message: format!("Pod '{}' is waiting because '{}'", pod.name_any(), reason),
        permanent: false,
    })
}

/// Probe thresholds used when the service leaves them unset
#[derive(Debug, Clone, Copy)]
struct ProbeDefaults {
    initial_delay_seconds: i32,
    period_seconds: i32,
    success_threshold: i32,
    failure_threshold: i32,
    timeout_seconds: i32,
}

const READINESS_DEFAULTS: ProbeDefaults = ProbeDefaults {
    initial_delay_seconds: 5,
    period_seconds: 10,
    success_threshold: 1,
    failure_threshold: 3,
    timeout_seconds: 1,
};

const LIVENESS_DEFAULTS: ProbeDefaults = ProbeDefaults {
    initial_delay_seconds: 15,
    period_seconds: 20,
    success_threshold: 1,
    failure_threshold: 3,
    timeout_seconds: 1,
};

pub fn readiness_probe(service: &Service) -> Probe {
    health_probe(
        &service
            .readiness_probe
            .clone()
            .unwrap_or_else(|| implicit_probe(service)),
        READINESS_DEFAULTS,
    )
}

pub fn liveness_probe(service: &Service) -> Probe {
    health_probe(
        &service
            .liveness_probe
            .clone()
            .unwrap_or_else(|| implicit_probe(service)),
        LIVENESS_DEFAULTS,
    )
}

/// TCP check on the first listener, or a trivial exec probe without one
fn implicit_probe(service: &Service) -> ServiceHealthProbe {
    match service.tcp_listener() {
        Some(listener) => ServiceHealthProbe {
            method: ProbeMethod::Tcp,
            port: listener.port,
            ..Default::default()
        },
        None => ServiceHealthProbe {
            method: ProbeMethod::Exec,
            command: "/bin/true".to_string(),
            ..Default::default()
        },
    }
}

fn health_probe(probe: &ServiceHealthProbe, defaults: ProbeDefaults) -> Probe {
    let or_default = |value: i32, default: i32| Some(if value > 0 { value } else { default });

    let mut result = Probe {
        initial_delay_seconds: or_default(
            probe.initial_delay_seconds,
            defaults.initial_delay_seconds,
        ),
        period_seconds: or_default(probe.period_seconds, defaults.period_seconds),
        success_threshold: or_default(probe.success_threshold, defaults.success_threshold),
        failure_threshold: or_default(probe.failure_threshold, defaults.failure_threshold),
        timeout_seconds: or_default(probe.timeout_seconds, defaults.timeout_seconds),
        ..Default::default()
    };

    match probe.method {
        ProbeMethod::Http => {
            let headers: Vec<HTTPHeader> = probe
                .http_headers
                .iter()
                .map(|h| HTTPHeader {
                    name: h.name.clone(),
                    value: h.value.clone(),
                })
                .collect();
            let scheme = if probe.scheme.eq_ignore_ascii_case("https") {
                "HTTPS"
            } else {
                "HTTP"
            };
            result.http_get = Some(HTTPGetAction {
                path: Some(probe.path.clone()),
                port: IntOrString::Int(probe.port),
                scheme: Some(scheme.to_string()),
                http_headers: (!headers.is_empty()).then_some(headers),
                ..Default::default()
            });
        }
        ProbeMethod::Exec => {
            result.exec = Some(ExecAction {
                command: Some(probe.command.split_whitespace().map(String::from).collect()),
            });
        }
        ProbeMethod::Tcp => {
            result.tcp_socket = Some(TCPSocketAction {
                port: IntOrString::Int(probe.port),
                ..Default::default()
            });
        }
    }

    result
}

pub fn container_ports(service: &Service) -> Vec<ContainerPort> {
    service
        .listeners
        .iter()
        .map(|l| ContainerPort {
            container_port: l.port,
            protocol: Some(l.protocol.clone()),
            ..Default::default()
        })
        .collect()
}

/// Requests and limits, skipping the ones left empty
pub fn resources(service: &Service) -> ResourceRequirements {
    let list = |cpu: &str, memory: &str| -> Option<BTreeMap<String, Quantity>> {
        let entries: BTreeMap<String, Quantity> = [("cpu", cpu), ("memory", memory)]
            .into_iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .map(|(k, v)| (k.to_string(), Quantity(v.trim().to_string())))
            .collect();
        (!entries.is_empty()).then_some(entries)
    };

    ResourceRequirements {
        limits: list(&service.spec.cpu_limit, &service.spec.memory_limit),
        requests: list(&service.spec.cpu_request, &service.spec.memory_request),
        ..Default::default()
    }
}

/// Shell-word split of the service command into container args
pub fn command_args(command: &str) -> Option<Vec<String>> {
    if command.trim().is_empty() {
        return None;
    }
    match shlex::split(command) {
        Some(args) => Some(args),
        None => {
            warn!("Command '{}' has unbalanced quotes, splitting on whitespace", command);
            Some(command.split_whitespace().map(String::from).collect())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    Deployment,
    Job,
}

/// Release-wide inputs shared by every pod template of one reconciliation
#[derive(Debug, Clone, Copy)]
pub struct PodContext<'a> {
    pub release: &'a Release,
    pub image: &'a str,
    pub projections: &'a SecretProjections,
    pub node_selector: Option<&'a BTreeMap<String, String>>,
}

impl PodContext<'_> {
    /// Build the pod template for `service`, labelled with the derived `name`
    pub fn template(&self, service: &Service, name: &str, kind: WorkloadKind) -> PodTemplateSpec {
        let mut env: Vec<EnvVar> = self.projections.env.clone();
        env.push(EnvVar {
            name: names::SERVICE_NAME_ENV.to_string(),
            value: Some(service.name.clone()),
            ..Default::default()
        });

        let ports = container_ports(service);
        let mut container = Container {
            name: service.name.to_lowercase(),
            image: Some(self.image.to_string()),
            image_pull_policy: Some("IfNotPresent".to_string()),
            args: command_args(&service.command),
            ports: (!ports.is_empty()).then_some(ports),
            resources: Some(resources(service)),
            env: Some(env),
            volume_mounts: Some(self.projections.volume_mounts.clone()),
            ..Default::default()
        };

        if kind == WorkloadKind::Deployment {
            container.readiness_probe = Some(readiness_probe(service));
            container.liveness_probe = Some(liveness_probe(service));
            container.lifecycle = service
                .pre_stop_hook
                .as_deref()
                .filter(|hook| !hook.trim().is_empty())
                .map(|hook| Lifecycle {
                    pre_stop: Some(LifecycleHandler {
                        exec: Some(ExecAction {
                            command: Some(hook.split_whitespace().map(String::from).collect()),
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                });
        }

        let restart_policy = match kind {
            WorkloadKind::Deployment => "Always",
            WorkloadKind::Job => "Never",
        };

        PodTemplateSpec {
            metadata: Some(ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(BTreeMap::from([
                    (labels::APP.to_string(), name.to_string()),
                    (
                        labels::ENVIRONMENT.to_string(),
                        self.release.environment.clone(),
                    ),
                    (
                        labels::RELEASE_FEATURE_HASH.to_string(),
                        self.release.head_feature.hash.clone(),
                    ),
                    (labels::RELEASE_ID.to_string(), self.release.id.clone()),
                ])),
                ..Default::default()
            }),
            spec: Some(PodSpec {
                node_selector: self.node_selector.cloned(),
                termination_grace_period_seconds: Some(
                    service
                        .spec
                        .termination_grace_period_seconds
                        .unwrap_or(defaults::TERMINATION_GRACE_PERIOD_SECS),
                ),
                image_pull_secrets: Some(vec![LocalObjectReference {
                    name: names::IMAGE_PULL_SECRET.to_string(),
                }]),
                containers: vec![container],
                volumes: Some(self.projections.volumes.clone()),
                restart_policy: Some(restart_policy.to_string()),
                dns_policy: Some("ClusterFirst".to_string()),
                ..Default::default()
            }),
        }
    }
}
