// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::types::release::{Release, Service, State};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Delete,
}

/// Release update delivered by the event bus
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseEvent {
    #[serde(default)]
    pub id: String,
    pub action: Action,
    pub release: Release,
    /// Untyped side channel (image, kubeconfig, registry credentials, ...)
    #[serde(default)]
    pub artifacts: HashMap<String, String>,
}

/// Final state of one service as reported on terminal status events
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub name: String,
    pub state: State,
    pub state_message: String,
}

impl From<&Service> for ServiceStatus {
    fn from(service: &Service) -> Self {
        ServiceStatus {
            name: service.name.clone(),
            state: service.state,
            state_message: service.state_message.clone(),
        }
    }
}

/// Progress report sent back to the event bus
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub event_id: String,
    pub release_id: String,
    pub state: State,
    pub message: String,
    /// Stable error identifier, only set on failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceStatus>,
}

impl StatusEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, State::Complete | State::Failed)
    }
}
