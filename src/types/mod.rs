// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Release model and the events exchanged with the event bus.

pub mod event;
pub mod release;

pub use event::{Action, ReleaseEvent, ServiceStatus, StatusEvent};
pub use release::{Release, Secret, SecretType, Service, ServiceType, State};
