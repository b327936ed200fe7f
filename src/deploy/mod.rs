// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod artifacts;
pub mod jobs;
pub mod orphans;
pub mod pipeline;
pub mod pods;
pub mod rollout;
pub mod secrets;
pub mod unwind;

pub use artifacts::DeployArtifacts;
pub use pipeline::{Reconciler, StatusReporter};
