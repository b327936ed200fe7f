// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Boundary between the event bus and the reconciler.

pub mod manager;

pub use manager::{Dispatcher, DispatcherHandle};
