// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::defaults;
use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

/// Reconciler configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Overall budget for all Deployments of a release to become available
    pub deploy_timeout: Duration,
    /// Delay between two status polls of Jobs and Deployments
    pub poll_interval: Duration,
    /// Budget for a load balancer hostname to show up
    pub lb_timeout: Duration,
    /// Node selector applied to every generated pod template
    pub node_selector: Option<BTreeMap<String, String>>,
    /// Capacity of the dispatcher's inbound and outbound channels
    pub worker_queue: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            deploy_timeout: Duration::from_secs(defaults::DEPLOY_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(defaults::POLL_INTERVAL_SECS),
            lb_timeout: Duration::from_secs(defaults::LB_TIMEOUT_SECS),
            node_selector: None,
            worker_queue: defaults::WORKER_QUEUE,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let seconds = |key: &str, default: u64| -> Result<Duration> {
            match lookup(key) {
                Some(v) => v
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .with_context(|| format!("{} must be a number of seconds, got '{}'", key, v)),
                None => Ok(Duration::from_secs(default)),
            }
        };

        let node_selector = match lookup("CONVOY_NODE_SELECTOR") {
            Some(raw) if !raw.trim().is_empty() => Some(parse_node_selector(&raw)?),
            _ => None,
        };

        let worker_queue = match lookup("CONVOY_WORKER_QUEUE") {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .with_context(|| format!("CONVOY_WORKER_QUEUE must be a number, got '{}'", v))?,
            None => defaults::WORKER_QUEUE,
        };

        let poll_interval = seconds("CONVOY_POLL_INTERVAL_SECS", defaults::POLL_INTERVAL_SECS)?;
        if poll_interval.is_zero() {
            bail!("CONVOY_POLL_INTERVAL_SECS must be at least 1 second");
        }

        Ok(Config {
            deploy_timeout: seconds("CONVOY_DEPLOY_TIMEOUT_SECS", defaults::DEPLOY_TIMEOUT_SECS)?,
            poll_interval,
            lb_timeout: seconds("CONVOY_LB_TIMEOUT_SECS", defaults::LB_TIMEOUT_SECS)?,
            node_selector,
            worker_queue: worker_queue.max(1),
        })
    }
}

fn parse_node_selector(raw: &str) -> Result<BTreeMap<String, String>> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("CONVOY_NODE_SELECTOR must look like key=value, got '{}'", raw);
    };
    Ok(BTreeMap::from([(key.trim().to_string(), value.trim().to_string())]))
}
