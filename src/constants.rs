// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Label keys stamped on every generated pod template
pub mod labels {
    /// Selector label carrying the derived object name
    pub const APP: &str = "app";
    pub const ENVIRONMENT: &str = "environment";
    pub const RELEASE_FEATURE_HASH: &str = "releaseFeatureHash";
    pub const RELEASE_ID: &str = "releaseID";
}

/// Annotation keys read from cluster objects
pub mod annotations {
    /// Revision stamped by the deployment controller on Deployments and ReplicaSets
    pub const REVISION: &str = "deployment.kubernetes.io/revision";
}

/// Well-known object names and mount points
pub mod names {
    /// Image pull secret shared by every pod in a release namespace
    pub const IMAGE_PULL_SECRET: &str = "docker-io";
    /// Key of the legacy docker config inside the pull secret
    pub const DOCKERCFG_KEY: &str = ".dockercfg";
    pub const SECRETS_MOUNT_PATH: &str = "/etc/secrets";
    /// Env var exposing the release service name to its container
    pub const SERVICE_NAME_ENV: &str = "RELEASE_SERVICE_NAME";
    /// Deployments whose name starts with this prefix survive orphan cleanup
    pub const KEEP_PREFIX: &str = "keep";
}

/// Rollout defaults
pub mod defaults {
    pub const POLL_INTERVAL_SECS: u64 = 5;
    pub const DEPLOY_TIMEOUT_SECS: u64 = 600;
    pub const LB_TIMEOUT_SECS: u64 = 90;
    pub const WORKER_QUEUE: usize = 256;
    pub const REVISION_HISTORY_LIMIT: i32 = 10;
    pub const PROGRESS_DEADLINE_SECS: i32 = 300;
    pub const TERMINATION_GRACE_PERIOD_SECS: i64 = 300;
    /// File mode 0400 for projected secret files
    pub const SECRET_FILE_MODE: i32 = 256;
    /// Deadline applied to a failed Job so the cluster terminates it
    pub const FAILED_JOB_DEADLINE_SECS: i64 = 1;
}
