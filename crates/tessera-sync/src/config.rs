//! Run configuration for the sync engine.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use tessera_catalog_client::RetryPolicy;
use tessera_core::{ClientId, OrgId};
use tessera_directory::RolePrecedence;

/// Retry settings for catalog calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per call including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff.
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,
    /// Delay cap in seconds.
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_secs() -> u64 {
    1
}

fn default_max_delay_secs() -> u64 {
    60
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

impl RetryConfig {
    /// Convert into the client-side retry policy.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay_secs: self.base_delay_secs,
            max_delay_secs: self.max_delay_secs,
        }
    }
}

/// Configuration for a synchronization engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Client to catalog-organization mapping (1:1).
    pub org_map: HashMap<ClientId, OrgId>,
    /// Precedence chains resolving multi-role users to one capacity.
    #[serde(default)]
    pub precedence: RolePrecedence,
    /// Worker-pool width for concurrent fetches and operations.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Token-bucket rate limit for catalog requests.
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u64,
    /// Retry settings for catalog calls.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Run-level wall-clock bound in seconds; operations not started when
    /// it passes are reported as skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_deadline_secs: Option<u64>,
}

fn default_concurrency() -> usize {
    4
}

fn default_requests_per_minute() -> u64 {
    120
}

impl SyncConfig {
    /// Configuration with the given mapping and precedence, defaults for
    /// everything else.
    #[must_use]
    pub fn new(org_map: HashMap<ClientId, OrgId>, precedence: RolePrecedence) -> Self {
        Self {
            org_map,
            precedence,
            concurrency: default_concurrency(),
            requests_per_minute: default_requests_per_minute(),
            retry: RetryConfig::default(),
            run_deadline_secs: None,
        }
    }
}
