//! Core types for capability-routed external process dispatch.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use osa_core::error::Result;

/// Health of a registered sidecar process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SidecarHealth {
    Starting,
    Ready,
    Degraded,
    Unavailable,
}

impl SidecarHealth {
    /// Ordering used by dispatch to prefer `ready` over `degraded` over
    /// `starting` sidecars providing the same capability.
    pub fn priority_rank(self) -> u8 {
        match self {
            SidecarHealth::Ready => 0,
            SidecarHealth::Degraded => 1,
            SidecarHealth::Starting => 2,
            SidecarHealth::Unavailable => 3,
        }
    }
}

/// A process providing one or more bounded capabilities over request/
/// response IPC (tokenization, embeddings, git, system monitoring, or an
/// MCP server treated as a tool-provider sidecar).
pub trait Sidecar: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn capabilities(&self) -> HashSet<String>;

    fn call(
        &self,
        method: &str,
        params: serde_json::Value,
        timeout: std::time::Duration,
    ) -> BoxFuture<'_, Result<serde_json::Value>>;

    fn health_check(&self) -> BoxFuture<'_, Result<SidecarHealth>>;
}

/// A snapshot row in the sidecar registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarRegistryEntry {
    pub name: String,
    pub health: SidecarHealth,
    pub capabilities: Vec<String>,
    pub updated_at: DateTime<Utc>,
}
