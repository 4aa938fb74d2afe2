//! Capability-routed external process dispatch with health polling and
//! circuit breaking.
//!
//! Sidecars are external processes providing a bounded capability
//! (tokenization, embeddings, git, system monitoring) over request/
//! response IPC. An MCP server can likewise be registered as a sidecar
//! providing tool capabilities under this same dispatch path.

mod circuit;
mod dispatch;
mod registry;
mod types;

pub use circuit::{CircuitBreaker, CircuitState};
pub use dispatch::dispatch;
pub use registry::{spawn_health_poller, SidecarRegistry};
pub use types::{Sidecar, SidecarHealth, SidecarRegistryEntry};
