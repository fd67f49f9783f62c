//! The substrate handler interface (spec.md §4.1) — the abstract collaborator
//! the core depends on but never implements beyond a reference binding.
//! Concrete bindings (a local subprocess runner, a cloud-lambda runner) are
//! external collaborators; only this trait and its error contract belong to
//! the core.

pub mod local;
pub mod scripted;

use async_trait::async_trait;

/// The substrate's three-way failure classification (spec.md §4.1). The core
/// relies only on this distinction: timeouts and crashes are retried inside
/// the driver (spec.md §4.3), anything else is fatal.
#[derive(Debug, thiserror::Error)]
pub enum SubstrateError {
    #[error("invocation timed out")]
    Timeout,
    #[error("handler crashed: {0}")]
    Crashed(String),
    #[error("substrate error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Pluggable execution backend for one handler invocation.
#[async_trait]
pub trait Substrate: Send + Sync {
    /// Synchronous single-shot execution: given an [`InvocationInput`](crate::wire::InvocationInput)
    /// payload, produces the handler's raw return bytes (still double-JSON
    /// encoded per spec.md §6) or a classified failure.
    async fn invoke(&self, payload: Vec<u8>) -> Result<Vec<u8>, SubstrateError>;

    /// Releases substrate resources. Errors are logged, not returned —
    /// finalization never fails the workload.
    async fn finalize(&self);
}
