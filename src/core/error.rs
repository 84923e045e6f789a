//! Error types for scheduler operations.

use thiserror::Error;

use super::types::{RequestId, WorkerId};

/// Recoverable errors produced by scheduler components.
///
/// Caller-contract violations (empty or duplicate request ids, oversized
/// balance vectors) are not represented here; they panic.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The request is not currently assigned to the worker.
    #[error("request {request} is not assigned to worker {worker}")]
    NotAssigned {
        /// Request named by the caller.
        request: RequestId,
        /// Worker named by the caller.
        worker: WorkerId,
    },
    /// No scheduler is registered under the pool id.
    #[error("unknown pool: {0}")]
    UnknownPool(String),
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A persisted record breaks a state invariant, e.g. a request that is
    /// both queued and running.
    #[error("inconsistent scheduler state: {0}")]
    InconsistentState(String),
    /// State or config could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
