//! Error taxonomy for the navigation engine

use thiserror::Error;

/// Infrastructure errors abort the request; component errors are isolated
/// per-component and downgraded to DEGRADED findings by the orchestrator.
#[derive(Debug, Error)]
pub enum WaypointError {
    /// Backing store unreachable or corrupt. Callers must never treat this
    /// as "no matches".
    #[error("entry store unavailable: {0}")]
    StoreUnavailable(String),

    /// Embedding backend failed after retry exhaustion.
    #[error("embedding backend unavailable after {attempts} attempts: {reason}")]
    EmbeddingUnavailable { attempts: u32, reason: String },

    /// One component exceeded its time budget. Never fatal to the request.
    #[error("component '{0}' timed out")]
    ComponentTimeout(String),

    /// Empty or over-length query text, rejected before any processing.
    #[error("malformed query: {0}")]
    MalformedQuery(String),
}

impl WaypointError {
    /// True for errors that should abort the whole request.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            WaypointError::StoreUnavailable(_) | WaypointError::EmbeddingUnavailable { .. }
        )
    }
}
