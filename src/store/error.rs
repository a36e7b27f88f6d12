//! Store error types.

use crate::wiring::WireId;
use std::sync::Arc;
use thiserror::Error;

/// Error type user listeners and effects report failures with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised at the call site for misuse or teardown.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("store locked on dispatch")]
    Locked,

    #[error("effect handle capability `{capability}` is unavailable on the wiring probe stub")]
    StubCapability { capability: &'static str },

    #[error("wire {wire} is not mounted under a live wiring root; route the root transition through it first")]
    WireNotMounted { wire: WireId },

    #[error("wiring probe state was read outside of an active wire selector")]
    ProbeMisused,

    #[error("effect was cancelled")]
    Cancelled,

    #[error("store was dropped")]
    Closed,

    #[error("wiring bootstrap failed: {0}")]
    Bootstrap(String),
}

/// A single failure collected during the notify or effect phase of a
/// dispatch.
#[derive(Debug, Clone, Error)]
pub enum DispatchFailure {
    #[error("listener #{index} failed: {error}")]
    Listener { index: usize, error: Arc<BoxError> },

    #[error("effect #{index} failed: {error}")]
    Effect { index: usize, error: Arc<BoxError> },
}

impl DispatchFailure {
    /// The underlying error reported by the listener or effect.
    pub fn error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        match self {
            Self::Listener { error, .. } | Self::Effect { error, .. } => &***error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_error_names_the_condition() {
        assert_eq!(StoreError::Locked.to_string(), "store locked on dispatch");
    }

    #[test]
    fn failure_exposes_source_error() {
        let failure = DispatchFailure::Effect {
            index: 2,
            error: Arc::new("disk full".into()),
        };

        assert_eq!(failure.error().to_string(), "disk full");
        assert_eq!(failure.to_string(), "effect #2 failed: disk full");
    }
}
