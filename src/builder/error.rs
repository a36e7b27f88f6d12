//! Build errors for the store builder.

use thiserror::Error;

/// Errors that can occur when building a store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("Transition not specified. Call .transition(transition) before .build()")]
    MissingTransition,

    #[error("Context not specified. Call .context(context) before .build(), passing () if the store needs none")]
    MissingContext,
}
