//! Builder for constructing stores.

use crate::builder::error::BuildError;
use crate::core::{Context, State, Transition};
use crate::store::{report_to_tracing, DispatchFailure, ErrorHook, Store};
use std::sync::Arc;
use stillwater::NonEmptyVec;

/// Builder for constructing stores with a fluent API.
pub struct StoreBuilder<S, C = ()> {
    transition: Option<Transition<S, C>>,
    context: Option<C>,
    on_error: Option<ErrorHook>,
}

impl<S: State, C: Context> StoreBuilder<S, C> {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            transition: None,
            context: None,
            on_error: None,
        }
    }

    /// Set the transition (required).
    pub fn transition(mut self, transition: Transition<S, C>) -> Self {
        self.transition = Some(transition);
        self
    }

    /// Set the context handed to every effect (required).
    pub fn context(mut self, context: C) -> Self {
        self.context = Some(context);
        self
    }

    /// Replace the default error hook, which logs each failure through
    /// `tracing`.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(NonEmptyVec<DispatchFailure>) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    /// Build the store, computing its initial state.
    /// Returns an error if required fields are missing.
    pub fn build(self) -> Result<Store<S, C>, BuildError> {
        let transition = self.transition.ok_or(BuildError::MissingTransition)?;
        let context = self.context.ok_or(BuildError::MissingContext)?;
        let on_error = self
            .on_error
            .unwrap_or_else(|| Arc::new(report_to_tracing) as ErrorHook);

        Ok(Store::with_error_hook(transition, context, on_error))
    }
}

impl<S: State, C: Context> Default for StoreBuilder<S, C> {
    fn default() -> Self {
        Self::new()
    }
}
