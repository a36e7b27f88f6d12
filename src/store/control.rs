//! The store-shaped surface shared by stores and scoped views.

use super::error::StoreError;
use super::kernel::Store;
use super::subscription::{Listener, Subscription};
use crate::core::{Context, Message, State};
use crate::effects::EffectHandle;
use std::sync::Arc;

/// What collaborators such as UI bindings need from a store.
///
/// Implemented by [`Store`] and by
/// [`ScopedView`](super::ScopedView), so code written against a slice
/// works the same whether it is handed the whole store or a projection.
pub trait Control<S, C = ()> {
    fn get_state(&self) -> Arc<S>;

    fn dispatch(&self, message: Message) -> Result<(), StoreError>;

    fn subscribe(&self, listener: Listener) -> Subscription;

    fn execute<R, F>(&self, routine: F) -> R
    where
        F: FnOnce(EffectHandle<S, C>) -> R;

    fn context(&self) -> &C;
}

impl<S: State, C: Context> Control<S, C> for Store<S, C> {
    fn get_state(&self) -> Arc<S> {
        Store::get_state(self)
    }

    fn dispatch(&self, message: Message) -> Result<(), StoreError> {
        Store::dispatch(self, message)
    }

    fn subscribe(&self, listener: Listener) -> Subscription {
        Store::subscribe(self, listener)
    }

    fn execute<R, F>(&self, routine: F) -> R
    where
        F: FnOnce(EffectHandle<S, C>) -> R,
    {
        Store::execute(self, routine)
    }

    fn context(&self) -> &C {
        Store::context(self)
    }
}
