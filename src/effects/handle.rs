//! Per-execution facade over a store, handed to effect routines.

use super::cancel::CancellationToken;
use super::stream::MessageStream;
use crate::core::{Context, Message, Selector, State};
use crate::store::{listener, Listener, Port, StoreError, Subscription};
use futures::channel::mpsc;
use std::fmt;
use std::sync::Arc;

/// Reads the current state as seen by one handle.
pub(crate) type StateFn<S> = Arc<dyn Fn() -> Arc<S> + Send + Sync>;

/// Capabilities of one effect execution.
///
/// A handle is bound to the store that ran the effect and to a cancellation
/// token that fires as soon as the effect's routine returns. Handles can be
/// narrowed to a slice of the state with [`EffectHandle::scoped`]; scoped
/// handles share the message flow and token of the handle they came from.
pub struct EffectHandle<S, C = ()> {
    state: StateFn<S>,
    port: Arc<dyn Port>,
    context: Option<Arc<C>>,
    token: CancellationToken,
}

impl<S: State, C: Context> EffectHandle<S, C> {
    pub(crate) fn new(
        state: StateFn<S>,
        port: Arc<dyn Port>,
        context: Option<Arc<C>>,
        token: CancellationToken,
    ) -> Self {
        Self {
            state,
            port,
            context,
            token,
        }
    }

    /// Current state, projected to this handle's slice.
    pub fn get_state(&self) -> Arc<S> {
        (self.state)()
    }

    /// Dispatch through the owning store.
    ///
    /// Fails with [`StoreError::Locked`] while the store is inside a
    /// dispatch cycle, which includes the synchronous body of an effect
    /// queued by that dispatch.
    pub fn dispatch(&self, message: Message) -> Result<(), StoreError> {
        Arc::clone(&self.port).dispatch(message)
    }

    /// The store's configuration bag.
    pub fn context(&self) -> Result<&C, StoreError> {
        self.context
            .as_deref()
            .ok_or(StoreError::StubCapability {
                capability: "context",
            })
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Open a message stream over the store.
    ///
    /// Every message committed from now on is queued for the stream, so
    /// back-to-back dispatches are all seen. The stream's subscription is
    /// released when this execution's token fires; any waits still pending
    /// then settle with [`StoreError::Cancelled`].
    pub fn subscribe(&self) -> Result<MessageStream<S>, StoreError> {
        let (sender, queue) = mpsc::unbounded();
        let port = Arc::downgrade(&self.port);
        let feed = listener(move || {
            if let Some(message) = port.upgrade().and_then(|port| port.last_message()) {
                let _ = sender.unbounded_send(message);
            }
            Ok(())
        });
        let subscription = self.subscribe_listener(feed)?;
        Ok(MessageStream::new(
            subscription,
            queue,
            Arc::clone(&self.state),
            self.token.clone(),
        ))
    }

    /// Subscribe a plain listener, released when the token fires.
    pub fn subscribe_listener(&self, listener: Listener) -> Result<Subscription, StoreError> {
        let subscription = Arc::clone(&self.port).subscribe(listener)?;
        let release = subscription.clone();
        self.token.on_cancel(move || release.unsubscribe());
        Ok(subscription)
    }

    /// Narrow this handle to the slice picked by `selector`.
    pub fn scoped<T: State>(&self, selector: Selector<S, T>) -> EffectHandle<T, C> {
        let state = Arc::clone(&self.state);
        EffectHandle {
            state: Arc::new(move || selector(&state())),
            port: Arc::clone(&self.port),
            context: self.context.clone(),
            token: self.token.clone(),
        }
    }

    pub(crate) fn state_reader(&self) -> StateFn<S> {
        Arc::clone(&self.state)
    }
}

impl<S, C> Clone for EffectHandle<S, C> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            port: Arc::clone(&self.port),
            context: self.context.clone(),
            token: self.token.clone(),
        }
    }
}

impl<S, C> fmt::Debug for EffectHandle<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectHandle")
            .field("token", &self.token)
            .field("has_context", &self.context.is_some())
            .finish()
    }
}
