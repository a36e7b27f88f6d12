//! Listener subscriptions and the next-message future.

use super::error::{BoxError, StoreError};
use crate::core::Message;
use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

/// Callback notified after every committed dispatch.
///
/// Listeners are identified by their allocation: subscribing the same
/// `Listener` twice bumps a reference count instead of adding a second entry.
pub type Listener = Arc<dyn Fn() -> Result<(), BoxError> + Send + Sync>;

/// Hook run once when a listener entry is removed.
pub type Teardown = Box<dyn FnOnce() + Send>;

/// Wrap a closure as a [`Listener`].
pub fn listener<F>(notify: F) -> Listener
where
    F: Fn() -> Result<(), BoxError> + Send + Sync + 'static,
{
    Arc::new(notify)
}

/// Address of a listener's allocation.
///
/// Only compared against live entries, which keep their listener alive, so
/// the address cannot be reused while it is being matched.
pub(crate) fn listener_key(listener: &Listener) -> usize {
    Arc::as_ptr(listener) as *const () as usize
}

/// Identifies one listener entry for as long as the store exists.
///
/// Assigned from a counter when the entry is created and never reused, so a
/// handle whose entry is gone cannot reach an entry created later.
pub(crate) type EntryId = u64;

/// The capabilities an effect handle and a subscription reach through.
///
/// Implemented by the store kernel and by the wiring bootstrap stub.
pub(crate) trait Port: Send + Sync {
    fn dispatch(self: Arc<Self>, message: Message) -> Result<(), StoreError>;

    fn subscribe(self: Arc<Self>, listener: Listener) -> Result<Subscription, StoreError>;

    fn release(&self, entry: EntryId);

    fn add_teardown(&self, entry: EntryId, teardown: Teardown);

    fn last_message(&self) -> Option<Message>;

    fn next_message(&self) -> NextMessage;
}

struct SubscriptionInner {
    port: Arc<dyn Port>,
    entry: EntryId,
    released: AtomicBool,
}

/// Handle returned by `subscribe`.
///
/// Clones share the same reference: the handle gives its reference back at
/// most once, however many times `unsubscribe` is called on it or its clones.
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<SubscriptionInner>,
}

impl Subscription {
    pub(crate) fn new(port: Arc<dyn Port>, entry: EntryId) -> Self {
        Self {
            inner: Arc::new(SubscriptionInner {
                port,
                entry,
                released: AtomicBool::new(false),
            }),
        }
    }

    /// Give back this handle's reference on the listener.
    pub fn unsubscribe(&self) {
        if !self.inner.released.swap(true, Ordering::AcqRel) {
            self.inner.port.release(self.inner.entry);
        }
    }

    pub fn is_active(&self) -> bool {
        !self.inner.released.load(Ordering::Acquire)
    }

    /// Register a hook to run when the listener entry is removed.
    ///
    /// If the entry is already gone the hook runs immediately.
    pub fn on_unsubscribe<F>(&self, teardown: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner
            .port
            .add_teardown(self.inner.entry, Box::new(teardown));
    }

    /// The most recently committed message, if any.
    pub fn last_message(&self) -> Option<Message> {
        self.inner.port.last_message()
    }

    /// Future resolving with the next committed message.
    pub fn next_message(&self) -> NextMessage {
        self.inner.port.next_message()
    }
}

/// Resolves once with the next message the store commits.
///
/// Resolves with [`StoreError::Closed`] if the store goes away first.
#[must_use = "futures do nothing unless polled"]
pub struct NextMessage {
    pending: Shared<oneshot::Receiver<Message>>,
}

impl NextMessage {
    pub(crate) fn new(pending: Shared<oneshot::Receiver<Message>>) -> Self {
        Self { pending }
    }
}

impl Future for NextMessage {
    type Output = Result<Message, StoreError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.pending
            .poll_unpin(cx)
            .map(|received| received.map_err(|_| StoreError::Closed))
    }
}
