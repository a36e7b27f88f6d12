//! Cancellation-aware stream of dispatched messages.

use super::cancel::CancellationToken;
use super::handle::StateFn;
use crate::core::{Matcher, Message, State};
use crate::store::{StoreError, Subscription};
use futures::channel::mpsc::UnboundedReceiver;
use futures::future::{self, BoxFuture, Either, FutureExt};
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Live, ordered sequence of messages committed after it was opened.
///
/// Messages are queued as they commit, so a wait started after several
/// dispatches still sees each of them in order.
///
/// Obtained from [`EffectHandle::subscribe`](super::EffectHandle::subscribe).
/// Every wait races against the owning execution's cancellation token, so
/// once the effect is done pending waits settle with
/// [`StoreError::Cancelled`] instead of hanging. Dropping the stream releases
/// its store subscription.
///
/// As a [`Stream`] it yields each message and ends at cancellation.
pub struct MessageStream<S> {
    subscription: Subscription,
    queue: Arc<futures::lock::Mutex<UnboundedReceiver<Message>>>,
    state: StateFn<S>,
    token: CancellationToken,
    // Only touched through `&mut self`; the lock keeps the stream `Sync`.
    pending: Mutex<Option<BoxFuture<'static, Result<Message, StoreError>>>>,
    finished: bool,
}

impl<S: State> MessageStream<S> {
    pub(crate) fn new(
        subscription: Subscription,
        queue: UnboundedReceiver<Message>,
        state: StateFn<S>,
        token: CancellationToken,
    ) -> Self {
        Self {
            subscription,
            queue: Arc::new(futures::lock::Mutex::new(queue)),
            state,
            token,
            pending: Mutex::new(None),
            finished: false,
        }
    }

    /// The most recently committed message, if any.
    pub fn last_message(&self) -> Option<Message> {
        self.subscription.last_message()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Take the oldest queued message, waiting for a commit if none is
    /// queued.
    pub fn next_message(&self) -> BoxFuture<'static, Result<Message, StoreError>> {
        let token = self.token.clone();
        let queue = Arc::clone(&self.queue);
        let disposed = self.token.cancelled();
        async move {
            if token.is_cancelled() {
                return Err(StoreError::Cancelled);
            }
            let next = async move { queue.lock().await.next().await }.boxed();
            futures::pin_mut!(disposed);
            match future::select(next, disposed).await {
                Either::Left((Some(message), _)) => Ok(message),
                // The feed is dropped both when the token fires and when the
                // store goes away.
                Either::Left((None, _)) if token.is_cancelled() => Err(StoreError::Cancelled),
                Either::Left((None, _)) => Err(StoreError::Closed),
                Either::Right(_) => Err(StoreError::Cancelled),
            }
        }
        .boxed()
    }

    /// Wait until `predicate` holds for the current state and return that
    /// state.
    pub async fn wait_until<P>(&self, mut predicate: P) -> Result<Arc<S>, StoreError>
    where
        P: FnMut(&S) -> bool,
    {
        self.wait_until_some(|state: &Arc<S>| predicate(state).then(|| Arc::clone(state)))
            .await
    }

    /// Wait until `check` maps the current state to `Some` and return the
    /// mapped value.
    pub async fn wait_until_some<T, F>(&self, mut check: F) -> Result<T, StoreError>
    where
        F: FnMut(&Arc<S>) -> Option<T>,
    {
        loop {
            if self.token.is_cancelled() {
                return Err(StoreError::Cancelled);
            }
            if let Some(found) = check(&(self.state)()) {
                return Ok(found);
            }
            self.next_message().await?;
        }
    }

    /// Wait for the first message accepted by `matcher`.
    pub async fn wait_for<M: Matcher>(&self, matcher: M) -> Result<Message, StoreError> {
        loop {
            let message = self.next_message().await?;
            if matcher.matches(&message) {
                return Ok(message);
            }
        }
    }
}

impl<S: State> Stream for MessageStream<S> {
    type Item = Message;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        if this.pending.get_mut().is_none() {
            let next = this.next_message();
            *this.pending.get_mut() = Some(next);
        }
        let Some(pending) = this.pending.get_mut().as_mut() else {
            return Poll::Ready(None);
        };
        match pending.poll_unpin(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(received) => {
                *this.pending.get_mut() = None;
                match received {
                    Ok(message) => Poll::Ready(Some(message)),
                    Err(_) => {
                        this.finished = true;
                        Poll::Ready(None)
                    }
                }
            }
        }
    }
}

impl<S> Drop for MessageStream<S> {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}
