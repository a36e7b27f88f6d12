//! The store kernel: state slot, dispatch cycle, listeners, effect runs.

use super::error::{DispatchFailure, StoreError};
use super::subscription::{
    listener_key, EntryId, Listener, NextMessage, Port, Subscription, Teardown,
};
use super::view::ScopedView;
use crate::builder::StoreBuilder;
use crate::core::{Context, Message, State, Transition};
use crate::effects::{CancellationToken, EffectHandle, StateFn};
use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// Receives every failure batch collected during one dispatch.
pub type ErrorHook = Arc<dyn Fn(NonEmptyVec<DispatchFailure>) + Send + Sync>;

/// Default error hook: reports each failure as a `tracing` error event.
pub fn report_to_tracing(failures: NonEmptyVec<DispatchFailure>) {
    for failure in failures.iter() {
        tracing::error!(error = %failure, "unhandled failure during dispatch");
    }
}

struct ListenerEntry {
    id: EntryId,
    key: usize,
    notify: Listener,
    refs: usize,
    teardown: Vec<Teardown>,
}

struct Slot<S> {
    state: Arc<S>,
    last_message: Option<Message>,
    next_sender: oneshot::Sender<Message>,
    next_message: Shared<oneshot::Receiver<Message>>,
    listeners: Vec<ListenerEntry>,
    next_entry: EntryId,
}

impl<S> Slot<S> {
    /// Commit a reduction and hand back the sender waiting on this message.
    fn commit(&mut self, state: Arc<S>, message: &Message) -> oneshot::Sender<Message> {
        let (sender, receiver) = oneshot::channel();
        self.state = state;
        self.last_message = Some(message.clone());
        self.next_message = receiver.shared();
        std::mem::replace(&mut self.next_sender, sender)
    }
}

pub(crate) struct StoreInner<S, C> {
    transition: Transition<S, C>,
    context: Arc<C>,
    on_error: ErrorHook,
    locked: AtomicBool,
    slot: Mutex<Slot<S>>,
}

/// Releases the dispatch lock when the cycle ends, including on unwind.
struct CycleGuard<'a>(&'a AtomicBool);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<S: State, C: Context> StoreInner<S, C> {
    fn new(transition: Transition<S, C>, context: C, on_error: ErrorHook) -> Self {
        let state = transition.initial_state();
        let (next_sender, receiver) = oneshot::channel();
        Self {
            transition,
            context: Arc::new(context),
            on_error,
            locked: AtomicBool::new(false),
            slot: Mutex::new(Slot {
                state,
                last_message: None,
                next_sender,
                next_message: receiver.shared(),
                listeners: Vec::new(),
                next_entry: 0,
            }),
        }
    }

    fn get_state(&self) -> Arc<S> {
        Arc::clone(&self.slot.lock().state)
    }

    fn lock_cycle(&self) -> Result<CycleGuard<'_>, StoreError> {
        if self.locked.swap(true, Ordering::AcqRel) {
            return Err(StoreError::Locked);
        }
        Ok(CycleGuard(&self.locked))
    }

    fn run_cycle(self: &Arc<Self>, message: Message) -> Result<(), StoreError> {
        let _cycle = self.lock_cycle()?;

        let previous = self.get_state();
        let mut effects = crate::core::Effects::new();
        let next = self.transition.apply(Some(&previous), &message, &mut effects);
        let queued = effects.into_queue();

        let (waiter, listeners) = {
            let mut slot = self.slot.lock();
            let waiter = slot.commit(next, &message);
            let listeners: Vec<Listener> = slot
                .listeners
                .iter()
                .map(|entry| Arc::clone(&entry.notify))
                .collect();
            (waiter, listeners)
        };
        let _ = waiter.send(message.clone());
        tracing::trace!(
            message = %message.kind(),
            listeners = listeners.len(),
            effects = queued.len(),
            "dispatch committed"
        );

        let mut outcomes: Vec<Validation<(), NonEmptyVec<DispatchFailure>>> =
            Vec::with_capacity(listeners.len() + queued.len());
        for (index, notify) in listeners.iter().enumerate() {
            outcomes.push(match notify() {
                Ok(()) => Validation::success(()),
                Err(error) => Validation::fail(DispatchFailure::Listener {
                    index,
                    error: Arc::new(error),
                }),
            });
        }
        for (index, effect) in queued.into_iter().enumerate() {
            outcomes.push(match self.execute(|handle| effect.run(handle)) {
                Ok(()) => Validation::success(()),
                Err(error) => Validation::fail(DispatchFailure::Effect {
                    index,
                    error: Arc::new(error),
                }),
            });
        }

        if let Validation::Failure(failures) = Validation::all_vec(outcomes) {
            (self.on_error)(failures);
        }
        Ok(())
    }

    fn handle(self: &Arc<Self>, token: CancellationToken) -> EffectHandle<S, C> {
        let me = Arc::clone(self);
        let state: StateFn<S> = Arc::new(move || me.get_state());
        EffectHandle::new(
            state,
            Arc::clone(self) as Arc<dyn Port>,
            Some(Arc::clone(&self.context)),
            token,
        )
    }

    fn execute<R, F>(self: &Arc<Self>, routine: F) -> R
    where
        F: FnOnce(EffectHandle<S, C>) -> R,
    {
        let token = CancellationToken::new();
        let _cancel = token.drop_guard();
        routine(self.handle(token.clone()))
    }

    fn subscribe_listener(self: &Arc<Self>, listener: Listener) -> Subscription {
        let key = listener_key(&listener);
        let id = {
            let mut slot = self.slot.lock();
            match slot.listeners.iter_mut().find(|entry| entry.key == key) {
                Some(entry) => {
                    entry.refs += 1;
                    entry.id
                }
                None => {
                    let id = slot.next_entry;
                    slot.next_entry += 1;
                    slot.listeners.push(ListenerEntry {
                        id,
                        key,
                        notify: listener,
                        refs: 1,
                        teardown: Vec::new(),
                    });
                    id
                }
            }
        };
        Subscription::new(Arc::clone(self) as Arc<dyn Port>, id)
    }

    fn listener_count(&self) -> usize {
        self.slot.lock().listeners.len()
    }
}

impl<S: State, C: Context> Port for StoreInner<S, C> {
    fn dispatch(self: Arc<Self>, message: Message) -> Result<(), StoreError> {
        self.run_cycle(message)
    }

    fn subscribe(self: Arc<Self>, listener: Listener) -> Result<Subscription, StoreError> {
        Ok(self.subscribe_listener(listener))
    }

    fn release(&self, id: EntryId) {
        let teardown = {
            let mut slot = self.slot.lock();
            let Some(position) = slot.listeners.iter().position(|entry| entry.id == id) else {
                return;
            };
            let entry = &mut slot.listeners[position];
            entry.refs -= 1;
            if entry.refs > 0 {
                return;
            }
            slot.listeners.remove(position).teardown
        };
        for hook in teardown {
            hook();
        }
    }

    fn add_teardown(&self, id: EntryId, teardown: Teardown) {
        let mut slot = self.slot.lock();
        match slot.listeners.iter_mut().find(|entry| entry.id == id) {
            Some(entry) => entry.teardown.push(teardown),
            None => {
                drop(slot);
                teardown();
            }
        }
    }

    fn last_message(&self) -> Option<Message> {
        self.slot.lock().last_message.clone()
    }

    fn next_message(&self) -> NextMessage {
        NextMessage::new(self.slot.lock().next_message.clone())
    }
}

/// A message-driven state container.
///
/// The store owns one state value and advances it only by running its
/// transition function on dispatched messages. Cloning a store gives another
/// handle to the same state.
///
/// # Dispatch cycle
///
/// 1. Fail with [`StoreError::Locked`] if a cycle is already running.
/// 2. Run the transition with the current state, collecting queued effects.
/// 3. Commit the new state and record the message, resolving everyone
///    waiting on `next_message`.
/// 4. Notify listeners in subscription order, collecting failures.
/// 5. Run queued effects in order, each with its own handle, collecting
///    failures.
/// 6. Forward all collected failures, in one batch, to the error hook.
///
/// The lock covers the whole cycle, so dispatching from a transition, a
/// listener or an effect's synchronous body fails fast.
///
/// # Example
///
/// ```rust
/// use statewire::core::{Effects, Message, MessageType, Transition};
/// use statewire::store::Store;
/// use std::sync::Arc;
///
/// const INC: MessageType = MessageType::from_static("inc");
///
/// let count: Transition<u32> = Transition::new(
///     |state: Option<&Arc<u32>>, message: &Message, _: &mut Effects<u32>| match state {
///         Some(n) if message.is(&INC) => Arc::new(**n + 1),
///         Some(n) => n.clone(),
///         None => Arc::new(0),
///     },
/// );
///
/// let store = Store::new(count, ());
/// for _ in 0..3 {
///     store.dispatch(Message::new(INC)).unwrap();
/// }
/// assert_eq!(*store.get_state(), 3);
/// ```
pub struct Store<S, C = ()> {
    inner: Arc<StoreInner<S, C>>,
}

impl<S: State, C: Context> Store<S, C> {
    /// Create a store that reports dispatch failures through `tracing`.
    pub fn new(transition: Transition<S, C>, context: C) -> Self {
        Self::with_error_hook(transition, context, Arc::new(report_to_tracing))
    }

    /// Create a store that hands dispatch failures to `on_error`.
    pub fn with_error_hook(transition: Transition<S, C>, context: C, on_error: ErrorHook) -> Self {
        Self {
            inner: Arc::new(StoreInner::new(transition, context, on_error)),
        }
    }

    /// Start a [`StoreBuilder`].
    pub fn builder() -> StoreBuilder<S, C> {
        StoreBuilder::new()
    }

    /// Current state snapshot.
    pub fn get_state(&self) -> Arc<S> {
        self.inner.get_state()
    }

    /// The configuration bag handed to every effect.
    pub fn context(&self) -> &C {
        &self.inner.context
    }

    /// Run one dispatch cycle.
    ///
    /// The only error returned is [`StoreError::Locked`]; listener and
    /// effect failures go to the error hook and never undo the commit.
    pub fn dispatch(&self, message: Message) -> Result<(), StoreError> {
        self.inner.run_cycle(message)
    }

    /// Register `listener`, or add a reference if it is already registered.
    pub fn subscribe(&self, listener: Listener) -> Subscription {
        self.inner.subscribe_listener(listener)
    }

    /// Run `routine` now with a fresh handle and cancellation token.
    ///
    /// The token fires as soon as `routine` returns (or unwinds); whatever
    /// it returns is handed back unchanged.
    pub fn execute<R, F>(&self, routine: F) -> R
    where
        F: FnOnce(EffectHandle<S, C>) -> R,
    {
        self.inner.execute(routine)
    }

    /// Like [`Store::execute`], but for a routine that finishes
    /// asynchronously: the token fires when the returned future settles.
    pub async fn execute_async<R, F, Fut>(&self, routine: F) -> R
    where
        F: FnOnce(EffectHandle<S, C>) -> Fut,
        Fut: Future<Output = R>,
    {
        let token = CancellationToken::new();
        let _cancel = token.drop_guard();
        routine(self.inner.handle(token.clone())).await
    }

    /// Read/write view of the slice picked by `selector`.
    pub fn scope<T, F>(&self, selector: F) -> ScopedView<S, T, C>
    where
        T: State,
        F: Fn(&Arc<S>) -> Arc<T> + Send + Sync + 'static,
    {
        ScopedView::new(self.clone(), Arc::new(selector))
    }

    /// Forward a failure batch to the error hook.
    pub fn report(&self, failures: NonEmptyVec<DispatchFailure>) {
        (self.inner.on_error)(failures);
    }

    /// Number of distinct registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listener_count()
    }

    /// Whether a dispatch cycle is running right now.
    pub fn is_dispatching(&self) -> bool {
        self.inner.locked.load(Ordering::Acquire)
    }
}

impl<S, C> Clone for Store<S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: State, C: Context> fmt::Debug for Store<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.get_state())
            .field("listeners", &self.listener_count())
            .finish()
    }
}
