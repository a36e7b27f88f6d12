//! Pure transition functions and the effect queue they write into.

use super::message::{Message, MessageType};
use super::state::{Context, State};
use crate::effects::EffectHandle;
use crate::store::BoxError;
use std::sync::Arc;

/// Projection from a larger state to one of its slices.
pub type Selector<S, T> = Arc<dyn Fn(&Arc<S>) -> Arc<T> + Send + Sync>;

/// Signature of a transition function.
pub type TransitionFn<S, C> =
    dyn Fn(Option<&Arc<S>>, &Message, &mut Effects<S, C>) -> Arc<S> + Send + Sync;

type InitialFn<S> = dyn Fn() -> Arc<S> + Send + Sync;

/// A pure `(previous, message, effects) -> next` function.
///
/// The previous state is `None` at most once per store: when the initial
/// state is computed without a [`with_initial`](Self::with_initial)
/// override. Returning the previous `Arc` unchanged signals "no
/// change", which combinators propagate without allocating.
///
/// # Example
///
/// ```rust
/// use statewire::core::{Effects, Message, MessageType, Transition};
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
/// assert_eq!(*count.initial_state(), 0);
/// ```
pub struct Transition<S, C = ()> {
    apply: Arc<TransitionFn<S, C>>,
    initial: Option<Arc<InitialFn<S>>>,
}

impl<S: State, C: Context> Transition<S, C> {
    pub fn new<F>(apply: F) -> Self
    where
        F: Fn(Option<&Arc<S>>, &Message, &mut Effects<S, C>) -> Arc<S> + Send + Sync + 'static,
    {
        Self {
            apply: Arc::new(apply),
            initial: None,
        }
    }

    /// Supply the initial state directly.
    ///
    /// [`initial_state`](Self::initial_state) then returns `initial()` and
    /// never runs the function with no previous state. Only the initial
    /// state is affected: [`apply`](Self::apply) still runs the function.
    pub fn with_initial<F>(mut self, initial: F) -> Self
    where
        F: Fn() -> Arc<S> + Send + Sync + 'static,
    {
        self.initial = Some(Arc::new(initial));
        self
    }

    /// Run one reduction.
    pub fn apply(
        &self,
        state: Option<&Arc<S>>,
        message: &Message,
        effects: &mut Effects<S, C>,
    ) -> Arc<S> {
        (self.apply)(state, message, effects)
    }

    /// The value supplied through [`with_initial`](Self::with_initial), if any.
    pub(crate) fn initial_override(&self) -> Option<Arc<S>> {
        self.initial.as_ref().map(|initial| initial())
    }

    /// Compute the initial state.
    ///
    /// Uses the override from [`with_initial`](Self::with_initial) when there
    /// is one. Otherwise runs the function once with no previous state and a
    /// bootstrap message whose tag is freshly generated, so it cannot match
    /// anything real. Any effects queued during this pass are dropped.
    pub fn initial_state(&self) -> Arc<S> {
        if let Some(initial) = &self.initial {
            return initial();
        }
        let bootstrap = Message::new(MessageType::unique());
        self.apply(None, &bootstrap, &mut Effects::new())
    }
}

impl<S, C> Clone for Transition<S, C> {
    fn clone(&self) -> Self {
        Self {
            apply: Arc::clone(&self.apply),
            initial: self.initial.clone(),
        }
    }
}

type EffectFn<S, C> = dyn FnOnce(EffectHandle<S, C>) -> Result<(), BoxError> + Send;

/// A deferred side-effecting routine.
///
/// Effects are queued by transition functions and run by the store after the
/// triggering dispatch has committed and notified its listeners.
pub struct Effect<S, C = ()> {
    routine: Box<EffectFn<S, C>>,
}

impl<S: State, C: Context> Effect<S, C> {
    pub fn new<F>(routine: F) -> Self
    where
        F: FnOnce(EffectHandle<S, C>) -> Result<(), BoxError> + Send + 'static,
    {
        Self {
            routine: Box::new(routine),
        }
    }

    pub fn run(self, handle: EffectHandle<S, C>) -> Result<(), BoxError> {
        (self.routine)(handle)
    }

    /// Rewrap so that, when run against a handle over `P`, this effect sees
    /// the slice of `P` picked by `selector`.
    pub fn lift<P: State>(self, selector: Selector<P, S>) -> Effect<P, C> {
        Effect::new(move |handle: EffectHandle<P, C>| self.run(handle.scoped(selector)))
    }
}

/// Queue of effects requested during a single reduction.
///
/// The store owns the queue and consumes it once the transition function
/// returns, so nothing can be queued after the reduction is over.
pub struct Effects<S, C = ()> {
    queue: Vec<Effect<S, C>>,
}

impl<S: State, C: Context> Effects<S, C> {
    pub fn new() -> Self {
        Self { queue: Vec::new() }
    }

    /// Queue an effect routine.
    pub fn push<F>(&mut self, routine: F)
    where
        F: FnOnce(EffectHandle<S, C>) -> Result<(), BoxError> + Send + 'static,
    {
        self.queue.push(Effect::new(routine));
    }

    pub fn push_effect(&mut self, effect: Effect<S, C>) {
        self.queue.push(effect);
    }

    /// Run `nested` against a fresh queue over the slice `T`, then adopt
    /// everything it queued, each effect rewrapped to see its slice through
    /// `selector`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use statewire::core::Effects;
    /// use std::sync::Arc;
    ///
    /// #[derive(Debug)]
    /// struct Pair {
    ///     left: Arc<u32>,
    /// }
    ///
    /// let mut effects: Effects<Pair> = Effects::new();
    /// effects.scope(
    ///     |pair: &Arc<Pair>| pair.left.clone(),
    ///     |left: &mut Effects<u32>| left.push(|handle| {
    ///         let _current: Arc<u32> = handle.get_state();
    ///         Ok(())
    ///     }),
    /// );
    /// assert_eq!(effects.len(), 1);
    /// ```
    pub fn scope<T, R, F, G>(&mut self, selector: F, nested: G) -> R
    where
        T: State,
        F: Fn(&Arc<S>) -> Arc<T> + Send + Sync + 'static,
        G: FnOnce(&mut Effects<T, C>) -> R,
    {
        let mut inner = Effects::new();
        let output = nested(&mut inner);
        self.adopt(inner, Arc::new(selector));
        output
    }

    /// Move every effect from `child` into this queue, projected through
    /// `selector`.
    pub fn adopt<T: State>(&mut self, child: Effects<T, C>, selector: Selector<S, T>) {
        self.queue.extend(
            child
                .queue
                .into_iter()
                .map(|effect| effect.lift(Arc::clone(&selector))),
        );
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub(crate) fn into_queue(self) -> Vec<Effect<S, C>> {
        self.queue
    }
}

impl<S: State, C: Context> Default for Effects<S, C> {
    fn default() -> Self {
        Self::new()
    }
}
