use crate::core::{same_allocation, Context, Effects, Message, State, Transition};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A slot value with its concrete type erased.
trait SlotValue: Any + fmt::Debug + Send + Sync {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: State> SlotValue for T {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

type ErasedValue = Arc<dyn SlotValue>;

#[derive(Clone)]
struct Slot {
    key: Arc<str>,
    value: ErasedValue,
}

/// Keyed record state produced by a [`Combine`]d transition.
///
/// Slots keep the order in which they were declared. Values are shared: a
/// slot whose child transition returned its input keeps the same allocation
/// across messages.
#[derive(Clone)]
pub struct Combined {
    slots: Vec<Slot>,
}

impl Combined {
    fn erased(&self, key: &str) -> Option<&ErasedValue> {
        self.slots
            .iter()
            .find(|slot| &*slot.key == key)
            .map(|slot| &slot.value)
    }

    /// The value at `key`, if present and of type `T`.
    pub fn get<T: State>(&self, key: &str) -> Option<Arc<T>> {
        let value = Arc::clone(self.erased(key)?);
        value.into_any().downcast::<T>().ok()
    }

    /// Like [`Combined::get`], for selectors that cannot fail.
    ///
    /// # Panics
    ///
    /// Panics if `key` is missing or holds another type. Selectors built by
    /// [`Combine`] only ask for slots they declared, so this never fires for
    /// state produced by that transition.
    pub fn expect_slot<T: State>(&self, key: &str) -> Arc<T> {
        match self.get::<T>(key) {
            Some(value) => value,
            None => panic!(
                "combined state has no slot `{key}` of type {}",
                std::any::type_name::<T>()
            ),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| &*slot.key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.erased(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl fmt::Debug for Combined {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.slots.iter().map(|slot| (&slot.key, &slot.value)))
            .finish()
    }
}

type SlotReducer<C> = Arc<
    dyn Fn(Option<&ErasedValue>, &Message, &mut Effects<Combined, C>) -> ErasedValue
        + Send
        + Sync,
>;

struct SlotDecl<C> {
    key: Arc<str>,
    reduce: SlotReducer<C>,
}

/// Builds one transition over a [`Combined`] record from keyed child
/// transitions.
///
/// Every message reaches every child, in declaration order. Effects a child
/// queues are rewrapped so their handle sees only that child's slot. When no
/// child changes its slot the previous record is returned as is.
///
/// # Example
///
/// ```rust
/// use statewire::compose::{Combine, Combined};
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
/// let label: Transition<String> = Transition::new(
///     |state: Option<&Arc<String>>, _: &Message, _: &mut Effects<String>| {
///         state.cloned().unwrap_or_else(|| Arc::new("clicks".to_string()))
///     },
/// );
///
/// let root: Transition<Combined> = Combine::new()
///     .slot("count", count)
///     .slot("label", label)
///     .build();
/// let store = Store::new(root, ());
/// store.dispatch(Message::new(INC)).unwrap();
///
/// assert_eq!(*store.get_state().expect_slot::<u32>("count"), 1);
/// assert_eq!(store.get_state().keys().collect::<Vec<_>>(), ["count", "label"]);
/// ```
pub struct Combine<C = ()> {
    slots: Vec<SlotDecl<C>>,
}

impl<C: Context> Combine<C> {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Declare a slot. Declaring an existing key again replaces its
    /// transition in place.
    pub fn slot<T: State>(mut self, key: impl Into<Arc<str>>, transition: Transition<T, C>) -> Self {
        let key: Arc<str> = key.into();
        let selector_key = Arc::clone(&key);
        let reduce: SlotReducer<C> = Arc::new(
            move |previous: Option<&ErasedValue>,
                  message: &Message,
                  effects: &mut Effects<Combined, C>| {
                let previous = previous.and_then(|value| {
                    Arc::clone(value).into_any().downcast::<T>().ok()
                });
                let key = Arc::clone(&selector_key);
                let next = effects.scope(
                    move |combined: &Arc<Combined>| combined.expect_slot::<T>(&key),
                    |child: &mut Effects<T, C>| transition.apply(previous.as_ref(), message, child),
                );
                next as ErasedValue
            },
        );

        let decl = SlotDecl { key, reduce };
        match self.slots.iter_mut().find(|slot| slot.key == decl.key) {
            Some(existing) => *existing = decl,
            None => self.slots.push(decl),
        }
        self
    }

    pub fn build(self) -> Transition<Combined, C> {
        let slots = self.slots;
        Transition::new(
            move |state: Option<&Arc<Combined>>,
                  message: &Message,
                  effects: &mut Effects<Combined, C>| {
                let mut staged: Option<Vec<Slot>> = None;

                for (index, decl) in slots.iter().enumerate() {
                    let previous = state.and_then(|combined| combined.erased(&decl.key));
                    let next = (decl.reduce)(previous, message, effects);
                    let unchanged = previous.is_some_and(|value| same_allocation(value, &next));

                    if let Some(staged) = staged.as_mut() {
                        staged.push(Slot {
                            key: Arc::clone(&decl.key),
                            value: next,
                        });
                    } else if !unchanged {
                        let mut fresh = Vec::with_capacity(slots.len());
                        // Every earlier slot was unchanged, so it is present in `state`.
                        for earlier in &slots[..index] {
                            if let Some(value) = state.and_then(|c| c.erased(&earlier.key)) {
                                fresh.push(Slot {
                                    key: Arc::clone(&earlier.key),
                                    value: Arc::clone(value),
                                });
                            }
                        }
                        fresh.push(Slot {
                            key: Arc::clone(&decl.key),
                            value: next,
                        });
                        staged = Some(fresh);
                    }
                }

                match (staged, state) {
                    (Some(fresh), _) => Arc::new(Combined { slots: fresh }),
                    (None, Some(previous)) => Arc::clone(previous),
                    (None, None) => Arc::new(Combined { slots: Vec::new() }),
                }
            },
        )
    }
}

impl<C: Context> Default for Combine<C> {
    fn default() -> Self {
        Self::new()
    }
}
