use super::registry::{self, probe_tag, AnyState, WiringProbe};
use super::root::Rooted;
use crate::core::{Context, Effects, Message, State, Transition};
use crate::effects::EffectHandle;
use crate::store::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Identity of one mounted wire instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WireId(Uuid);

impl WireId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A transition that can find its own slice inside a wiring root's state.
///
/// Every `Wired::new` call mints a fresh [`WireId`], so the same inner
/// transition wired twice gives two independently addressable slices. The
/// wired transition behaves exactly like the inner one except on the wiring
/// root's bootstrap probe, where it also queues the effect that registers
/// its selector.
///
/// # Example
///
/// ```rust
/// use statewire::core::{Effects, Message, MessageType, Transition};
/// use statewire::store::Store;
/// use statewire::wiring::{wiring_root, Wired};
/// use std::sync::Arc;
///
/// const INC: MessageType = MessageType::from_static("inc");
///
/// let count = Wired::new(Transition::new(
///     |state: Option<&Arc<u32>>, message: &Message, _: &mut Effects<u32>| match state {
///         Some(n) if message.is(&INC) => Arc::new(**n + 1),
///         Some(n) => n.clone(),
///         None => Arc::new(0),
///     },
/// ));
///
/// let root = wiring_root(count.transition()).unwrap();
/// let store = Store::new(root.transition(), ());
/// assert_eq!(*count.select_own_state(&store.get_state()).unwrap(), 0);
///
/// store.dispatch(Message::new(INC)).unwrap();
/// assert_eq!(*count.select_own_state(&store.get_state()).unwrap(), 1);
/// ```
pub struct Wired<S, C = ()> {
    id: WireId,
    transition: Transition<S, C>,
}

impl<S: State, C: Context> Wired<S, C> {
    pub fn new(inner: Transition<S, C>) -> Self {
        let id = WireId::generate();
        let seed = inner.clone();
        let transition = Transition::new(
            move |state: Option<&Arc<S>>, message: &Message, effects: &mut Effects<S, C>| {
                if message.is(probe_tag()) {
                    if let Some(probe) = message.payload::<WiringProbe>() {
                        let register = Arc::clone(&probe.register);
                        effects.push(move |handle: EffectHandle<S, C>| {
                            let reader = handle.state_reader();
                            register(id, Arc::new(move || reader() as AnyState));
                            Ok(())
                        });
                    }
                }
                inner.apply(state, message, effects)
            },
        )
        .with_initial(move || seed.initial_state());
        Self { id, transition }
    }

    pub fn id(&self) -> WireId {
        self.id
    }

    /// The wired transition, to be mounted wherever the inner one would be.
    pub fn transition(&self) -> Transition<S, C> {
        self.transition.clone()
    }

    /// This wire's slice of `root`.
    ///
    /// Fails with [`StoreError::WireNotMounted`] when `root` does not come
    /// from a live wiring root whose bootstrap reached this wire.
    pub fn select_own_state<R: State>(&self, root: &Rooted<R>) -> Result<Arc<S>, StoreError> {
        let not_mounted = || StoreError::WireNotMounted { wire: self.id };
        let registry = registry::lookup::<R>(root.root()).ok_or_else(not_mounted)?;
        let slice = registry
            .select(self.id, root.state())
            .ok_or_else(not_mounted)?;
        slice.downcast::<S>().map_err(|_| not_mounted())
    }
}

impl<S, C> Clone for Wired<S, C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            transition: self.transition.clone(),
        }
    }
}

impl<S, C> fmt::Debug for Wired<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wired").field("id", &self.id).finish()
    }
}
