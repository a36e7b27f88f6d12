use super::registry::{
    self, probe_tag, ErasedGetter, ProbeCell, Registry, RootGetter, StubPort, WiringProbe,
};
use super::wire::WireId;
use crate::core::{Context, Effects, Message, State, Transition};
use crate::effects::{CancellationToken, EffectHandle, StateFn};
use crate::store::{DispatchFailure, Port, StoreError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use uuid::Uuid;

/// Identity of one wiring root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RootId(Uuid);

impl RootId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for RootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of a store driven by a [`WiringRoot`]: the inner state plus the id
/// of the root whose registry resolves wires against it.
#[derive(Debug, Serialize, Deserialize)]
pub struct Rooted<R> {
    root: RootId,
    state: Arc<R>,
}

impl<R> Rooted<R> {
    pub fn root(&self) -> RootId {
        self.root
    }

    pub fn state(&self) -> &Arc<R> {
        &self.state
    }
}

impl<R> Clone for Rooted<R> {
    fn clone(&self) -> Self {
        Self {
            root: self.root,
            state: Arc::clone(&self.state),
        }
    }
}

/// A transition whose wires have been located.
///
/// Built by [`wiring_root`]. Its transition yields [`Rooted`] states that
/// [`Wired::select_own_state`](super::Wired::select_own_state) resolves
/// against for as long as this root (or a store running its transition) is
/// alive.
pub struct WiringRoot<R, C = ()> {
    id: RootId,
    registry: Arc<Registry<R>>,
    transition: Transition<Rooted<R>, C>,
}

impl<R: State, C: Context> WiringRoot<R, C> {
    pub fn id(&self) -> RootId {
        self.id
    }

    pub fn transition(&self) -> Transition<Rooted<R>, C> {
        self.transition.clone()
    }

    /// Number of wires found during bootstrap.
    pub fn wire_count(&self) -> usize {
        self.registry.len()
    }
}

impl<R, C> fmt::Debug for WiringRoot<R, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WiringRoot").field("id", &self.id).finish()
    }
}

/// Locate every [`Wired`](super::Wired) transition mounted under
/// `transition`.
///
/// Sends the bootstrap probe through `transition` once, runs what it queued
/// against a stub handle, and records each wire's selector. The state
/// produced by that pass becomes the initial state. Effects that need a real
/// store during bootstrap make this fail with [`StoreError::Bootstrap`].
pub fn wiring_root<R: State, C: Context>(
    transition: Transition<R, C>,
) -> Result<WiringRoot<R, C>, StoreError> {
    let id = RootId::generate();
    let cell: Arc<ProbeCell<R>> = Arc::new(ProbeCell::new());
    let found: Arc<Mutex<Vec<(WireId, ErasedGetter)>>> = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&found);
    let probe = Message::with_payload(
        probe_tag().clone(),
        WiringProbe {
            register: Arc::new(move |wire: WireId, getter: ErasedGetter| {
                sink.lock().push((wire, getter))
            }),
        },
    );
    let mut effects = Effects::new();
    let probed = transition.apply(None, &probe, &mut effects);

    let reader = Arc::clone(&cell);
    let stub_state: StateFn<R> = Arc::new(move || reader.current());
    let token = CancellationToken::new();
    token.cancel();
    let stub: EffectHandle<R, C> =
        EffectHandle::new(stub_state, Arc::new(StubPort) as Arc<dyn Port>, None, token);

    let outcomes: Vec<Validation<(), NonEmptyVec<DispatchFailure>>> = effects
        .into_queue()
        .into_iter()
        .enumerate()
        .map(|(index, effect)| match effect.run(stub.clone()) {
            Ok(()) => Validation::success(()),
            Err(error) => Validation::fail(DispatchFailure::Effect {
                index,
                error: Arc::new(error),
            }),
        })
        .collect();
    if let Validation::Failure(failures) = Validation::all_vec(outcomes) {
        let reasons: Vec<String> = failures.iter().map(ToString::to_string).collect();
        return Err(StoreError::Bootstrap(reasons.join("; ")));
    }

    let mut selectors: HashMap<WireId, RootGetter<R>> = HashMap::new();
    for (wire, getter) in found.lock().drain(..) {
        let cell = Arc::clone(&cell);
        let select: RootGetter<R> = Arc::new(move |root: &Arc<R>| {
            let _frame = cell.enter(Arc::clone(root));
            getter()
        });
        selectors.insert(wire, select);
    }
    let registry = Arc::new(Registry::new(selectors));
    registry::publish(id, &registry);
    tracing::debug!(root = %id, wires = registry.len(), "wiring root bootstrapped");

    let published = Arc::clone(&registry);
    let seeded = transition.initial_override().unwrap_or(probed);
    let initial = Arc::new(Rooted { root: id, state: seeded });
    let rooted = Transition::new(
        move |state: Option<&Arc<Rooted<R>>>,
              message: &Message,
              effects: &mut Effects<Rooted<R>, C>| {
            let Some(previous) = state else {
                return Arc::clone(&initial);
            };
            let next = effects.scope(
                |rooted: &Arc<Rooted<R>>| Arc::clone(&rooted.state),
                |inner: &mut Effects<R, C>| {
                    transition.apply(Some(&previous.state), message, inner)
                },
            );
            if previous.root != id {
                tracing::debug!(
                    root = %id,
                    from = %previous.root,
                    wires = published.len(),
                    "restamping state from another root"
                );
            } else if Arc::ptr_eq(&previous.state, &next) {
                return Arc::clone(previous);
            }
            Arc::new(Rooted { root: id, state: next })
        },
    );

    Ok(WiringRoot {
        id,
        registry,
        transition: rooted,
    })
}
