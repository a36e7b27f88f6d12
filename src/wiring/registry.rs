//! Bootstrap-time plumbing shared by wires and wiring roots.

use super::root::RootId;
use super::wire::WireId;
use crate::core::{MessageType, State};
use crate::store::{EntryId, Listener, NextMessage, Port, StoreError, Subscription, Teardown};
use futures::channel::oneshot;
use futures::future::FutureExt;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard, RwLock};
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

pub(crate) type AnyState = Arc<dyn Any + Send + Sync>;

/// A wire's state reader, with the slice type erased.
pub(crate) type ErasedGetter = Arc<dyn Fn() -> AnyState + Send + Sync>;

/// Resolves one wire's slice from a real root state.
pub(crate) type RootGetter<R> = Arc<dyn Fn(&Arc<R>) -> AnyState + Send + Sync>;

/// Tag of the bootstrap probe message, fixed for the life of the process.
pub(crate) fn probe_tag() -> &'static MessageType {
    static TAG: OnceLock<MessageType> = OnceLock::new();
    TAG.get_or_init(MessageType::unique)
}

/// Payload of the probe message: where wires report their readers.
pub(crate) struct WiringProbe {
    pub(crate) register: Arc<dyn Fn(WireId, ErasedGetter) + Send + Sync>,
}

/// Wire selectors of one root, frozen after bootstrap.
pub(crate) struct Registry<R> {
    selectors: HashMap<WireId, RootGetter<R>>,
}

impl<R: State> Registry<R> {
    pub(crate) fn new(selectors: HashMap<WireId, RootGetter<R>>) -> Self {
        Self { selectors }
    }

    pub(crate) fn len(&self) -> usize {
        self.selectors.len()
    }

    pub(crate) fn select(&self, wire: WireId, root: &Arc<R>) -> Option<AnyState> {
        self.selectors.get(&wire).map(|getter| getter(root))
    }
}

type SideTable = RwLock<HashMap<RootId, Weak<dyn Any + Send + Sync>>>;

fn side_table() -> &'static SideTable {
    static TABLE: OnceLock<SideTable> = OnceLock::new();
    TABLE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Record `registry` as the registry of `root`. Entries of dropped roots are
/// pruned on the way.
pub(crate) fn publish<R: State>(root: RootId, registry: &Arc<Registry<R>>) {
    let erased: Arc<dyn Any + Send + Sync> = Arc::clone(registry) as Arc<dyn Any + Send + Sync>;
    let mut table = side_table().write();
    table.retain(|_, weak| weak.strong_count() > 0);
    table.insert(root, Arc::downgrade(&erased));
}

/// The live registry of `root`, if that root is still around.
pub(crate) fn lookup<R: State>(root: RootId) -> Option<Arc<Registry<R>>> {
    let entry = side_table().read().get(&root)?.upgrade()?;
    entry.downcast::<Registry<R>>().ok()
}

/// Frame stack redirecting the bootstrap stub's state reads.
///
/// Held frames keep the mutex, so nested evaluation on one thread sees the
/// innermost frame while other threads wait their turn.
pub(crate) struct ProbeCell<R> {
    frames: ReentrantMutex<RefCell<Vec<Arc<R>>>>,
}

pub(crate) struct Frame<'a, R> {
    frames: ReentrantMutexGuard<'a, RefCell<Vec<Arc<R>>>>,
}

impl<R> Drop for Frame<'_, R> {
    fn drop(&mut self) {
        self.frames.borrow_mut().pop();
    }
}

impl<R: State> ProbeCell<R> {
    pub(crate) fn new() -> Self {
        Self {
            frames: ReentrantMutex::new(RefCell::new(Vec::new())),
        }
    }

    /// Point reads at `state` until the returned frame is dropped.
    pub(crate) fn enter(&self, state: Arc<R>) -> Frame<'_, R> {
        let frames = self.frames.lock();
        frames.borrow_mut().push(state);
        Frame { frames }
    }

    /// The state of the innermost frame.
    ///
    /// # Panics
    ///
    /// Panics when no frame is active: the stub's state only exists while a
    /// wire selector is being evaluated.
    pub(crate) fn current(&self) -> Arc<R> {
        let frames = self.frames.lock();
        let top = frames.borrow().last().cloned();
        match top {
            Some(state) => state,
            None => panic!("{}", StoreError::ProbeMisused),
        }
    }

    #[cfg(test)]
    pub(crate) fn depth(&self) -> usize {
        self.frames.lock().borrow().len()
    }
}

/// Port of the bootstrap handle: nothing but state reads work.
pub(crate) struct StubPort;

impl Port for StubPort {
    fn dispatch(self: Arc<Self>, _message: crate::core::Message) -> Result<(), StoreError> {
        Err(StoreError::StubCapability {
            capability: "dispatch",
        })
    }

    fn subscribe(self: Arc<Self>, _listener: Listener) -> Result<Subscription, StoreError> {
        Err(StoreError::StubCapability {
            capability: "subscribe",
        })
    }

    fn release(&self, _entry: EntryId) {}

    fn add_teardown(&self, _entry: EntryId, teardown: Teardown) {
        teardown();
    }

    fn last_message(&self) -> Option<crate::core::Message> {
        None
    }

    fn next_message(&self) -> NextMessage {
        let (_, receiver) = oneshot::channel();
        NextMessage::new(receiver.shared())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_tag_is_stable() {
        assert_eq!(probe_tag(), probe_tag());
        assert!(probe_tag().as_str().starts_with('~'));
    }

    #[test]
    fn cell_resolves_innermost_frame() {
        let cell = ProbeCell::new();
        let outer = cell.enter(Arc::new(1u32));
        assert_eq!(*cell.current(), 1);
        {
            let _inner = cell.enter(Arc::new(2u32));
            assert_eq!(*cell.current(), 2);
            assert_eq!(cell.depth(), 2);
        }
        assert_eq!(*cell.current(), 1);
        drop(outer);
        assert_eq!(cell.depth(), 0);
    }

    #[test]
    #[should_panic(expected = "wiring probe state was read outside of an active wire selector")]
    fn cell_without_frame_panics() {
        let cell: ProbeCell<u32> = ProbeCell::new();
        cell.current();
    }

    #[test]
    fn stub_port_refuses_store_capabilities() {
        let port = Arc::new(StubPort);
        assert_eq!(
            Arc::clone(&port).dispatch(crate::core::Message::new(MessageType::from_static("x"))),
            Err(StoreError::StubCapability {
                capability: "dispatch"
            })
        );
        assert!(port.last_message().is_none());
        assert!(matches!(
            port.next_message().now_or_never(),
            Some(Err(StoreError::Closed))
        ));
    }

    #[test]
    fn side_table_forgets_dropped_registries() {
        let root = RootId::generate();
        let registry: Arc<Registry<u32>> = Arc::new(Registry::new(HashMap::new()));
        publish(root, &registry);

        assert!(lookup::<u32>(root).is_some());
        assert!(lookup::<String>(root).is_none());

        drop(registry);
        assert!(lookup::<u32>(root).is_none());
    }
}
