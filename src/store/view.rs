//! Store projections through a selector.

use super::control::Control;
use super::error::StoreError;
use super::kernel::Store;
use super::subscription::{Listener, Subscription};
use crate::core::{Context, Message, Selector, State};
use crate::effects::EffectHandle;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A store-shaped projection of a base store onto one slice of its state.
///
/// Reads go through the selector; dispatch and subscriptions pass straight
/// through to the base store, so a view shares the base store's message flow.
/// Handles given to [`ScopedView::execute`] are projected too.
pub struct ScopedView<S, T, C = ()> {
    base: Store<S, C>,
    selector: Selector<S, T>,
}

impl<S: State, T: State, C: Context> ScopedView<S, T, C> {
    pub(crate) fn new(base: Store<S, C>, selector: Selector<S, T>) -> Self {
        Self { base, selector }
    }

    pub fn get_state(&self) -> Arc<T> {
        (self.selector)(&self.base.get_state())
    }

    pub fn dispatch(&self, message: Message) -> Result<(), StoreError> {
        self.base.dispatch(message)
    }

    pub fn subscribe(&self, listener: Listener) -> Subscription {
        self.base.subscribe(listener)
    }

    /// Run `routine` through the base store with a handle over this slice.
    pub fn execute<R, F>(&self, routine: F) -> R
    where
        F: FnOnce(EffectHandle<T, C>) -> R,
    {
        let selector = Arc::clone(&self.selector);
        self.base.execute(move |handle| routine(handle.scoped(selector)))
    }

    pub async fn execute_async<R, F, Fut>(&self, routine: F) -> R
    where
        F: FnOnce(EffectHandle<T, C>) -> Fut,
        Fut: Future<Output = R>,
    {
        let selector = Arc::clone(&self.selector);
        self.base
            .execute_async(move |handle| routine(handle.scoped(selector)))
            .await
    }

    pub fn context(&self) -> &C {
        self.base.context()
    }

    /// Narrow further: a view of this view.
    pub fn scope<U, F>(&self, selector: F) -> ScopedView<S, U, C>
    where
        U: State,
        F: Fn(&Arc<T>) -> Arc<U> + Send + Sync + 'static,
    {
        let outer = Arc::clone(&self.selector);
        ScopedView::new(
            self.base.clone(),
            Arc::new(move |state: &Arc<S>| selector(&outer(state))),
        )
    }

    pub fn base(&self) -> &Store<S, C> {
        &self.base
    }
}

impl<S: State, T: State, C: Context> Control<T, C> for ScopedView<S, T, C> {
    fn get_state(&self) -> Arc<T> {
        ScopedView::get_state(self)
    }

    fn dispatch(&self, message: Message) -> Result<(), StoreError> {
        ScopedView::dispatch(self, message)
    }

    fn subscribe(&self, listener: Listener) -> Subscription {
        ScopedView::subscribe(self, listener)
    }

    fn execute<R, F>(&self, routine: F) -> R
    where
        F: FnOnce(EffectHandle<T, C>) -> R,
    {
        ScopedView::execute(self, routine)
    }

    fn context(&self) -> &C {
        ScopedView::context(self)
    }
}

impl<S, T, C> Clone for ScopedView<S, T, C> {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            selector: Arc::clone(&self.selector),
        }
    }
}

impl<S: State, T: State, C: Context> fmt::Debug for ScopedView<S, T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedView")
            .field("state", &self.get_state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Effects, MessageType, Transition};
    use crate::store::listener;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const BUMP_LEFT: MessageType = MessageType::from_static("bump-left");

    #[derive(Debug)]
    struct Pair {
        left: Arc<u32>,
        right: Arc<String>,
    }

    fn pair() -> Transition<Pair> {
        Transition::new(
            |state: Option<&Arc<Pair>>, message: &Message, _: &mut Effects<Pair>| match state {
                Some(pair) if message.is(&BUMP_LEFT) => Arc::new(Pair {
                    left: Arc::new(*pair.left + 1),
                    right: Arc::clone(&pair.right),
                }),
                Some(pair) => Arc::clone(pair),
                None => Arc::new(Pair {
                    left: Arc::new(0),
                    right: Arc::new("fixed".to_string()),
                }),
            },
        )
    }

    #[test]
    fn view_reads_slice_and_dispatches_to_base() {
        let store = Store::new(pair(), ());
        let left = store.scope(|pair: &Arc<Pair>| Arc::clone(&pair.left));

        left.dispatch(Message::new(BUMP_LEFT)).unwrap();

        assert_eq!(*left.get_state(), 1);
        assert_eq!(*store.get_state().left, 1);
    }

    #[test]
    fn view_subscriptions_hit_base_store() {
        let store = Store::new(pair(), ());
        let right = store.scope(|pair: &Arc<Pair>| Arc::clone(&pair.right));
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let _sub = right.subscribe(listener(move || {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        store.dispatch(Message::new(BUMP_LEFT)).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.listener_count(), 1);
    }

    #[test]
    fn execute_projects_handle() {
        let store = Store::new(pair(), ());
        let right = store.scope(|pair: &Arc<Pair>| Arc::clone(&pair.right));

        let text = right.execute(|handle| handle.get_state());
        assert_eq!(text.as_str(), "fixed");

        right
            .execute(|handle| handle.dispatch(Message::new(BUMP_LEFT)))
            .unwrap();
        assert_eq!(*store.get_state().left, 1);
    }

    #[test]
    fn nested_scopes_compose_selectors() {
        #[derive(Debug)]
        struct Outer {
            inner: Arc<Pair>,
        }

        let wrap: Transition<Outer> = Transition::new({
            let pair = pair();
            move |state: Option<&Arc<Outer>>, message: &Message, _: &mut Effects<Outer>| {
                let inner = pair.apply(state.map(|o| &o.inner), message, &mut Effects::new());
                Arc::new(Outer { inner })
            }
        });
        let store = Store::new(wrap, ());
        let left = store
            .scope(|outer: &Arc<Outer>| Arc::clone(&outer.inner))
            .scope(|pair: &Arc<Pair>| Arc::clone(&pair.left));

        store.dispatch(Message::new(BUMP_LEFT)).unwrap();
        store.dispatch(Message::new(BUMP_LEFT)).unwrap();

        assert_eq!(*left.get_state(), 2);
        assert_eq!(*left.execute(|handle| handle.get_state()), 2);
    }

    #[test]
    fn control_is_generic_over_store_and_view() {
        fn bump<V: Control<u32>>(target: &V) -> u32 {
            target.dispatch(Message::new(BUMP_LEFT)).unwrap();
            *target.get_state()
        }

        let store = Store::new(pair(), ());
        let left = store.scope(|pair: &Arc<Pair>| Arc::clone(&pair.left));

        assert_eq!(bump(&left), 1);
        assert_eq!(bump(&left), 2);
    }
}
