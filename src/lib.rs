//! Statewire: a message-driven state store
//!
//! Statewire keeps application state behind a single pure transition
//! function. Messages advance the state, listeners hear about it, and side
//! effects run afterwards with handles that expire once they return.
//!
//! # Core Concepts
//!
//! - **Transition**: pure `(previous, message, effects) -> next` function
//! - **Store**: owns the state and runs the dispatch cycle
//! - **Effects**: deferred routines queued by a transition, each run with
//!   its own cancellation-scoped handle
//! - **Composition**: scoped views and keyed combination of transitions
//! - **Wiring**: nested transitions finding their own slice at runtime
//!
//! # Example
//!
//! ```rust
//! use statewire::core::{Effects, Message, MessageType, Transition};
//! use statewire::store::{listener, Store};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! const INC: MessageType = MessageType::from_static("counter/inc");
//!
//! let count: Transition<u32> = Transition::new(
//!     |state: Option<&Arc<u32>>, message: &Message, effects: &mut Effects<u32>| match state {
//!         Some(n) if message.is(&INC) => {
//!             effects.push(|handle| {
//!                 assert!(*handle.get_state() > 0);
//!                 Ok(())
//!             });
//!             Arc::new(**n + 1)
//!         }
//!         Some(n) => n.clone(),
//!         None => Arc::new(0),
//!     },
//! );
//!
//! let store = Store::new(count, ());
//! let notified = Arc::new(AtomicUsize::new(0));
//! let seen = notified.clone();
//! let subscription = store.subscribe(listener(move || {
//!     seen.fetch_add(1, Ordering::SeqCst);
//!     Ok(())
//! }));
//!
//! store.dispatch(Message::new(INC)).unwrap();
//! subscription.unsubscribe();
//! store.dispatch(Message::new(INC)).unwrap();
//!
//! assert_eq!(*store.get_state(), 2);
//! assert_eq!(notified.load(Ordering::SeqCst), 1);
//! ```

pub mod builder;
pub mod compose;
pub mod core;
pub mod effects;
pub mod store;
pub mod wiring;

// Re-export commonly used types
pub use builder::{BuildError, StoreBuilder};
pub use compose::{Combine, Combined};
pub use self::core::{Effect, Effects, Matcher, Message, MessageType, State, Transition};
pub use effects::{CancellationToken, EffectHandle, MessageStream};
pub use store::{listener, Control, ScopedView, Store, StoreError, Subscription};
pub use wiring::{wiring_root, Rooted, Wired, WiringRoot};
