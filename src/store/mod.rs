//! The store kernel and its projections.
//!
//! A [`Store`] owns one state value, advances it through a
//! [`Transition`](crate::core::Transition) on every dispatched message,
//! notifies listeners, then runs the effects the transition queued.
//! [`ScopedView`] exposes the same surface over one slice of the state.

mod control;
mod error;
mod kernel;
mod subscription;
mod view;

pub(crate) use subscription::{EntryId, Port};

pub use control::Control;
pub use error::{BoxError, DispatchFailure, StoreError};
pub use kernel::{report_to_tracing, ErrorHook, Store};
pub use subscription::{listener, Listener, NextMessage, Subscription, Teardown};
pub use view::ScopedView;
