//! Marker traits for store state and store context.
//!
//! A store owns exactly one state value at a time and replaces it wholesale
//! on every dispatch. States are shared as `Arc<S>` so that "unchanged" can be
//! detected by reference, which is what the combinator relies on to avoid
//! allocating when nothing moved.

use std::fmt::Debug;
use std::sync::Arc;

/// Trait for values that can live in a store.
///
/// Implemented for every `Debug + Send + Sync + 'static` type, so plain
/// integers, strings and user structs all qualify without ceremony.
///
/// # Example
///
/// ```rust
/// use statewire::core::State;
///
/// #[derive(Debug)]
/// struct Counter {
///     value: u32,
/// }
///
/// fn assert_state<S: State>() {}
/// assert_state::<Counter>();
/// assert_state::<u32>();
/// ```
pub trait State: Debug + Send + Sync + 'static {}

impl<T: Debug + Send + Sync + 'static> State for T {}

/// Trait for the read-only configuration bag a store hands to every
/// transition effect.
///
/// The context is fixed for the lifetime of the store.
pub trait Context: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Context for T {}

/// Compare two shared values by allocation, ignoring any vtable metadata.
pub(crate) fn same_allocation<A: ?Sized, B: ?Sized>(a: &Arc<A>, b: &Arc<B>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}
