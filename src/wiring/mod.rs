//! Address-free discovery of nested slices.
//!
//! A transition wrapped in [`Wired`] can be mounted anywhere below a
//! [`wiring_root`], at any depth of [`Combine`](crate::compose::Combine)
//! nesting, and later find its own slice of the root state without either
//! side spelling out a path.
//!
//! The root discovers its wires once, when it is built: it sends a private
//! probe message through the whole transition tree. Each wire answers by
//! queuing an effect, and the root runs those effects against a stub handle
//! whose state reads are redirected, per lookup, to whatever root state is
//! being resolved. The resulting selectors live in a registry keyed by
//! [`RootId`]; states only carry that id.
//!
//! Wiring is read-only. Changes still flow through `dispatch`.

mod registry;
mod root;
mod wire;

pub use root::{wiring_root, RootId, Rooted, WiringRoot};
pub use wire::{WireId, Wired};
