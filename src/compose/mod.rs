//! Composition of independently written transitions.
//!
//! [`Combine`] turns keyed child transitions into one transition over a
//! [`Combined`] record. Each child, and every effect it queues, only ever
//! sees its own slot.

mod combine;

pub use combine::{Combine, Combined};
