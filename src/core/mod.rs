//! Core value types of the store.
//!
//! This module contains the pure pieces:
//! - State and context marker traits
//! - Messages, message tags and matchers
//! - Transition functions and the effect queue they fill
//!
//! Nothing here touches a store; transitions only describe what should
//! happen and leave running effects to the store kernel.

mod message;
mod state;
mod transition;

pub(crate) use state::same_allocation;

pub use message::{Matcher, Message, MessageType, Payload};
pub use state::{Context, State};
pub use transition::{Effect, Effects, Selector, Transition, TransitionFn};
