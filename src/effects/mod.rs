//! The imperative shell around transitions.
//!
//! Effects queued by a transition run after the dispatch that queued them
//! has committed and notified its listeners. Each execution gets:
//!
//! - **EffectHandle**: state, dispatch and context access for this run
//! - **CancellationToken**: fires once the routine's synchronous body returns
//! - **MessageStream**: awaitable view of later messages, tied to the token

mod cancel;
mod handle;
mod stream;

pub(crate) use handle::StateFn;

pub use cancel::{CancelOnDrop, CancellationToken};
pub use handle::EffectHandle;
pub use stream::MessageStream;
