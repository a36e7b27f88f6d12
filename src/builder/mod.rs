//! Builder API for store construction.
//!
//! [`StoreBuilder`] is the crate's configuration surface: the transition,
//! the context bag and the error hook are all set here.

pub mod error;
pub mod store;

pub use error::BuildError;
pub use store::StoreBuilder;
