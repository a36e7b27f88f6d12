//! Messages and message matchers.
//!
//! A message is an immutable `{ type, payload? }` record. The tag is opaque
//! and compared by value; the payload belongs to whoever sent it.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Opaque tag identifying the kind of a message.
///
/// # Example
///
/// ```rust
/// use statewire::core::{Message, MessageType};
///
/// const INCREMENT: MessageType = MessageType::from_static("counter/increment");
///
/// let message = Message::new(INCREMENT);
/// assert!(message.is(&INCREMENT));
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageType(Cow<'static, str>);

impl MessageType {
    /// Tag from a static string, usable in `const` items.
    pub const fn from_static(tag: &'static str) -> Self {
        Self(Cow::Borrowed(tag))
    }

    /// Tag from any owned or borrowed string.
    pub fn new(tag: impl Into<Cow<'static, str>>) -> Self {
        Self(tag.into())
    }

    /// A tag that no other tag in this process will ever equal.
    pub fn unique() -> Self {
        Self(Cow::Owned(format!("~{}", Uuid::new_v4().simple())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageType({:?})", self.as_str())
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload carried by a message, shared between every observer.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// An immutable dispatched message.
#[derive(Clone)]
pub struct Message {
    kind: MessageType,
    payload: Option<Payload>,
}

impl Message {
    /// Message without a payload.
    pub fn new(kind: MessageType) -> Self {
        Self {
            kind,
            payload: None,
        }
    }

    /// Message carrying `payload`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use statewire::core::{Message, MessageType};
    ///
    /// let message = Message::with_payload(MessageType::from_static("rename"), String::from("ada"));
    /// assert_eq!(message.payload::<String>().map(String::as_str), Some("ada"));
    /// assert!(message.payload::<u32>().is_none());
    /// ```
    pub fn with_payload<P: Any + Send + Sync>(kind: MessageType, payload: P) -> Self {
        Self {
            kind,
            payload: Some(Arc::new(payload)),
        }
    }

    pub fn kind(&self) -> &MessageType {
        &self.kind
    }

    /// Typed view of the payload, if present and of type `P`.
    pub fn payload<P: Any>(&self) -> Option<&P> {
        self.payload.as_deref().and_then(|p| p.downcast_ref::<P>())
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    /// Check whether this message carries the given tag.
    pub fn is(&self, kind: &MessageType) -> bool {
        self.kind == *kind
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("type", &self.kind.as_str())
            .field("payload", &self.payload.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Something that can recognise messages, e.g. for `MessageStream::wait_for`.
pub trait Matcher {
    fn matches(&self, message: &Message) -> bool;
}

impl Matcher for MessageType {
    fn matches(&self, message: &Message) -> bool {
        message.is(self)
    }
}

impl<F> Matcher for F
where
    F: Fn(&Message) -> bool,
{
    fn matches(&self, message: &Message) -> bool {
        self(message)
    }
}
