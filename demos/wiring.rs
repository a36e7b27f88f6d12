//! Wiring
//!
//! This example demonstrates nested features finding their own state.
//!
//! Key concepts:
//! - Combining independent transitions into one keyed record
//! - Wiring the same transition twice as two independent slices
//! - Resolving a wire's slice from the root state without a path
//!
//! Run with: cargo run --example wiring

use statewire::compose::Combine;
use statewire::core::{Effects, Message, MessageType, Transition};
use statewire::store::Store;
use statewire::wiring::{wiring_root, Wired};
use std::sync::Arc;

const LIKE: MessageType = MessageType::from_static("post/like");

/// Likes for the post whose id matches the message payload.
fn likes(post: &'static str) -> Transition<u32> {
    Transition::new(
        move |state: Option<&Arc<u32>>, message: &Message, _: &mut Effects<u32>| match state {
            Some(n) if message.is(&LIKE) && message.payload::<&str>() == Some(&post) => {
                Arc::new(**n + 1)
            }
            Some(n) => Arc::clone(n),
            None => Arc::new(0),
        },
    )
}

fn main() {
    println!("=== Wiring Example ===\n");

    let first = Wired::new(likes("first"));
    let second = Wired::new(likes("second"));

    let feed = Combine::new()
        .slot("first", first.transition())
        .slot(
            "sidebar",
            Combine::new().slot("second", second.transition()).build(),
        )
        .build();
    let root = wiring_root(feed).unwrap();
    println!("Root {} found {} wires", root.id(), root.wire_count());

    let store = Store::new(root.transition(), ());
    store.dispatch(Message::with_payload(LIKE, "second")).unwrap();
    store.dispatch(Message::with_payload(LIKE, "second")).unwrap();
    store.dispatch(Message::with_payload(LIKE, "first")).unwrap();

    let state = store.get_state();
    println!("first:  {} likes", first.select_own_state(&state).unwrap());
    println!("second: {} likes", second.select_own_state(&state).unwrap());
    println!("root state: {:?}", state.state());

    println!("\n=== Example Complete ===");
}
