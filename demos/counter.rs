//! Counter Store
//!
//! This example demonstrates the basic dispatch cycle of a store.
//!
//! Key concepts:
//! - Pure transitions returning the next state
//! - Listeners notified after every committed message
//! - Effects queued by a transition and run after the listeners
//! - An async effect waiting on the message stream
//!
//! Run with: cargo run --example counter

use statewire::core::{Effects, Message, MessageType, Transition};
use statewire::store::{listener, Store};
use std::sync::Arc;

const INCREMENT: MessageType = MessageType::from_static("counter/increment");
const ADD: MessageType = MessageType::from_static("counter/add");

fn counter() -> Transition<i64, &'static str> {
    Transition::new(
        |state: Option<&Arc<i64>>, message: &Message, effects: &mut Effects<i64, &'static str>| {
            let Some(current) = state else {
                return Arc::new(0);
            };
            if message.is(&INCREMENT) {
                Arc::new(**current + 1)
            } else if message.is(&ADD) {
                let amount = message.payload::<i64>().copied().unwrap_or(0);
                effects.push(move |handle| {
                    println!(
                        "  [{}] added {amount}, now {}",
                        handle.context()?,
                        handle.get_state()
                    );
                    Ok(())
                });
                Arc::new(**current + amount)
            } else {
                Arc::clone(current)
            }
        },
    )
}

#[tokio::main]
async fn main() {
    println!("=== Counter Store Example ===\n");

    let store = Store::builder()
        .transition(counter())
        .context("audit")
        .build()
        .unwrap();
    println!("Initial state: {}", store.get_state());

    let observer = store.clone();
    let subscription = store.subscribe(listener(move || {
        println!("  listener sees {}", observer.get_state());
        Ok(())
    }));

    for _ in 0..3 {
        store.dispatch(Message::new(INCREMENT)).unwrap();
    }
    store.dispatch(Message::with_payload(ADD, 10i64)).unwrap();
    subscription.unsubscribe();

    println!("\nWaiting for the counter to pass 20...");
    let driver = store.clone();
    let (reached, _) = tokio::join!(
        store.execute_async(|handle| async move {
            let stream = handle.subscribe()?;
            stream.wait_until(|n| *n > 20).await
        }),
        async move {
            for _ in 0..20 {
                driver.dispatch(Message::new(INCREMENT)).unwrap();
                tokio::task::yield_now().await;
            }
        }
    );
    println!("Reached {}", reached.unwrap());

    println!("\n=== Example Complete ===");
}
