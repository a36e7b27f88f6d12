//! Effect handles, cancellation and message streams seen from outside the
//! crate.

use futures::{FutureExt, StreamExt};
use parking_lot::Mutex;
use statewire::compose::{Combine, Combined};
use statewire::core::{Effects, Message, MessageType, Transition};
use statewire::effects::MessageStream;
use statewire::store::{Store, StoreError};
use std::sync::Arc;

const INC: MessageType = MessageType::from_static("inc");
const START: MessageType = MessageType::from_static("start");
const PING: MessageType = MessageType::from_static("ping");

fn counter() -> Transition<u32> {
    Transition::new(
        |state: Option<&Arc<u32>>, message: &Message, _: &mut Effects<u32>| match state {
            Some(n) if message.is(&INC) => Arc::new(**n + 1),
            Some(n) => Arc::clone(n),
            None => Arc::new(0),
        },
    )
}

/// Keep dispatching `pick(round)` while some stream is listening.
async fn drive<S, F>(store: &Store<S>, pick: F)
where
    S: statewire::core::State,
    F: Fn(usize) -> Message,
{
    let mut idle = 0;
    while store.listener_count() == 0 && idle < 10_000 {
        idle += 1;
        tokio::task::yield_now().await;
    }
    let mut round = 0;
    while store.listener_count() > 0 && round < 10_000 {
        store.dispatch(pick(round)).unwrap();
        round += 1;
        tokio::task::yield_now().await;
    }
}

#[test]
fn synchronous_effect_stream_is_cancelled_on_return() {
    let parked: Arc<Mutex<Option<MessageStream<u32>>>> = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&parked);
    let parking: Transition<u32> = Transition::new(
        move |state: Option<&Arc<u32>>, message: &Message, effects: &mut Effects<u32>| {
            if message.is(&START) {
                let slot = Arc::clone(&slot);
                effects.push(move |handle| {
                    *slot.lock() = Some(handle.subscribe()?);
                    Ok(())
                });
            }
            state.cloned().unwrap_or_else(|| Arc::new(0))
        },
    );
    let store = Store::new(parking, ());

    store.dispatch(Message::new(START)).unwrap();
    let stream = parked.lock().take().unwrap();

    assert!(stream.is_cancelled());
    assert_eq!(store.listener_count(), 0);
    store.dispatch(Message::new(INC)).unwrap();
    assert!(matches!(
        stream.wait_for(INC).now_or_never(),
        Some(Err(StoreError::Cancelled))
    ));
    assert!(matches!(
        stream.wait_until(|_| true).now_or_never(),
        Some(Err(StoreError::Cancelled))
    ));
}

#[test]
fn handle_outlives_its_token_but_still_dispatches() {
    let store = Store::new(counter(), ());
    let handle = store.execute(|handle| handle);

    assert!(handle.is_cancelled());
    handle.dispatch(Message::new(INC)).unwrap();
    assert_eq!(*handle.get_state(), 1);
    assert!(matches!(handle.subscribe(), Ok(_)));
}

#[tokio::test]
async fn wait_for_skips_non_matching_messages() {
    let store = Store::new(counter(), ());

    let (found, _) = tokio::join!(
        store.execute_async(|handle| async move {
            let stream = handle.subscribe()?;
            stream
                .wait_for(|message: &Message| message.payload::<u32>() == Some(&7))
                .await
        }),
        drive(&store, |round| match round % 3 {
            0 => Message::new(INC),
            1 => Message::with_payload(PING, 3u32),
            _ => Message::with_payload(PING, 7u32),
        })
    );

    let found = found.unwrap();
    assert!(found.is(&PING));
    assert_eq!(found.payload::<u32>(), Some(&7));
    assert_eq!(store.listener_count(), 0);
}

#[tokio::test]
async fn back_to_back_dispatches_are_all_observed() {
    let store = Store::new(counter(), ());

    let seen = store
        .execute_async(|handle| async move {
            let stream = handle.subscribe()?;
            handle.dispatch(Message::with_payload(PING, 1u32))?;
            handle.dispatch(Message::new(INC))?;
            handle.dispatch(Message::with_payload(PING, 2u32))?;

            let first = stream.wait_for(PING).await?;
            let second = stream.wait_for(PING).await?;
            Ok::<_, StoreError>((first, second))
        })
        .await;

    let (first, second) = seen.unwrap();
    assert_eq!(first.payload::<u32>(), Some(&1));
    assert_eq!(second.payload::<u32>(), Some(&2));
    assert_eq!(*store.get_state(), 1);
}

#[test]
fn queued_messages_arrive_in_commit_order() {
    let store = Store::new(counter(), ());
    store.execute(|handle| {
        let stream = handle.subscribe().unwrap();
        store.dispatch(Message::new(INC)).unwrap();
        store.dispatch(Message::with_payload(PING, 9u32)).unwrap();

        let first = stream.next_message().now_or_never().unwrap().unwrap();
        let second = stream.next_message().now_or_never().unwrap().unwrap();
        assert!(first.is(&INC));
        assert_eq!(second.payload::<u32>(), Some(&9));
        assert!(stream.next_message().now_or_never().is_none());
    });
}

#[tokio::test]
async fn wait_until_some_returns_mapped_value() {
    let store = Store::new(counter(), ());

    let (mapped, _) = tokio::join!(
        store.execute_async(|handle| async move {
            let stream = handle.subscribe()?;
            stream
                .wait_until_some(|n: &Arc<u32>| (**n >= 3).then(|| format!("reached {n}")))
                .await
        }),
        drive(&store, |_| Message::new(INC))
    );

    let mapped = mapped.unwrap();
    let reached: u32 = mapped.trim_start_matches("reached ").parse().unwrap();
    assert!(reached >= 3);
}

#[tokio::test]
async fn wait_until_returns_immediately_when_already_true() {
    let store = Store::new(counter(), ());
    store.dispatch(Message::new(INC)).unwrap();

    let state = store
        .execute_async(|handle| async move {
            let stream = handle.subscribe()?;
            stream.wait_until(|n| *n == 1).await
        })
        .await;

    assert_eq!(*state.unwrap(), 1);
}

#[tokio::test]
async fn cancelling_mid_wait_settles_pending_waits() {
    let store = Store::new(counter(), ());

    let outcome = store
        .execute_async(|handle| async move {
            let stream = handle.subscribe()?;
            let token = handle.token().clone();
            let (waited, _) = futures::join!(stream.wait_for(PING), async move {
                token.cancel();
            });
            waited
        })
        .await;

    assert_eq!(outcome.unwrap_err(), StoreError::Cancelled);
    assert_eq!(store.listener_count(), 0);
}

#[tokio::test]
async fn stream_yields_messages_then_ends_at_cancellation() {
    let store = Store::new(counter(), ());

    let (stream, _) = tokio::join!(
        store.execute_async(|handle| async move {
            let mut stream = handle.subscribe().unwrap();
            let first = stream.next().await;
            (first, stream)
        }),
        drive(&store, |_| Message::new(INC))
    );
    let (first, mut stream) = stream;

    assert!(first.unwrap().is(&INC));
    assert!(stream.is_cancelled());
    assert!(stream.next().await.is_none());
    assert!(stream.last_message().is_some());
}

#[tokio::test]
async fn scoped_view_handles_wait_on_their_slice() {
    let store = Store::new(
        Combine::new().slot("count", counter()).build(),
        (),
    );
    let view = store.scope(|state: &Arc<Combined>| state.expect_slot::<u32>("count"));

    let (reached, _) = tokio::join!(
        view.execute_async(|handle| async move {
            let stream = handle.subscribe()?;
            stream.wait_until(|n| *n >= 2).await
        }),
        drive(&store, |_| Message::new(INC))
    );

    assert!(*reached.unwrap() >= 2);
}
