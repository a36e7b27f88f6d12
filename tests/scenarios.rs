//! End-to-end scenarios through the public API.

use parking_lot::Mutex;
use statewire::compose::{Combine, Combined};
use statewire::core::{Effects, Message, MessageType, Transition};
use statewire::store::{listener, DispatchFailure, Store, StoreError};
use statewire::wiring::{wiring_root, Wired};
use std::sync::Arc;

const INC: MessageType = MessageType::from_static("inc");
const SAVE: MessageType = MessageType::from_static("save");

fn count() -> Transition<u32> {
    Transition::new(
        |state: Option<&Arc<u32>>, message: &Message, _: &mut Effects<u32>| match state {
            Some(n) if message.is(&INC) => Arc::new(**n + 1),
            Some(n) => Arc::clone(n),
            None => Arc::new(0),
        },
    )
}

#[test]
fn counter_reaches_three() {
    let store = Store::new(count(), ());

    for _ in 0..3 {
        store.dispatch(Message::new(INC)).unwrap();
    }

    assert_eq!(*store.get_state(), 3);
}

#[test]
fn wired_counter_inside_a_feature_tree() {
    let clicks = Wired::new(count());
    let tree = Combine::new()
        .slot("toolbar", Combine::new().slot("clicks", clicks.transition()).build())
        .slot("title", Transition::new(
            |state: Option<&Arc<String>>, _: &Message, _: &mut Effects<String>| {
                state.cloned().unwrap_or_else(|| Arc::new("untitled".to_string()))
            },
        ))
        .build();
    let root = wiring_root(tree).unwrap();
    let store = Store::new(root.transition(), ());

    assert_eq!(*clicks.select_own_state(&store.get_state()).unwrap(), 0);
    store.dispatch(Message::new(INC)).unwrap();
    assert_eq!(*clicks.select_own_state(&store.get_state()).unwrap(), 1);

    let title = store
        .get_state()
        .state()
        .expect_slot::<String>("title");
    assert_eq!(title.as_str(), "untitled");
}

#[test]
fn failing_effect_commits_and_reports_once() {
    let reports: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);
    let saving: Transition<u32> = Transition::new(
        |state: Option<&Arc<u32>>, message: &Message, effects: &mut Effects<u32>| match state {
            Some(n) if message.is(&SAVE) => {
                effects.push(|_| Err("disk unavailable".into()));
                Arc::new(**n + 1)
            }
            Some(n) => Arc::clone(n),
            None => Arc::new(0),
        },
    );
    let store = Store::builder()
        .transition(saving)
        .context(())
        .on_error(move |failures| {
            let first = failures.iter().next().map(DispatchFailure::to_string);
            assert_eq!(first.as_deref(), Some("effect #0 failed: disk unavailable"));
            sink.lock().push(failures.len());
        })
        .build()
        .unwrap();

    store.dispatch(Message::new(SAVE)).unwrap();

    assert_eq!(*store.get_state(), 1);
    assert_eq!(*reports.lock(), vec![1]);
}

#[test]
fn nested_dispatch_is_locked_everywhere() {
    let store = Store::new(count(), ());
    let reentrant = store.clone();
    let outcome: Arc<Mutex<Option<Result<(), StoreError>>>> = Arc::new(Mutex::new(None));
    let record = Arc::clone(&outcome);
    let _sub = store.subscribe(listener(move || {
        *record.lock() = Some(reentrant.dispatch(Message::new(INC)));
        Ok(())
    }));

    store.dispatch(Message::new(INC)).unwrap();

    assert_eq!(*store.get_state(), 1);
    assert_eq!(*outcome.lock(), Some(Err(StoreError::Locked)));
}

#[test]
fn scoped_view_of_combined_store() {
    let store = Store::new(Combine::new().slot("count", count()).build(), ());
    let view = store.scope(|state: &Arc<Combined>| state.expect_slot::<u32>("count"));

    view.dispatch(Message::new(INC)).unwrap();
    view.dispatch(Message::new(INC)).unwrap();

    assert_eq!(*view.get_state(), 2);
    assert_eq!(*view.execute(|handle| handle.get_state()), 2);
}
