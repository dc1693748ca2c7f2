//! Diff properties of the status store

use fbserial_core::{StatusKey, StatusStore, StatusValue};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
enum Op {
    Set(u32, i64),
    Transaction(Vec<(u32, i64)>),
}

fn op() -> impl Strategy<Value = Op> {
    let pair = (0u32..4, 0i64..3);
    prop_oneof![
        pair.clone().prop_map(|(k, v)| Op::Set(k, v)),
        prop::collection::vec(pair, 0..5).prop_map(Op::Transaction),
    ]
}

fn expected_diff(
    before: &BTreeMap<StatusKey, StatusValue>,
    after: &BTreeMap<StatusKey, StatusValue>,
) -> BTreeMap<StatusKey, StatusValue> {
    after
        .iter()
        .filter(|(key, value)| before.get(*key) != Some(*value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

proptest! {
    #[test]
    fn diff_matches_snapshot_difference(ops in prop::collection::vec(op(), 1..30)) {
        let notifications = Arc::new(Mutex::new(0usize));
        let mut store = StatusStore::new();
        let counter = notifications.clone();
        store.on_change(move |_| *counter.lock().unwrap() += 1);

        for op in ops {
            let before = store.snapshot();
            let count_before = *notifications.lock().unwrap();

            let diff = match op {
                Op::Set(pin, value) => store.set(StatusKey::Pin(pin), value),
                Op::Transaction(sets) => store.transaction(|tx| {
                    for (pin, value) in sets {
                        tx.set(StatusKey::Pin(pin), value);
                    }
                }),
            };

            let after = store.snapshot();
            let expected = expected_diff(&before, &after);
            let actual: BTreeMap<_, _> = diff
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            prop_assert_eq!(&actual, &expected);

            let fired = *notifications.lock().unwrap() - count_before;
            prop_assert_eq!(fired, usize::from(!expected.is_empty()));
        }
    }
}
