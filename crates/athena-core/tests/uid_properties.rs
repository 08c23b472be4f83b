//! Property-based tests for the UID pool.

use std::collections::BTreeSet;

use athena_core::{UidError, UidPool};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Allocate,
    Release(u32),
}

fn ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![3 => Just(Op::Allocate), 2 => (0u32..40).prop_map(Op::Release)],
        0..200,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: the pool behaves like "smallest id not in the live set"
    #[test]
    fn prop_pool_matches_model(capacity in 1u32..32, ops in ops()) {
        let pool = UidPool::new(capacity);
        let mut live = BTreeSet::new();

        for op in ops {
            match op {
                Op::Allocate => {
                    let expected = (0..capacity).find(|id| !live.contains(id));
                    match (pool.allocate(), expected) {
                        (Ok(uid), Some(want)) => {
                            prop_assert_eq!(uid, want);
                            prop_assert!(uid < capacity);
                            prop_assert!(live.insert(uid), "uid {} issued twice", uid);
                        },
                        (Err(UidError::Exhausted { capacity: c }), None) => {
                            prop_assert_eq!(c, capacity);
                        },
                        (got, want) => prop_assert!(false, "got {:?}, model expected {:?}", got, want),
                    }
                },
                Op::Release(uid) => {
                    prop_assert_eq!(pool.release(uid), live.remove(&uid));
                },
            }
            prop_assert_eq!(pool.in_use(), live.len());
        }
    }
}

#[test]
fn concurrent_allocation_never_duplicates() {
    let pool = std::sync::Arc::new(UidPool::new(64));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pool = pool.clone();
            std::thread::spawn(move || (0..8).map(|_| pool.allocate().unwrap()).collect::<Vec<_>>())
        })
        .collect();

    let mut all: Vec<u32> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
    all.sort_unstable();
    assert_eq!(all, (0..64).collect::<Vec<_>>());
    assert!(pool.allocate().is_err());
}
