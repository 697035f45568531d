//! Property-based tests for the priority lock table.
//!
//! These tests drive a `PriorityLock` with random operation sequences and
//! check it against a simple ordered-map model after every step.

use std::collections::BTreeMap;

use hatd_lock::{LockOwner, PriorityLock};
use proptest::prelude::*;

const MAX_PRIORITY: u8 = 10;

#[derive(Debug, Clone)]
enum Op {
    Put { priority: i32, owner: u32 },
    Remove { owner: u32 },
    RemovePriority { priority: i32 },
}

fn owner(id: u32) -> LockOwner {
    LockOwner::new(format!(":1.{id}"), Some(1000 + id), format!("client-{id}"))
}

fn clamp(priority: i32) -> usize {
    priority.clamp(1, i32::from(MAX_PRIORITY)) as usize
}

/// Strategy for priorities including out-of-range values.
fn any_priority() -> impl Strategy<Value = i32> {
    prop_oneof![
        4 => 1i32..=i32::from(MAX_PRIORITY),
        1 => -5i32..=0,
        1 => 11i32..=1000,
    ]
}

fn any_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (any_priority(), 0u32..6).prop_map(|(priority, owner)| Op::Put { priority, owner }),
        2 => (0u32..6).prop_map(|owner| Op::Remove { owner }),
        1 => any_priority().prop_map(|priority| Op::RemovePriority { priority }),
    ]
}

/// Apply `op` to the model, returning the expected result.
fn apply_model(model: &mut BTreeMap<usize, LockOwner>, op: &Op) -> bool {
    match op {
        Op::Put { priority, owner: id } => {
            let slot = clamp(*priority);
            if model.contains_key(&slot) {
                false
            } else {
                model.insert(slot, owner(*id));
                true
            }
        }
        Op::Remove { owner: id } => {
            let target = owner(*id);
            let found = model
                .iter()
                .rev()
                .find(|(_, held)| **held == target)
                .map(|(slot, _)| *slot);
            match found {
                Some(slot) => model.remove(&slot).is_some(),
                None => false,
            }
        }
        Op::RemovePriority { priority } => model.remove(&clamp(*priority)).is_some(),
    }
}

fn apply_table(locks: &mut PriorityLock, op: &Op) -> bool {
    match op {
        Op::Put { priority, owner: id } => locks.put(*priority, owner(*id)),
        Op::Remove { owner: id } => locks.remove(&owner(*id)),
        Op::RemovePriority { priority } => locks.remove_priority(*priority),
    }
}

proptest! {
    /// Property: after every operation `top_priority` is the true maximum
    /// occupied slot (or 0), and every derived query agrees with the model.
    #[test]
    fn prop_table_matches_model(ops in prop::collection::vec(any_op(), 1..60)) {
        let mut locks = PriorityLock::new(MAX_PRIORITY);
        let mut model: BTreeMap<usize, LockOwner> = BTreeMap::new();

        for op in &ops {
            let expected = apply_model(&mut model, op);
            let actual = apply_table(&mut locks, op);
            prop_assert_eq!(actual, expected, "result of {:?}", op);

            let expected_top = model.keys().next_back().copied().unwrap_or(0);
            prop_assert_eq!(locks.top_priority(), expected_top);
            prop_assert_eq!(locks.is_empty(), model.is_empty());
            prop_assert_eq!(locks.count(), model.len());
            prop_assert_eq!(locks.dominant(), model.values().next_back());

            for query in -2..=12 {
                let blocked = model.keys().any(|slot| *slot >= clamp(query));
                prop_assert_eq!(locks.contains_above(query), blocked, "contains_above({})", query);
            }
        }
    }

    /// Property: two puts at distinct clamped priorities both succeed, and a
    /// second put at the same priority fails.
    #[test]
    fn prop_distinct_priorities_both_succeed(p in any_priority(), q in any_priority()) {
        prop_assume!(clamp(p) != clamp(q));

        let mut locks = PriorityLock::new(MAX_PRIORITY);
        prop_assert!(locks.put(p, owner(1)));
        prop_assert!(locks.put(q, owner(2)));
        prop_assert!(!locks.put(p, owner(3)));
        prop_assert!(!locks.put(q, owner(3)));
    }

    /// Property: `put(p, d); remove(d)` restores the observable state.
    #[test]
    fn prop_put_remove_roundtrip(
        setup in prop::collection::vec((any_priority(), 0u32..4), 0..6),
        priority in any_priority(),
    ) {
        let mut locks = PriorityLock::new(MAX_PRIORITY);
        for (p, id) in setup {
            locks.put(p, owner(id));
        }
        prop_assume!(locks.get(priority).is_none());

        let before_top = locks.top_priority();
        let before_empty = locks.is_empty();
        let before_blocked: Vec<bool> = (-2..=12).map(|q| locks.contains_above(q)).collect();

        let fresh = owner(99);
        prop_assert!(locks.put(priority, fresh.clone()));
        prop_assert!(locks.remove(&fresh));
        prop_assert!(!locks.remove(&fresh));

        prop_assert_eq!(locks.top_priority(), before_top);
        prop_assert_eq!(locks.is_empty(), before_empty);
        let after_blocked: Vec<bool> = (-2..=12).map(|q| locks.contains_above(q)).collect();
        prop_assert_eq!(after_blocked, before_blocked);
    }
}
