/// PROPERTY-BASED TESTS: State sync invariants
///
/// Uses proptest to check that a client following the diffs ends up with
/// the server's state.
///
/// Key invariants:
/// 1. Applying an exact diff to nothing rebuilds the public tree
/// 2. Applying each cycle's diff keeps a client in step with the tree
/// 3. Both hold after a trip through the wire format

use std::collections::BTreeMap;

use proptest::prelude::*;
use statecast_shared::{apply, is_private_key, ClientId, Delta, StateTree, Value};

const CLIENT: ClientId = ClientId::new(1);

// Leaves the wire carries unchanged
fn leaf_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z]{0,8}".prop_map(Value::from),
    ]
}

// Nested maps, with some private and some double-underscore keys
fn value_strategy() -> impl Strategy<Value = Value> {
    leaf_strategy().prop_recursive(3, 32, 4, |inner| {
        prop::collection::btree_map("_?[a-z_]{1,4}", inner, 1..4).prop_map(Value::Map)
    })
}

fn state_strategy() -> impl Strategy<Value = BTreeMap<String, Value>> {
    prop::collection::btree_map("_?[a-z]{1,4}", value_strategy(), 0..6)
}

fn public(value: Value) -> Value {
    match value {
        Value::Map(map) => Value::Map(
            map.into_iter()
                .filter(|(key, _)| !is_private_key(key))
                .map(|(key, value)| (key, public(value)))
                .collect(),
        ),
        other => other,
    }
}

fn over_the_wire(delta: Option<Delta>) -> Option<Delta> {
    let payload = serde_json::to_vec(&delta).unwrap();
    serde_json::from_slice(&payload).unwrap()
}

fn synced(state: BTreeMap<String, Value>) -> StateTree {
    let mut tree = StateTree::create(Value::Map(state), "root");
    let root = tree.root();
    tree.enable_auto_sync(root, true).unwrap();
    tree
}

proptest! {
    /// An exact diff applied to an empty value equals the public tree
    #[test]
    fn prop_exact_diff_rebuilds_tree(state in state_strategy()) {
        let expected = public(Value::Map(state.clone()));
        let mut tree = synced(state);
        let root = tree.root();

        let exact = tree.diff(root, CLIENT, true).unwrap();
        prop_assert!(exact.as_ref().map_or(false, Delta::is_exact));

        let rebuilt = apply(Value::empty_map(), over_the_wire(exact));
        prop_assert_eq!(rebuilt, expected);
    }

    /// Rewriting the tree to a new state and applying the cycle's diff
    /// brings a client from the old state to the new one
    #[test]
    fn prop_cycle_diff_tracks_writes(
        before in state_strategy(),
        after in state_strategy(),
    ) {
        let expected = public(Value::Map(after.clone()));
        let mut tree = synced(before.clone());
        let root = tree.root();

        let joined = tree.diff(root, CLIENT, true).unwrap();
        let mut client = apply(Value::empty_map(), over_the_wire(joined));
        tree.flush(root, None).unwrap();

        for key in before.keys() {
            if !after.contains_key(key) {
                tree.set(root, key.clone(), Value::Null).unwrap();
            }
        }
        for (key, value) in after {
            tree.set(root, key, value).unwrap();
        }

        let diff = tree.flush(root, Some(CLIENT)).unwrap();
        client = apply(client, over_the_wire(diff));
        prop_assert_eq!(client, expected);

        // the next cycle has nothing to say
        prop_assert!(tree.diff(root, CLIENT, false).unwrap().is_none());
    }
}
