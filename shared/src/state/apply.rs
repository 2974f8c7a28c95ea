use crate::{Delta, DeltaEntry, Value};

/// Merges `delta` into `target` and returns the result.
///
/// An exact delta replaces `target` wholesale. Otherwise `target` is coerced
/// to a map if it is not an aggregate, nested deltas are merged recursively,
/// removals delete keys and leaves are assigned. Never fails.
pub fn apply(target: Value, delta: Option<Delta>) -> Value {
    let Some(delta) = delta else {
        return target;
    };
    if delta.is_exact() {
        return delta.into_value();
    }

    let mut map = target.into_map();
    for (key, entry) in delta {
        match entry {
            DeltaEntry::Nested(nested) => {
                let current = map.remove(&key).unwrap_or_default();
                map.insert(key, apply(current, Some(nested)));
            }
            DeltaEntry::Removed => {
                map.remove(&key);
            }
            DeltaEntry::Leaf(value) => {
                map.insert(key, value);
            }
        }
    }

    Value::Map(map)
}
