use std::collections::{btree_map, BTreeMap};

use serde::{ser::SerializeMap, Deserialize, Deserializer, Serialize, Serializer};

use crate::Value;

/// Reserved leaf meaning "delete this key" inside a delta
pub const DIFF_NIL: &str = "__NIL";
/// Reserved top-level key meaning "replace the target wholesale"
pub const EXACT_KEY: &str = "__exact";

/// A client-scoped description of what changed in a subtree.
///
/// On the wire a `Delta` is a plain nested map: an exact delta carries
/// `"__exact": true`, and a removed key is mapped to `"__NIL"`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Delta {
    exact: bool,
    entries: BTreeMap<String, DeltaEntry>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DeltaEntry {
    Leaf(Value),
    Removed,
    Nested(Delta),
}

impl Delta {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty delta that replaces its target
    pub fn exact() -> Self {
        Self {
            exact: true,
            entries: BTreeMap::new(),
        }
    }

    pub fn is_exact(&self) -> bool {
        self.exact
    }

    pub fn set_exact(&mut self, exact: bool) {
        self.exact = exact;
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: &str) -> Option<&DeltaEntry> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, entry: DeltaEntry) {
        self.entries.insert(key.into(), entry);
    }

    pub fn remove(&mut self, key: &str) -> Option<DeltaEntry> {
        self.entries.remove(key)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, DeltaEntry> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Reads a delta out of a decoded wire value. Never fails: anything that
    /// is not an aggregate reads as an empty, mergeable delta.
    pub fn from_value(value: Value) -> Self {
        let mut delta = Delta::new();
        let Some(entries) = value.into_entries() else {
            return delta;
        };
        for (key, value) in entries {
            if key == EXACT_KEY {
                delta.exact = value == Value::Bool(true);
                continue;
            }
            delta.entries.insert(key, DeltaEntry::from_value(value));
        }
        delta
    }

    /// Renders the delta as the value it describes. Removals are dropped and
    /// the exactness marker is stripped.
    pub fn into_value(self) -> Value {
        Value::Map(
            self.entries
                .into_iter()
                .filter_map(|(key, entry)| match entry {
                    DeltaEntry::Leaf(value) => Some((key, value)),
                    DeltaEntry::Nested(delta) => Some((key, delta.into_value())),
                    DeltaEntry::Removed => None,
                })
                .collect(),
        )
    }

    /// Renders the delta in its wire shape, markers included
    pub fn to_wire_value(&self) -> Value {
        let mut map = BTreeMap::new();
        if self.exact {
            map.insert(EXACT_KEY.to_string(), Value::Bool(true));
        }
        for (key, entry) in &self.entries {
            let value = match entry {
                DeltaEntry::Leaf(value) => value.clone(),
                DeltaEntry::Removed => Value::Str(DIFF_NIL.to_string()),
                DeltaEntry::Nested(delta) => delta.to_wire_value(),
            };
            map.insert(key.clone(), value);
        }
        Value::Map(map)
    }
}

impl<'a> IntoIterator for &'a Delta {
    type Item = (&'a String, &'a DeltaEntry);
    type IntoIter = btree_map::Iter<'a, String, DeltaEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl IntoIterator for Delta {
    type Item = (String, DeltaEntry);
    type IntoIter = btree_map::IntoIter<String, DeltaEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl DeltaEntry {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Str(text) if text == DIFF_NIL => DeltaEntry::Removed,
            value if value.is_aggregate() => DeltaEntry::Nested(Delta::from_value(value)),
            value => DeltaEntry::Leaf(value),
        }
    }

    pub fn as_leaf(&self) -> Option<&Value> {
        match self {
            DeltaEntry::Leaf(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_nested(&self) -> Option<&Delta> {
        match self {
            DeltaEntry::Nested(delta) => Some(delta),
            _ => None,
        }
    }

    pub fn is_removed(&self) -> bool {
        matches!(self, DeltaEntry::Removed)
    }
}

impl From<Value> for DeltaEntry {
    fn from(value: Value) -> Self {
        DeltaEntry::Leaf(value)
    }
}

impl From<Delta> for DeltaEntry {
    fn from(delta: Delta) -> Self {
        DeltaEntry::Nested(delta)
    }
}

impl Serialize for Delta {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let extra = usize::from(self.exact);
        let mut map = serializer.serialize_map(Some(self.entries.len() + extra))?;
        if self.exact {
            map.serialize_entry(EXACT_KEY, &true)?;
        }
        for (key, entry) in &self.entries {
            map.serialize_entry(key, entry)?;
        }
        map.end()
    }
}

impl Serialize for DeltaEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DeltaEntry::Leaf(value) => value.serialize(serializer),
            DeltaEntry::Removed => serializer.serialize_str(DIFF_NIL),
            DeltaEntry::Nested(delta) => delta.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Delta {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Delta::from_value)
    }
}
