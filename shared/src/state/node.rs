use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use crate::{BigMapKey, ClientId, Delta, Value};

use super::relevance::{KeySet, Relevance};

// NodeKey
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord)]
pub struct NodeKey(u64);

impl BigMapKey for NodeKey {
    fn to_u64(&self) -> u64 {
        self.0
    }

    fn from_u64(value: u64) -> Self {
        NodeKey(value)
    }
}

/// Whether writes through [`StateTree::set`](crate::StateTree::set) mark
/// keys dirty automatically
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AutoSync {
    #[default]
    Off,
    /// Writes to this node only
    Local,
    /// Writes to this node and every node adopted below it
    Recursive,
}

/// What a key holds: a leaf value, or a tracked child node
#[derive(Clone, Debug, PartialEq)]
pub enum Child {
    Leaf(Value),
    Node(NodeKey),
}

impl Child {
    pub fn node(&self) -> Option<NodeKey> {
        match self {
            Child::Node(key) => Some(*key),
            Child::Leaf(_) => None,
        }
    }

    pub fn leaf(&self) -> Option<&Value> {
        match self {
            Child::Leaf(value) => Some(value),
            Child::Node(_) => None,
        }
    }
}

pub(crate) struct RelevanceSlot {
    pub(crate) relevance: Arc<dyn Relevance>,
    pub(crate) last: HashMap<ClientId, KeySet>,
    pub(crate) next: HashMap<ClientId, KeySet>,
}

impl RelevanceSlot {
    pub(crate) fn new(relevance: Arc<dyn Relevance>) -> Self {
        Self {
            relevance,
            last: HashMap::new(),
            next: HashMap::new(),
        }
    }
}

// Payloads are cached without the exactness marker, tagged with the flush
// epoch they were computed in.
#[derive(Default)]
pub(crate) struct DiffCache {
    epoch: u64,
    incremental: Option<Delta>,
    exact: Option<Delta>,
}

impl DiffCache {
    pub(crate) fn get(&self, epoch: u64, exact: bool) -> Option<&Delta> {
        if self.epoch != epoch {
            return None;
        }
        if exact {
            self.exact.as_ref()
        } else {
            self.incremental.as_ref()
        }
    }

    pub(crate) fn store(&mut self, epoch: u64, exact: bool, payload: Delta) {
        if self.epoch != epoch {
            self.epoch = epoch;
            self.incremental = None;
            self.exact = None;
        }
        if exact {
            self.exact = Some(payload);
        } else {
            self.incremental = Some(payload);
        }
    }
}

/// One entry of the state tree arena
pub struct StateNode {
    pub(crate) name: String,
    pub(crate) parent: Option<NodeKey>,
    pub(crate) children: HashMap<String, Child>,

    pub(crate) dirty: HashSet<String>,
    pub(crate) dirty_rec: bool,
    pub(crate) auto_sync: AutoSync,

    pub(crate) relevance: Option<RelevanceSlot>,
    pub(crate) relevance_descendants: HashSet<String>,

    pub(crate) cache: DiffCache,
}

impl StateNode {
    pub(crate) fn new(name: String, parent: Option<NodeKey>) -> Self {
        Self {
            name,
            parent,
            children: HashMap::new(),
            dirty: HashSet::new(),
            dirty_rec: false,
            auto_sync: AutoSync::Off,
            relevance: None,
            relevance_descendants: HashSet::new(),
            cache: DiffCache::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    pub fn get(&self, key: &str) -> Option<&Child> {
        self.children.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.children.keys()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Returns true if `key` changed since the last flush
    pub fn is_dirty(&self, key: &str) -> bool {
        self.dirty.contains(key)
    }

    /// Returns true if this whole subtree is considered changed
    pub fn is_dirty_rec(&self) -> bool {
        self.dirty_rec
    }

    pub fn has_dirty(&self) -> bool {
        self.dirty_rec || !self.dirty.is_empty()
    }

    pub fn auto_sync(&self) -> AutoSync {
        self.auto_sync
    }

    pub fn has_relevance(&self) -> bool {
        self.relevance.is_some()
    }

    /// Keys of immediate children whose subtree holds a relevance function
    pub fn relevance_descendants(&self) -> impl Iterator<Item = &String> {
        self.relevance_descendants.iter()
    }

    /// The keys `client` could see as of the previous flush
    pub fn last_relevancy(&self, client: &ClientId) -> Option<&KeySet> {
        self.relevance.as_ref()?.last.get(client)
    }

    /// The keys `client` can see this cycle, if it has been diffed yet
    pub fn next_relevancy(&self, client: &ClientId) -> Option<&KeySet> {
        self.relevance.as_ref()?.next.get(client)
    }
}
