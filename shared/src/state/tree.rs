use std::collections::{BTreeMap, HashSet};

use log::trace;

use crate::{BigMap, StateError, Value};

use super::node::{AutoSync, Child, NodeKey, StateNode};

/// Name given to the root node when none is supplied
pub const ROOT_NAME: &str = "root";

/// The authoritative state: an arena of [`StateNode`]s rooted at a single
/// node. Every write goes through [`StateTree::set`] so that change tracking
/// stays consistent with the data.
pub struct StateTree {
    nodes: BigMap<NodeKey, StateNode>,
    root: NodeKey,
    // Advanced by every flush; diff caches from older epochs are stale
    pub(crate) epoch: u64,
}

impl Default for StateTree {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTree {
    /// Creates a tree with an empty root named [`ROOT_NAME`]
    pub fn new() -> Self {
        Self::create(Value::empty_map(), ROOT_NAME)
    }

    /// Creates a tree whose root holds `initial`. Nested aggregates become
    /// child nodes; nothing starts out dirty.
    pub fn create(initial: impl Into<Value>, name: &str) -> Self {
        let mut nodes = BigMap::new();
        let root = nodes.insert(StateNode::new(name.to_string(), None));
        let mut tree = Self {
            nodes,
            root,
            epoch: 0,
        };

        for (key, value) in initial.into().into_entries().unwrap_or_default() {
            // the root is live, so initial adoption cannot fail
            let _ = tree.store(root, key, value, false);
        }

        tree
    }

    pub fn root(&self) -> NodeKey {
        self.root
    }

    /// Number of live nodes, root included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, node: &NodeKey) -> bool {
        self.nodes.contains_key(node)
    }

    pub fn node(&self, node: &NodeKey) -> Option<&StateNode> {
        self.nodes.get(node)
    }

    /// A read view of `node`, as handed to relevance functions
    pub fn view(&self, node: NodeKey) -> Option<NodeRef<'_>> {
        self.contains(&node).then_some(NodeRef { tree: self, key: node })
    }

    pub(crate) fn node_ref(&self, node: NodeKey) -> Result<&StateNode, StateError> {
        self.nodes
            .get(&node)
            .ok_or(StateError::NodeNotFound { node })
    }

    pub(crate) fn node_mut(&mut self, node: NodeKey) -> Result<&mut StateNode, StateError> {
        self.nodes
            .get_mut(&node)
            .ok_or(StateError::NodeNotFound { node })
    }

    // Reading

    pub fn get(&self, node: NodeKey, key: &str) -> Option<&Child> {
        self.nodes.get(&node)?.children.get(key)
    }

    /// The child node stored at `key`, if that key holds a node
    pub fn child(&self, node: NodeKey, key: &str) -> Option<NodeKey> {
        self.get(node, key).and_then(Child::node)
    }

    /// A plain copy of whatever `key` holds
    pub fn value(&self, node: NodeKey, key: &str) -> Option<Value> {
        match self.get(node, key)? {
            Child::Leaf(value) => Some(value.clone()),
            Child::Node(child) => self.to_value(*child).ok(),
        }
    }

    /// A plain copy of the subtree at `node`, non-serializable leaves included
    pub fn to_value(&self, node: NodeKey) -> Result<Value, StateError> {
        let state = self.node_ref(node)?;
        let mut map = BTreeMap::new();
        for (key, child) in &state.children {
            let value = match child {
                Child::Leaf(value) => value.clone(),
                Child::Node(child) => self.to_value(*child)?,
            };
            map.insert(key.clone(), value);
        }
        Ok(Value::Map(map))
    }

    /// `"root:a:b"` style name path from the root down to `node`
    pub fn path(&self, node: NodeKey) -> Result<String, StateError> {
        let mut names = Vec::new();
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            let state = self.node_ref(current)?;
            names.push(state.name.as_str());
            cursor = state.parent;
        }
        names.reverse();
        Ok(names.join(":"))
    }

    // Writing

    /// Assigns `value` to `key` on `node`.
    ///
    /// Leaves are stored directly. Aggregates are adopted as child nodes; if
    /// `key` already holds a node, the new value is either merged into it
    /// key by key or replaces it wholesale, whichever retransmits less.
    /// `Value::Null` removes the key. If auto-sync is on for `node`, a write
    /// that changes anything marks `key` dirty.
    pub fn set(
        &mut self,
        node: NodeKey,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<(), StateError> {
        self.write(node, key.into(), value.into()).map(|_| ())
    }

    /// Removes `key` from `node`. Does not mark anything dirty, even with
    /// auto-sync on; call [`StateTree::sync`] if observers need to know.
    pub fn delete(&mut self, node: NodeKey, key: &str) -> Result<bool, StateError> {
        let removed = self.node_mut(node)?.children.remove(key);
        let existed = removed.is_some();
        self.reclaim_child(removed);
        Ok(existed)
    }

    /// Moves a detached node under `node` at `key`. The root and nodes that
    /// still have a parent cannot be adopted.
    pub fn attach(
        &mut self,
        node: NodeKey,
        key: impl Into<String>,
        child: NodeKey,
    ) -> Result<(), StateError> {
        let key = key.into();
        let auto_sync = self.node_ref(node)?.auto_sync;

        let state = self.node_ref(child)?;
        if child == self.root {
            return Err(StateError::AdoptRoot {
                name: state.name.clone(),
            });
        }
        if let Some(parent) = state.parent {
            return Err(StateError::AlreadyAdopted {
                name: state.name.clone(),
                path: self.path(parent)?,
            });
        }
        // `node` living inside the detached subtree would close a cycle
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == child {
                return Err(StateError::AlreadyAdopted {
                    name: self.node_ref(child)?.name.clone(),
                    path: self.path(node)?,
                });
            }
            cursor = self.node_ref(current)?.parent;
        }

        let carries_relevance = state.relevance.is_some() || !state.relevance_descendants.is_empty();

        let state = self.node_mut(child)?;
        state.name = key.clone();
        state.parent = Some(node);

        let previous = self.node_mut(node)?.children.insert(key, Child::Node(child));
        self.reclaim_child(previous);

        if carries_relevance {
            self.register_relevance_path(child)?;
        }
        // marks left from before the move are covered by the whole send
        self.clear_dirty(child);
        self.sync(child, None, true)?;
        if auto_sync == AutoSync::Recursive {
            self.enable_auto_sync(child, true)?;
        }

        Ok(())
    }

    /// Unlinks the node at `key` without reclaiming it, so it can be
    /// [`attach`](StateTree::attach)ed elsewhere. Returns `None` if `key`
    /// does not hold a node.
    pub fn detach(&mut self, node: NodeKey, key: &str) -> Result<Option<NodeKey>, StateError> {
        let state = self.node_mut(node)?;
        let Some(child) = state.children.get(key).and_then(Child::node) else {
            return Ok(None);
        };
        state.children.remove(key);
        self.node_mut(child)?.parent = None;

        Ok(Some(child))
    }

    /// Reclaims a detached node and everything below it
    pub fn discard(&mut self, node: NodeKey) -> Result<(), StateError> {
        let state = self.node_ref(node)?;
        if node == self.root || state.parent.is_some() {
            return Err(StateError::StillAttached {
                path: self.path(node)?,
            });
        }
        self.reclaim(node);

        Ok(())
    }

    // Returns whether anything changed
    pub(crate) fn write(
        &mut self,
        node: NodeKey,
        key: String,
        value: Value,
    ) -> Result<bool, StateError> {
        let auto_sync = self.node_ref(node)?.auto_sync;
        let changed = self.store(node, key.clone(), value, true)?;
        if changed && auto_sync != AutoSync::Off {
            self.sync(node, Some(&key), false)?;
        }

        Ok(changed)
    }

    // The raw assignment, without auto-sync. `marking` is false only while
    // copying initial data into a fresh node.
    fn store(
        &mut self,
        node: NodeKey,
        key: String,
        value: Value,
        marking: bool,
    ) -> Result<bool, StateError> {
        if value.is_null() {
            let removed = self.node_mut(node)?.children.remove(&key);
            let existed = removed.is_some();
            self.reclaim_child(removed);
            return Ok(existed);
        }

        if !value.is_aggregate() {
            let state = self.node_mut(node)?;
            if let Some(Child::Leaf(old)) = state.children.get(&key) {
                if *old == value {
                    return Ok(false);
                }
            }
            let previous = state.children.insert(key, Child::Leaf(value));
            self.reclaim_child(previous);
            return Ok(true);
        }

        let existing = self.node_ref(node)?.children.get(&key).and_then(Child::node);
        match existing {
            Some(child) => self.merge_or_replace(node, key, child, value, marking),
            None => {
                let entries = value.into_entries().unwrap_or_default();
                self.adopt(node, key, entries, marking)?;
                Ok(true)
            }
        }
    }

    fn merge_or_replace(
        &mut self,
        node: NodeKey,
        key: String,
        child: NodeKey,
        value: Value,
        marking: bool,
    ) -> Result<bool, StateError> {
        let incoming: Vec<(String, Value)> = value
            .into_entries()
            .unwrap_or_default()
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .collect();

        let existing = &self.node_ref(child)?.children;
        let incoming_keys: HashSet<&str> = incoming.iter().map(|(key, _)| key.as_str()).collect();
        let n_same = incoming
            .iter()
            .filter(|(key, _)| existing.contains_key(key))
            .count();
        let n_new = incoming.len() - n_same;
        let stale: Vec<String> = existing
            .keys()
            .filter(|key| !incoming_keys.contains(key.as_str()))
            .cloned()
            .collect();

        if replaces(n_same, n_new, stale.len()) {
            trace!(
                "replacing '{}' wholesale (same: {}, new: {}, removed: {})",
                key,
                n_same,
                n_new,
                stale.len()
            );
            self.adopt(node, key, incoming, marking)?;
            return Ok(true);
        }

        let mut changed = false;
        for (key, value) in incoming {
            changed |= self.write(child, key, value)?;
        }
        for key in stale {
            changed |= self.write(child, key, Value::Null)?;
        }

        Ok(changed)
    }

    fn adopt(
        &mut self,
        parent: NodeKey,
        key: String,
        entries: Vec<(String, Value)>,
        marking: bool,
    ) -> Result<NodeKey, StateError> {
        let auto_sync = self.node_ref(parent)?.auto_sync;

        let child = self.nodes.insert(StateNode::new(key.clone(), Some(parent)));
        for (child_key, value) in entries {
            self.store(child, child_key, value, false)?;
        }

        let previous = self.node_mut(parent)?.children.insert(key, Child::Node(child));
        self.reclaim_child(previous);

        if marking {
            self.sync(child, None, true)?;
        }
        if auto_sync == AutoSync::Recursive {
            self.enable_auto_sync(child, true)?;
        }

        Ok(child)
    }

    fn clear_dirty(&mut self, node: NodeKey) {
        let mut stack = vec![node];
        while let Some(key) = stack.pop() {
            if let Some(state) = self.nodes.get_mut(&key) {
                state.dirty.clear();
                state.dirty_rec = false;
                stack.extend(state.children.values().filter_map(Child::node));
            }
        }
    }

    fn reclaim_child(&mut self, previous: Option<Child>) {
        if let Some(Child::Node(node)) = previous {
            self.reclaim(node);
        }
    }

    fn reclaim(&mut self, node: NodeKey) {
        let mut stack = vec![node];
        while let Some(key) = stack.pop() {
            if let Some(state) = self.nodes.remove(&key) {
                stack.extend(state.children.values().filter_map(Child::node));
            }
        }
    }
}

// Replace when merging would touch more keys than it keeps:
// n_same < n_new + n_remove / 2
fn replaces(n_same: usize, n_new: usize, n_remove: usize) -> bool {
    2 * n_same < 2 * n_new + n_remove
}

/// Read-only view of one node, borrowed from its tree
#[derive(Clone, Copy)]
pub struct NodeRef<'t> {
    tree: &'t StateTree,
    key: NodeKey,
}

impl<'t> NodeRef<'t> {
    pub(crate) fn new(tree: &'t StateTree, key: NodeKey) -> Self {
        Self { tree, key }
    }

    pub fn key(&self) -> NodeKey {
        self.key
    }

    pub fn tree(&self) -> &'t StateTree {
        self.tree
    }

    fn state(&self) -> Option<&'t StateNode> {
        self.tree.node(&self.key)
    }

    pub fn name(&self) -> &'t str {
        self.state().map(StateNode::name).unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&'t Child> {
        self.state()?.get(key)
    }

    pub fn leaf(&self, key: &str) -> Option<&'t Value> {
        self.get(key)?.leaf()
    }

    pub fn child(&self, key: &str) -> Option<NodeRef<'t>> {
        let child = self.get(key)?.node()?;
        Some(NodeRef::new(self.tree, child))
    }

    pub fn keys(&self) -> impl Iterator<Item = &'t String> {
        self.state().into_iter().flat_map(StateNode::keys)
    }

    pub fn to_value(&self) -> Value {
        self.tree.to_value(self.key).unwrap_or_default()
    }
}
