use crate::{ClientId, Delta, DeltaEntry, StateError};

use super::{
    node::{Child, NodeKey},
    tree::StateTree,
};

/// Keys with exactly one leading underscore (`_secret`, but not `__shared`
/// or `_`) are server-private and never leave the tree.
pub fn is_private_key(key: &str) -> bool {
    let mut chars = key.chars();
    chars.next() == Some('_') && matches!(chars.next(), Some(next) if next != '_')
}

impl StateTree {
    /// Computes what `client` needs to learn about the subtree at `node`
    /// since the last flush.
    ///
    /// With `exact` (or if the subtree is fully dirty) the delta describes
    /// the complete current state and is marked to replace rather than
    /// merge. Returns `None` when there is nothing to send.
    ///
    /// Results are cached per node until the next flush, except where a
    /// relevance function makes them client-specific.
    pub fn diff(
        &mut self,
        node: NodeKey,
        client: ClientId,
        exact: bool,
    ) -> Result<Option<Delta>, StateError> {
        self.diff_node(node, client, exact, false)
    }

    fn diff_node(
        &mut self,
        node: NodeKey,
        client: ClientId,
        exact: bool,
        already_exact: bool,
    ) -> Result<Option<Delta>, StateError> {
        let epoch = self.epoch;
        let state = self.node_ref(node)?;
        let exact = exact || state.dirty_rec;
        let has_relevance = state.relevance.is_some();
        let skip_cache = has_relevance || !state.relevance_descendants.is_empty();

        let cached = if skip_cache {
            None
        } else {
            state.cache.get(epoch, exact).cloned()
        };

        let mut payload = match cached {
            Some(payload) => payload,
            None => {
                let payload = if has_relevance {
                    self.diff_relevant(node, client, exact)?
                } else {
                    self.diff_plain(node, client, exact)?
                };
                if !skip_cache {
                    self.node_mut(node)?.cache.store(epoch, exact, payload.clone());
                }
                payload
            }
        };

        if exact {
            // an exact but empty subtree still means "exists, with no children"
            payload.set_exact(!already_exact);
            return Ok(Some(payload));
        }
        if payload.is_empty() {
            return Ok(None);
        }
        Ok(Some(payload))
    }

    // Everything if exact, otherwise the dirty keys plus any subtree holding
    // a relevance function, whose window may have moved
    fn diff_plain(
        &mut self,
        node: NodeKey,
        client: ClientId,
        exact: bool,
    ) -> Result<Delta, StateError> {
        let state = self.node_ref(node)?;
        let (keys, visits): (Vec<String>, Vec<String>) = if exact {
            (state.children.keys().cloned().collect(), Vec::new())
        } else {
            (
                state.dirty.iter().cloned().collect(),
                state
                    .relevance_descendants
                    .difference(&state.dirty)
                    .cloned()
                    .collect(),
            )
        };

        let mut payload = Delta::new();
        for key in keys {
            if is_private_key(&key) {
                continue;
            }
            if let Some(entry) = self.diff_entry(node, &key, client, exact, exact, true)? {
                payload.insert(key, entry);
            }
        }
        for key in visits {
            let Some(child) = self.child(node, &key) else {
                continue;
            };
            if is_private_key(&key) {
                continue;
            }
            if let Some(delta) = self.diff_node(child, client, false, false)? {
                payload.insert(key, DeltaEntry::Nested(delta));
            }
        }

        Ok(payload)
    }

    // Only keys in the client's relevancy: entering keys in full, dirty keys
    // as usual, exiting keys as removals
    fn diff_relevant(
        &mut self,
        node: NodeKey,
        client: ClientId,
        exact: bool,
    ) -> Result<Delta, StateError> {
        let relevancy = self.query_relevance(node, client)?.unwrap_or_default();
        let last = self
            .node_ref(node)?
            .last_relevancy(&client)
            .cloned();

        let mut payload = Delta::new();
        for key in &relevancy {
            if is_private_key(key) {
                continue;
            }
            let entering = last.as_ref().map_or(true, |last| !last.contains(key));
            let exact_here = exact || entering;
            let state = self.node_ref(node)?;
            let dirty = state.dirty.contains(key);
            if !exact_here && !dirty && !state.relevance_descendants.contains(key) {
                continue;
            }
            // an absent key under an exact node is implied by the replace
            let mark_absent = !exact && (exact_here || dirty);
            if let Some(entry) =
                self.diff_entry(node, key, client, exact_here, exact, mark_absent)?
            {
                payload.insert(key.clone(), entry);
            }
        }

        if !exact {
            if let Some(last) = &last {
                for key in last.difference(&relevancy) {
                    if !is_private_key(key) {
                        payload.insert(key.clone(), DeltaEntry::Removed);
                    }
                }
            }
        }

        if let Some(slot) = self.node_mut(node)?.relevance.as_mut() {
            slot.next.insert(client, relevancy);
        }

        Ok(payload)
    }

    fn diff_entry(
        &mut self,
        node: NodeKey,
        key: &str,
        client: ClientId,
        exact: bool,
        already_exact: bool,
        mark_absent: bool,
    ) -> Result<Option<DeltaEntry>, StateError> {
        let child = self.node_ref(node)?.children.get(key).cloned();
        let entry = match child {
            Some(Child::Node(child)) => self
                .diff_node(child, client, exact, already_exact)?
                .map(DeltaEntry::Nested),
            Some(Child::Leaf(value)) => value.is_serializable().then_some(DeltaEntry::Leaf(value)),
            None => mark_absent.then_some(DeltaEntry::Removed),
        };

        Ok(entry)
    }
}
