use std::mem;

use log::trace;

use crate::{ClientId, Delta, StateError};

use super::{
    node::{Child, NodeKey},
    tree::StateTree,
};

impl StateTree {
    /// Ends a synchronization cycle for the subtree at `node`.
    ///
    /// If `diff_for` names a client, the diff for that client is computed
    /// first and returned. Then dirty marks are cleared, every diff cache in
    /// the tree is invalidated, and each relevance node's snapshot rolls
    /// forward: this cycle's relevancies become the previous ones, and a
    /// client that was not diffed this cycle stops being tracked.
    pub fn flush(
        &mut self,
        node: NodeKey,
        diff_for: Option<ClientId>,
    ) -> Result<Option<Delta>, StateError> {
        let diff = match diff_for {
            Some(client) => self.diff(node, client, false)?,
            None => None,
        };

        let visited = self.flush_node(node)?;
        self.epoch += 1;
        trace!("flushed {} node(s), epoch now {}", visited, self.epoch);

        Ok(diff)
    }

    /// Drops every memoized diff without ending the cycle. Dirty marks and
    /// relevancy snapshots are untouched.
    ///
    /// Needed when the tree is diffed before this cycle's writes are done,
    /// such as sending a joining client the full state.
    pub fn invalidate_caches(&mut self) {
        self.epoch += 1;
    }

    // Returns the number of nodes visited
    fn flush_node(&mut self, node: NodeKey) -> Result<usize, StateError> {
        let state = self.node_mut(node)?;

        let mut visit = Vec::new();
        let mut stale = Vec::new();
        for key in &state.relevance_descendants {
            match state.children.get(key) {
                Some(Child::Node(child)) => visit.push(*child),
                _ => stale.push(key.clone()),
            }
        }
        for key in &stale {
            state.relevance_descendants.remove(key);
        }

        for key in state.dirty.drain() {
            if state.relevance_descendants.contains(&key) {
                continue;
            }
            if let Some(Child::Node(child)) = state.children.get(&key) {
                visit.push(*child);
            }
        }
        state.dirty_rec = false;

        if let Some(slot) = state.relevance.as_mut() {
            slot.last = mem::take(&mut slot.next);
        }

        let mut visited = 1;
        for child in visit {
            visited += self.flush_node(child)?;
        }

        Ok(visited)
    }
}
