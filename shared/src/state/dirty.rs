use crate::StateError;

use super::{node::NodeKey, tree::StateTree};

impl StateTree {
    /// Marks `key` on `node` as changed since the last flush. With no key and
    /// `recursive` set, marks the whole subtree at `node` as changed.
    ///
    /// Propagation climbs toward the root only until it reaches a node that
    /// was already dirty, so its cost follows the number of newly dirty
    /// ancestors rather than the number of dirty leaves. Nothing happens if
    /// `node` or an ancestor is already fully dirty.
    pub fn sync(
        &mut self,
        node: NodeKey,
        key: Option<&str>,
        recursive: bool,
    ) -> Result<(), StateError> {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            let state = self.node_ref(current)?;
            if state.dirty_rec {
                return Ok(());
            }
            cursor = state.parent;
        }

        let mut current = node;
        let mut key = key.map(str::to_string);
        loop {
            let state = self.node_mut(current)?;
            let some_prev_dirty = !state.dirty.is_empty();
            match key.take() {
                None => {
                    if recursive {
                        state.dirty_rec = true;
                    }
                }
                Some(key) => {
                    if state.dirty.contains(&key) {
                        return Ok(());
                    }
                    state.dirty.insert(key);
                }
            }
            // the parent already knows this node is dirty
            if some_prev_dirty {
                return Ok(());
            }

            let Some(parent) = state.parent else {
                return Ok(());
            };
            key = Some(state.name.clone());
            current = parent;
        }
    }

    /// Marks the whole subtree at `node` as changed
    pub fn sync_all(&mut self, node: NodeKey) -> Result<(), StateError> {
        self.sync(node, None, true)
    }
}
