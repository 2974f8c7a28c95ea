use crate::StateError;

use super::{
    node::{AutoSync, Child, NodeKey},
    tree::StateTree,
};

impl StateTree {
    /// Turns on auto-sync for `node`: from now on, every write through
    /// [`StateTree::set`] that changes a stored value also marks the key
    /// dirty. Removing a key with [`StateTree::delete`] is not a write and
    /// still needs an explicit [`StateTree::sync`].
    ///
    /// With `recursive`, every current descendant node gets auto-sync too,
    /// and so does every node adopted under this subtree later.
    pub fn enable_auto_sync(&mut self, node: NodeKey, recursive: bool) -> Result<(), StateError> {
        let state = self.node_mut(node)?;
        if state.auto_sync == AutoSync::Off {
            state.auto_sync = AutoSync::Local;
        }
        if !recursive || state.auto_sync == AutoSync::Recursive {
            return Ok(());
        }

        state.auto_sync = AutoSync::Recursive;
        let children: Vec<NodeKey> = state.children.values().filter_map(Child::node).collect();
        for child in children {
            self.enable_auto_sync(child, true)?;
        }

        Ok(())
    }
}
