use std::{collections::HashSet, sync::Arc};

use crate::{ClientId, RelevanceError, StateError};

use super::{
    node::{NodeKey, RelevanceSlot},
    tree::{NodeRef, StateTree},
};

/// The child keys of one node that one client can currently see
pub type KeySet = HashSet<String>;

/// A per-client area-of-interest function for one node.
///
/// It is asked afresh on every diff, and its answer becomes that client's
/// relevancy for the cycle. Keys entering the set are sent in full; keys
/// leaving it are sent as removals.
pub trait Relevance: Send + Sync {
    fn relevancy(&self, node: NodeRef<'_>, client: ClientId) -> Result<KeySet, RelevanceError>;
}

/// Adapts a closure into a [`Relevance`]
pub struct FnRelevance<F>(F);

impl<F> FnRelevance<F>
where
    F: Fn(NodeRef<'_>, ClientId) -> Result<KeySet, RelevanceError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Relevance for FnRelevance<F>
where
    F: Fn(NodeRef<'_>, ClientId) -> Result<KeySet, RelevanceError> + Send + Sync,
{
    fn relevancy(&self, node: NodeRef<'_>, client: ClientId) -> Result<KeySet, RelevanceError> {
        (self.0)(node, client)
    }
}

impl StateTree {
    /// Installs `relevance` on `node`, replacing any previous one.
    ///
    /// Ancestors learn that this subtree holds a relevance function, so
    /// diffs and flushes keep visiting it even when nothing below is dirty.
    pub fn set_relevance<R: Relevance + 'static>(
        &mut self,
        node: NodeKey,
        relevance: R,
    ) -> Result<(), StateError> {
        let relevance: Arc<dyn Relevance> = Arc::new(relevance);

        let state = self.node_mut(node)?;
        if let Some(slot) = state.relevance.as_mut() {
            slot.relevance = relevance;
            return Ok(());
        }
        state.relevance = Some(RelevanceSlot::new(relevance));

        self.register_relevance_path(node)
    }

    /// [`StateTree::set_relevance`] for a plain closure
    pub fn set_relevance_fn<F>(&mut self, node: NodeKey, f: F) -> Result<(), StateError>
    where
        F: Fn(NodeRef<'_>, ClientId) -> Result<KeySet, RelevanceError> + Send + Sync + 'static,
    {
        self.set_relevance(node, FnRelevance::new(f))
    }

    // Records the path from `node` up to the root in each ancestor's
    // relevance descendants
    pub(crate) fn register_relevance_path(&mut self, node: NodeKey) -> Result<(), StateError> {
        let mut current = node;
        loop {
            let state = self.node_ref(current)?;
            let Some(parent) = state.parent else {
                return Ok(());
            };
            let name = state.name.clone();
            self.node_mut(parent)?.relevance_descendants.insert(name);
            current = parent;
        }
    }

    // Asks the relevance function on `node` for `client`'s relevancy
    pub(crate) fn query_relevance(
        &self,
        node: NodeKey,
        client: ClientId,
    ) -> Result<Option<KeySet>, StateError> {
        let Some(slot) = self.node_ref(node)?.relevance.as_ref() else {
            return Ok(None);
        };
        slot.relevance
            .relevancy(NodeRef::new(self, node), client)
            .map(Some)
            .map_err(|source| StateError::Relevance {
                path: self.path(node).unwrap_or_default(),
                client,
                source,
            })
    }
}
