use thiserror::Error;

use crate::NodeKey;

/// Failure reported by a caller-supplied relevance function
pub type RelevanceError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while operating on a [`StateTree`](crate::StateTree)
///
/// Tree operations on live nodes are total; these cover stale node keys,
/// attempts to re-adopt a node, and relevance functions that fail.
#[derive(Debug, Error)]
pub enum StateError {
    /// The key does not name a live node in this tree
    #[error("Node {node:?} does not exist in this state tree")]
    NodeNotFound { node: NodeKey },

    /// The root can never become a child
    #[error("Cannot adopt root node '{name}'")]
    AdoptRoot { name: String },

    /// Reparenting is not supported: a node has at most one parent
    #[error("Node '{name}' is already adopted at '{path}'")]
    AlreadyAdopted { name: String, path: String },

    /// Only detached nodes can be discarded
    #[error("Node '{path}' is still attached and cannot be discarded")]
    StillAttached { path: String },

    /// A relevance function returned an error, propagated unchanged
    #[error("Relevance function failed at '{path}' for client {client}: {source}")]
    Relevance {
        path: String,
        client: crate::ClientId,
        #[source]
        source: RelevanceError,
    },
}
