//! # State Tree – Overview
//!
//! The authoritative state is a tree of keyed values kept in an arena of
//! [`StateNode`]s. Leaves are plain [`Value`](crate::Value)s; maps and lists
//! become child nodes when assigned.
//!
//! ## One synchronization cycle
//! 1. **Mutate**: application code calls [`StateTree::set`] and
//!    [`StateTree::delete`]. With auto-sync enabled, changing writes mark
//!    their key dirty; otherwise the caller marks with [`StateTree::sync`].
//! 2. **Diff**: once per observing client, [`StateTree::diff`] walks the
//!    dirty keys (and any subtree holding a [`Relevance`] function) and
//!    builds a [`Delta`](crate::Delta). Results are memoized per node for
//!    the rest of the cycle, except where relevance makes them
//!    client-specific.
//! 3. **Flush**: [`StateTree::flush`] clears dirty marks, invalidates every
//!    cache and rolls relevancy snapshots forward.
//!
//! Mutating between diffs of the same cycle is not supported: caches would
//! then describe a state that no longer exists.
//!
//! On the receiving end, [`apply`] merges a delta into a plain value.
//!
//! ## Reading map
//! | Module | Role |
//! |--------|------|
//! | `tree.rs`      | arena, reads, `set`/`delete`, adoption, attach/detach |
//! | `dirty.rs`     | upward dirty propagation |
//! | `auto_sync.rs` | mark-on-write |
//! | `relevance.rs` | per-client area of interest |
//! | `diff.rs`      | scoped, cached delta computation |
//! | `flush.rs`     | end of cycle |
//! | `apply.rs`     | delta application |

mod apply;
mod auto_sync;
mod diff;
mod dirty;
mod flush;
mod node;
mod relevance;
mod tree;


pub use apply::apply;
pub use diff::is_private_key;
pub use node::{AutoSync, Child, NodeKey, StateNode};
pub use relevance::{FnRelevance, KeySet, Relevance};
pub use tree::{NodeRef, StateTree, ROOT_NAME};
