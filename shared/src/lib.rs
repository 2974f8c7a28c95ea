//! # Statecast Shared
//! The reactive state tree behind statecast-server: change tracking,
//! per-client relevance, scoped and cached diffs, and delta application.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod bigmap;
mod delta;
mod error;
mod state;
mod types;
mod value;

pub use bigmap::{BigMap, BigMapKey};
pub use delta::{Delta, DeltaEntry, DIFF_NIL, EXACT_KEY};
pub use error::{RelevanceError, StateError};
pub use state::{
    apply, is_private_key, AutoSync, Child, FnRelevance, KeySet, NodeKey, NodeRef, Relevance,
    StateNode, StateTree, ROOT_NAME,
};
pub use types::{ClientId, InputSequence, Tick};
pub use value::{Opaque, Value};
