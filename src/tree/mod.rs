//! Hierarchical entry tree.
//!
//! This module provides:
//! - [`FileTree`], an arena of entries linked by [`NodeId`]
//! - Lazy expansion of directories through a [`ChildLoader`]
//! - Memoized per-directory token sums
//! - Selection and frozen [`Selection`] snapshots

mod arena;
mod render;
mod selection;

pub use arena::{ChildLoader, FileTree, Node, NodeId};
pub use selection::{SelectedFile, Selection};
