//! Vellum registry crate.
//!
//! Holds the two inheritance trees (styles and languages) and the
//! flattened resolution maps built over them.

mod resolver;
mod tree;

pub use resolver::{
    DirectDefinitions, PositionChange, Resolution, ResolutionChange, ResolutionMap,
};
pub use tree::{PositionTree, Removal, Reparent, TreeNode};
