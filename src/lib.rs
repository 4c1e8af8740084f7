//! A declarative builder and validator for hierarchical, statechart-style
//! state trees.
//!
//! This crate declares the *shape* of a tree of states — parent/child
//! nesting, initial-child resolution, typed per-state data, and
//! inspectable message/transition handler descriptors — and validates it
//! for structural well-formedness before handing it to an external
//! [`node::NodeBuildContext`] to materialize into whatever runtime
//! representation the caller wants. It does not execute transitions,
//! render diagrams, or implement logging/persistence/timers itself; those
//! are the concern of the runtime consuming a materialized tree.
//!
//! Start with [`tree_builder::TreeBuilder`].

pub mod channel;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod future_or;
pub mod handler_builder;
pub mod key;
pub mod node;
pub mod prelude;
pub mod state_builder;
pub mod tree_builder;

pub use error::{TreeDefinitionError, TreeResult};
pub use key::{DataStateKey, StateKey};
pub use tree_builder::TreeBuilder;
