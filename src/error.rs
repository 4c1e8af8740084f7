//! The single error family surfaced by this crate.
//!
//! All structural well-formedness problems share one error family
//! distinguished by variant, not by separate error types. Duplicate
//! keys are raised eagerly at declaration time; everything else is raised
//! from [`crate::tree_builder::TreeBuilder::materialize`].

use crate::key::StateKey;
use thiserror::Error;

/// All structural problems a [`crate::tree_builder::TreeBuilder`] can
/// reject, either eagerly (duplicate keys) or at materialization (every
/// other variant).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeDefinitionError {
    /// A key was registered twice. Raised eagerly, at the declaration
    /// call, never deferred to `materialize`.
    #[error("state `{0}` was already declared")]
    DuplicateState(StateKey),

    /// A non-leaf, non-final state has no declared initial child.
    #[error("state `{0}` is non-leaf and non-final but declares no initial child")]
    MissingInitialChild(StateKey),

    /// An `initial_child` target was never declared.
    #[error("state `{state}` names `{target}` as its initial child, but `{target}` was never declared")]
    UnknownInitialChild { state: StateKey, target: StateKey },

    /// An `initial_child` target's declared parent isn't the referencing
    /// state.
    #[error(
        "state `{state}` names `{target}` as its initial child, but `{target}`'s declared parent is `{actual_parent}`, not `{state}`"
    )]
    InitialChildParentMismatch {
        state: StateKey,
        target: StateKey,
        actual_parent: StateKey,
    },

    /// When using the implicit root, the supplied initial child names a
    /// declared parent of its own (it must be root-level).
    #[error(
        "implicit root's initial child `{0}` declares a parent; it must be a root-level state"
    )]
    ImplicitRootInitialChildHasParent(StateKey),

    /// A `parent` argument references an undeclared state.
    #[error("state `{state}` declares parent `{parent}`, which was never declared")]
    UnknownParent { state: StateKey, parent: StateKey },

    /// A `go_to` transition target isn't declared.
    #[error("transition on `{state}` targets `{target}`, which was never declared")]
    UnknownTransitionTarget { state: StateKey, target: StateKey },

    /// Walking parent edges from some node revisited a node already seen,
    /// i.e. the parent graph is not a forest.
    #[error("parent cycle detected: {0:?}")]
    ParentCycle(Vec<StateKey>),

    /// A state was declared with a final state as its parent.
    #[error("state `{state}` declares `{parent}` as its parent, but `{parent}` is final")]
    FinalAsParent { state: StateKey, parent: StateKey },

    /// A machine-state was declared without an `on_machine_done` handler.
    #[error("machine-state `{0}` has no on_machine_done handler")]
    MissingMachineDoneHandler(StateKey),

    /// A state parameterized by data type `D` was declared without
    /// `initial_data`, or a plain state was declared with one.
    #[error("state `{0}` has a data/initial_data mismatch: {1}")]
    DataInitializationMismatch(StateKey, &'static str),
}

/// Convenience alias used throughout the builder and validator.
pub type TreeResult<T> = Result<T, TreeDefinitionError>;
