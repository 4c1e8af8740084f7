//! The external node-build protocol.
//!
//! The core never creates runtime node objects itself. Materialization
//! walks the validated builder state and, for each declared state, invokes
//! a caller-supplied [`NodeBuildContext`] with a [`TreeNodeBuildInfo`]
//! describing the node's shape. This lets the same declarative layer
//! target alternative runtimes, or drive pure-metadata rendering (a
//! diagram formatter), without the core depending on either. Generalized
//! from the way the teacher separates declaring a state's shape
//! (`StateChildOf`, `InitialState`) from the systems that later act on it
//! (`transition_observer`) — here that separation is an explicit trait
//! instead of an implicit ECS schedule.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::context::DataFactoryContext;
use crate::key::StateKey;

/// The structural kind of a materialized node, derived from parent/child
/// presence at materialization time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Interior,
    Leaf { is_final: bool },
}

/// A state's data factory, type-erased down to `Box<dyn Any>` so it can be
/// carried in [`TreeNodeBuildInfo`] irrespective of the concrete `D` a
/// given state declares. The build context calls this once per entry —
/// never once per tree, so a runtime that enters and re-enters the same
/// node over its lifetime gets a fresh value each time instead of reusing
/// whatever was produced the first time the tree was materialized.
pub type DataFactory<U> = Arc<dyn Fn(&DataFactoryContext<U>) -> Box<dyn Any + Send + Sync> + Send + Sync>;

/// Everything the materializer knows about one state when it asks the
/// build context to construct a node for it.
pub struct TreeNodeBuildInfo<S, U> {
    pub key: StateKey,
    pub kind: NodeKind,
    pub parent: Option<StateKey>,
    /// Declaration-order list of this node's children, already resolved
    /// and recursively built.
    pub children: Vec<S>,
    /// The resolver for which child to enter first, absent on leaves.
    pub initial_child: Option<StateKey>,
    /// This state's data factory, still callable rather than already
    /// invoked: the build context downcasts the boxed result to the
    /// concrete `D` it expects for this key, and may call it again on
    /// every later entry to get a fresh value (`()` for a plain state
    /// carrying no data of its own).
    pub data: DataFactory<U>,
    /// Opaque persistence-descriptor tag, carried through uninterpreted;
    /// this crate implements no codec itself.
    pub codec: Option<String>,
    /// Opaque tag naming which nested machine a machine-state should spawn
    /// on entry; carried through uninterpreted, absent on non-machine
    /// states.
    pub initial_machine: Option<String>,
    pub filters: Vec<String>,
    pub metadata: std::collections::HashMap<String, String>,
}

impl<S, U> fmt::Debug for TreeNodeBuildInfo<S, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeNodeBuildInfo")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("parent", &self.parent)
            .field("initial_child", &self.initial_child)
            .finish_non_exhaustive()
    }
}

/// The collaborator that turns validated declarations into runtime nodes.
///
/// Implementations must register each node uniquely by key; re-registering
/// the same key is a definition error the implementation is responsible
/// for surfacing (the core itself cannot duplicate a key past the
/// validator, but a caller-provided context may still be invoked from more
/// than one builder).
pub trait NodeBuildContext<U> {
    /// The runtime node type this context produces.
    type Node;

    fn build_root(&mut self, info: TreeNodeBuildInfo<Self::Node, U>) -> Self::Node;
    fn build_interior(&mut self, info: TreeNodeBuildInfo<Self::Node, U>) -> Self::Node;
    fn build_leaf(&mut self, info: TreeNodeBuildInfo<Self::Node, U>) -> Self::Node;
}
