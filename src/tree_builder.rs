//! The top-level declarative accumulator and its materialization
//! algorithm.
//!
//! `TreeBuilder` collects [`StateBuilder`] declarations, keyed structurally
//! behind [`ErasedStateNode`], then validates and walks the resulting
//! forest exactly once in [`TreeBuilder::materialize`]. Nothing here ever
//! suspends: validation and node construction are both synchronous — only
//! the handlers a completed tree's runtime later invokes may return
//! [`crate::future_or::FutureOr::Pending`].

use std::collections::HashMap;

use tracing::{instrument, trace, warn};

use crate::context::DataFactoryContext;
use crate::error::{TreeDefinitionError, TreeResult};
use crate::key::StateKey;
use crate::node::{NodeBuildContext, NodeKind, TreeNodeBuildInfo};
use crate::state_builder::{ErasedStateNode, StateBuilder};

/// Collects state declarations and produces a validated, materialized
/// tree through a caller-supplied [`NodeBuildContext`].
pub struct TreeBuilder<U> {
    root_key: StateKey,
    implicit_root: bool,
    declaration_order: Vec<StateKey>,
    states: HashMap<StateKey, Box<dyn ErasedStateNode<U>>>,
    log_name: String,
}

impl<U> TreeBuilder<U>
where
    U: Send + Sync + 'static,
{
    /// Creates a builder with an implicit root whose reserved key is
    /// [`StateKey::reserved_root`] and whose initial child is
    /// `initial_child`. Any state declared with no `child_of` parent is
    /// attached directly beneath the implicit root.
    pub fn new(log_name: impl Into<String>, initial_child: impl Into<StateKey>) -> Self {
        let mut builder = Self {
            root_key: StateKey::reserved_root(),
            implicit_root: true,
            declaration_order: Vec::new(),
            states: HashMap::new(),
            log_name: log_name.into(),
        };
        let root: StateBuilder<(), U> =
            StateBuilder::stateless(StateKey::reserved_root()).with_initial_child(initial_child);
        builder.insert(root).expect("reserved root key is inserted exactly once");
        builder
    }

    /// Creates a builder whose root is an explicit, dataless state with the
    /// given initial child.
    pub fn new_with_root(
        log_name: impl Into<String>,
        root_key: impl Into<StateKey>,
        initial_child: impl Into<StateKey>,
    ) -> Self {
        let root_key = root_key.into();
        let mut builder = Self {
            root_key: root_key.clone(),
            implicit_root: false,
            declaration_order: Vec::new(),
            states: HashMap::new(),
            log_name: log_name.into(),
        };
        let root: StateBuilder<(), U> = StateBuilder::stateless(root_key).with_initial_child(initial_child);
        builder.insert(root).expect("explicit root key is inserted exactly once");
        builder
    }

    /// Creates a builder whose root is an explicit data-carrying state.
    pub fn new_with_data_root<D>(
        log_name: impl Into<String>,
        root_key: impl Into<StateKey>,
        initial_data: impl Fn(&DataFactoryContext<U>) -> D + Send + Sync + 'static,
        initial_child: impl Into<StateKey>,
    ) -> Self
    where
        D: Send + Sync + 'static,
    {
        let root_key = root_key.into();
        let mut builder = Self {
            root_key: root_key.clone(),
            implicit_root: false,
            declaration_order: Vec::new(),
            states: HashMap::new(),
            log_name: log_name.into(),
        };
        let root = StateBuilder::new(root_key, initial_data).with_initial_child(initial_child);
        builder.insert(root).expect("explicit data root key is inserted exactly once");
        builder
    }

    /// The key materialization and implicit-parenting resolve against.
    pub fn root_key(&self) -> &StateKey {
        &self.root_key
    }

    fn insert<D>(&mut self, builder: StateBuilder<D, U>) -> TreeResult<()>
    where
        D: Send + Sync + 'static,
    {
        let key = builder.key().clone();
        if self.states.contains_key(&key) {
            return Err(TreeDefinitionError::DuplicateState(key));
        }
        self.declaration_order.push(key.clone());
        self.states.insert(key, Box::new(builder));
        Ok(())
    }

    /// Adds a fully configured state declaration. Duplicate keys are
    /// rejected immediately, never deferred to [`TreeBuilder::materialize`].
    pub fn add_state<D>(&mut self, builder: StateBuilder<D, U>) -> TreeResult<&mut Self>
    where
        D: Send + Sync + 'static,
    {
        self.insert(builder)?;
        Ok(self)
    }

    /// Sets the initial child of an already-declared state, most commonly
    /// the root (which a constructor always declares before the caller
    /// can reach it through [`StateBuilder::with_initial_child`]).
    ///
    /// Panics if `state` was never declared; this is a builder-usage
    /// error, not a structural one, so it is not part of
    /// [`TreeDefinitionError`].
    pub fn set_initial_child(&mut self, state: impl Into<StateKey>, child: impl Into<StateKey>) -> &mut Self {
        let state = state.into();
        let node = self
            .states
            .get_mut(&state)
            .unwrap_or_else(|| panic!("state `{state}` was not declared"));
        node.set_initial_child(child.into());
        self
    }

    /// Validates and walks the declared states, invoking `ctx` once per
    /// state, children before parents, to produce the root node.
    #[instrument(skip(self, ctx), fields(log_name = %self.log_name))]
    pub fn materialize<B: NodeBuildContext<U>>(&self, ctx: &mut B) -> TreeResult<B::Node> {
        self.check_parents_known()?;
        let children = self.children_by_parent();
        self.check_acyclic()?;
        self.check_initial_children(&children)?;
        self.check_final_as_parent(&children)?;
        self.check_transition_targets()?;
        self.check_machine_done_handlers()?;

        trace!(states = self.states.len(), "tree validated, beginning build");
        self.build_node(&self.root_key, &children, ctx)
    }

    fn children_by_parent(&self) -> HashMap<StateKey, Vec<StateKey>> {
        let mut children: HashMap<StateKey, Vec<StateKey>> = HashMap::new();
        for key in &self.declaration_order {
            let node = &self.states[key];
            if let Some(parent) = node.parent() {
                children.entry(parent.clone()).or_default().push(key.clone());
            }
        }
        children
    }

    fn check_parents_known(&self) -> TreeResult<()> {
        for key in &self.declaration_order {
            let node = &self.states[key];
            if let Some(parent) = node.parent() {
                if !self.states.contains_key(parent) {
                    return Err(TreeDefinitionError::UnknownParent {
                        state: key.clone(),
                        parent: parent.clone(),
                    });
                }
            } else if key != &self.root_key && !self.implicit_root {
                return Err(TreeDefinitionError::UnknownParent {
                    state: key.clone(),
                    parent: self.root_key.clone(),
                });
            }
        }
        Ok(())
    }

    /// Every non-root state with no declared parent attaches to the
    /// implicit root. Only meaningful when `implicit_root` is set; under
    /// an explicit root, `check_parents_known` already rejected any
    /// parentless non-root state.
    fn effective_parent(&self, key: &StateKey) -> Option<StateKey> {
        let node = &self.states[key];
        match node.parent() {
            Some(parent) => Some(parent.clone()),
            None if key == &self.root_key => None,
            None => Some(self.root_key.clone()),
        }
    }

    fn check_acyclic(&self) -> TreeResult<()> {
        for key in &self.declaration_order {
            let mut seen = vec![key.clone()];
            let mut current = key.clone();
            loop {
                let Some(parent) = self.effective_parent(&current) else {
                    break;
                };
                if parent == *key {
                    seen.push(parent);
                    return Err(TreeDefinitionError::ParentCycle(seen));
                }
                if seen.contains(&parent) {
                    seen.push(parent);
                    return Err(TreeDefinitionError::ParentCycle(seen));
                }
                seen.push(parent.clone());
                current = parent;
            }
        }
        Ok(())
    }

    fn check_initial_children(&self, children: &HashMap<StateKey, Vec<StateKey>>) -> TreeResult<()> {
        for key in &self.declaration_order {
            let node = &self.states[key];

            // Finals never require (or validate) an initial child, even if
            // one was illegally declared with children; that is
            // `check_final_as_parent`'s concern, not this one.
            if node.is_final() {
                continue;
            }

            let own_children = children.get(key).map(|c| c.as_slice()).unwrap_or(&[]);

            let initial = match node.initial_child() {
                Some(initial) => initial.clone(),
                None if own_children.is_empty() => continue,
                None => return Err(TreeDefinitionError::MissingInitialChild(key.clone())),
            };

            let Some(target_node) = self.states.get(&initial) else {
                return Err(TreeDefinitionError::UnknownInitialChild {
                    state: key.clone(),
                    target: initial,
                });
            };

            let actual_parent = self.effective_parent(&initial);
            if actual_parent.as_ref() != Some(key) {
                if key == &self.root_key && self.implicit_root && target_node.parent().is_some() {
                    return Err(TreeDefinitionError::ImplicitRootInitialChildHasParent(initial));
                }
                return Err(TreeDefinitionError::InitialChildParentMismatch {
                    state: key.clone(),
                    target: initial,
                    actual_parent: actual_parent.unwrap_or_else(|| self.root_key.clone()),
                });
            }
        }
        Ok(())
    }

    fn check_final_as_parent(&self, children: &HashMap<StateKey, Vec<StateKey>>) -> TreeResult<()> {
        for key in &self.declaration_order {
            let node = &self.states[key];
            if node.is_final() && children.get(key).map(|c| !c.is_empty()).unwrap_or(false) {
                for child in &children[key] {
                    return Err(TreeDefinitionError::FinalAsParent {
                        state: child.clone(),
                        parent: key.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_transition_targets(&self) -> TreeResult<()> {
        for key in &self.declaration_order {
            let node = &self.states[key];
            for target in node.go_to_targets() {
                if !self.states.contains_key(&target) {
                    return Err(TreeDefinitionError::UnknownTransitionTarget {
                        state: key.clone(),
                        target,
                    });
                }
            }
        }
        Ok(())
    }

    fn check_machine_done_handlers(&self) -> TreeResult<()> {
        for key in &self.declaration_order {
            let node = &self.states[key];
            if node.is_machine_state() && !node.has_machine_done_handler() {
                return Err(TreeDefinitionError::MissingMachineDoneHandler(key.clone()));
            }
        }
        Ok(())
    }

    fn build_node<B: NodeBuildContext<U>>(
        &self,
        key: &StateKey,
        children_by_parent: &HashMap<StateKey, Vec<StateKey>>,
        ctx: &mut B,
    ) -> TreeResult<B::Node> {
        let node = &self.states[key];
        let child_keys = children_by_parent.get(key).cloned().unwrap_or_default();

        let mut built_children = Vec::with_capacity(child_keys.len());
        for child_key in &child_keys {
            built_children.push(self.build_node(child_key, children_by_parent, ctx)?);
        }

        let kind = if key == &self.root_key {
            NodeKind::Root
        } else if child_keys.is_empty() {
            NodeKind::Leaf { is_final: node.is_final() }
        } else {
            NodeKind::Interior
        };

        let info = TreeNodeBuildInfo {
            key: key.clone(),
            kind,
            parent: self.effective_parent(key),
            children: built_children,
            initial_child: resolve_initial_child(node.as_ref(), &child_keys),
            data: node.data_factory(),
            codec: node.codec().map(str::to_owned),
            initial_machine: node.initial_machine().map(str::to_owned),
            filters: node.filters().to_vec(),
            metadata: node.metadata().clone(),
        };

        Ok(match kind {
            NodeKind::Root => ctx.build_root(info),
            NodeKind::Interior => ctx.build_interior(info),
            NodeKind::Leaf { .. } => {
                if info.parent.is_none() && key != &self.root_key {
                    warn!(state = %key, "leaf has no resolved parent outside the root");
                }
                ctx.build_leaf(info)
            }
        })
    }
}

fn resolve_initial_child<U>(node: &dyn ErasedStateNode<U>, _children: &[StateKey]) -> Option<StateKey> {
    node.initial_child().cloned()
}
