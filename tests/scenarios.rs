//! Structural validation scenarios exercised end to end through the
//! public builder API.

use statecraft::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Node {
    key: StateKey,
    kind: NodeKind,
    children: Vec<StateKey>,
}

struct RecordingContext;

impl NodeBuildContext<()> for RecordingContext {
    type Node = Node;

    fn build_root(&mut self, info: TreeNodeBuildInfo<Self::Node, ()>) -> Self::Node {
        self.build_interior(info)
    }

    fn build_interior(&mut self, info: TreeNodeBuildInfo<Self::Node, ()>) -> Self::Node {
        Node {
            key: info.key,
            kind: info.kind,
            children: info.children.into_iter().map(|n| n.key).collect(),
        }
    }

    fn build_leaf(&mut self, info: TreeNodeBuildInfo<Self::Node, ()>) -> Self::Node {
        self.build_interior(info)
    }
}

#[test]
fn s1_implicit_root_with_single_leaf() {
    let mut tree: TreeBuilder<()> = TreeBuilder::new("s1", "s1");
    tree.add_state(StateBuilder::<(), ()>::stateless("s1")).unwrap();

    let root = tree.materialize(&mut RecordingContext).unwrap();
    assert_eq!(root.key, StateKey::reserved_root());
    assert_eq!(root.children, vec![StateKey::new("s1")]);
}

#[test]
fn s2_explicit_root_with_nested_initial_children() {
    let mut tree: TreeBuilder<()> = TreeBuilder::new_with_root("s2", "r", "s1");
    tree.add_state(
        StateBuilder::<(), ()>::stateless("s1")
            .child_of("r")
            .with_initial_child("s2"),
    )
    .unwrap();
    tree.add_state(StateBuilder::<(), ()>::stateless("s2").child_of("s1")).unwrap();

    let root = tree.materialize(&mut RecordingContext).unwrap();
    assert_eq!(root.key, StateKey::new("r"));
    assert_eq!(root.children, vec![StateKey::new("s1")]);
}

#[test]
fn s3_unknown_initial_child_is_rejected() {
    let mut tree: TreeBuilder<()> = TreeBuilder::new("s3", "s1");
    tree.add_state(StateBuilder::<(), ()>::stateless("s1").with_initial_child("s3"))
        .unwrap();
    tree.add_state(StateBuilder::<(), ()>::stateless("s2").child_of("s1"))
        .unwrap();

    let err = tree.materialize(&mut RecordingContext).unwrap_err();
    assert!(matches!(err, TreeDefinitionError::UnknownInitialChild { .. }));
}

#[test]
fn s4_initial_child_parent_mismatch_is_rejected() {
    let mut tree: TreeBuilder<()> = TreeBuilder::new("s4", "s1");
    tree.add_state(StateBuilder::<(), ()>::stateless("s1").with_initial_child("s3"))
        .unwrap();
    tree.add_state(StateBuilder::<(), ()>::stateless("s2").child_of("s1"))
        .unwrap();
    tree.add_state(StateBuilder::<(), ()>::stateless("s4a").with_initial_child("s3"))
        .unwrap();
    tree.add_state(StateBuilder::<(), ()>::stateless("s3").child_of("s4a"))
        .unwrap();

    let err = tree.materialize(&mut RecordingContext).unwrap_err();
    assert!(matches!(err, TreeDefinitionError::InitialChildParentMismatch { .. }));
}

#[test]
fn s5_initial_child_cycle_is_rejected() {
    let mut tree: TreeBuilder<()> = TreeBuilder::new("s5", "s1");
    tree.add_state(StateBuilder::<(), ()>::stateless("s1").with_initial_child("s2"))
        .unwrap();
    tree.add_state(
        StateBuilder::<(), ()>::stateless("s2")
            .child_of("s1")
            .with_initial_child("s3"),
    )
    .unwrap();
    tree.add_state(StateBuilder::<(), ()>::stateless("s3").child_of("s1"))
        .unwrap();

    let err = tree.materialize(&mut RecordingContext).unwrap_err();
    assert!(matches!(err, TreeDefinitionError::InitialChildParentMismatch { .. }));
}

#[test]
fn s6_final_as_parent_is_rejected() {
    let mut tree: TreeBuilder<()> = TreeBuilder::new("s6", "s1");
    tree.add_state(StateBuilder::<(), ()>::final_state("s1")).unwrap();
    tree.add_state(StateBuilder::<(), ()>::stateless("s2").child_of("s1"))
        .unwrap();

    let err = tree.materialize(&mut RecordingContext).unwrap_err();
    assert!(matches!(err, TreeDefinitionError::FinalAsParent { .. }));
}

#[test]
fn s7_unknown_transition_target_is_rejected() {
    struct Ping;

    let mut tree: TreeBuilder<()> = TreeBuilder::new("s7", "s1");
    let descriptor = MessageHandlerBuilder::<Ping, (), ()>::new().go_to("s3");
    tree.add_state(StateBuilder::<(), ()>::stateless("s1").on_message(descriptor))
        .unwrap();

    let err = tree.materialize(&mut RecordingContext).unwrap_err();
    assert!(matches!(err, TreeDefinitionError::UnknownTransitionTarget { .. }));
}

#[test]
fn root_cannot_be_final_since_it_must_have_an_initial_child() {
    // A final state forbids an initial child (`check_initial_children` skips
    // finals), but the root is always required to resolve one, so a final
    // root is unreachable: `new` always installs a non-final root with the
    // caller-supplied initial child already set.
    let mut tree: TreeBuilder<()> = TreeBuilder::new("root_final", "s1");
    tree.add_state(StateBuilder::<(), ()>::stateless("s1")).unwrap();
    let root = tree.materialize(&mut RecordingContext).unwrap();
    assert_eq!(root.kind, NodeKind::Root);
}

#[test]
fn materializing_twice_yields_structurally_equal_trees() {
    let mut tree: TreeBuilder<()> = TreeBuilder::new_with_root("idempotent", "r", "a");
    tree.add_state(StateBuilder::<(), ()>::stateless("a").child_of("r")).unwrap();
    tree.add_state(StateBuilder::<(), ()>::stateless("b").child_of("r")).unwrap();

    let first = tree.materialize(&mut RecordingContext).unwrap();
    let second = tree.materialize(&mut RecordingContext).unwrap();
    assert_eq!(first, second);
}

#[test]
fn duplicate_state_rejected_then_builder_still_usable() {
    let mut tree: TreeBuilder<()> = TreeBuilder::new_with_root("dup", "r", "a");
    tree.add_state(StateBuilder::<(), ()>::stateless("a").child_of("r")).unwrap();

    let err = tree
        .add_state(StateBuilder::<(), ()>::stateless("a").child_of("r"))
        .unwrap_err();
    assert!(matches!(err, TreeDefinitionError::DuplicateState(_)));

    tree.add_state(StateBuilder::<(), ()>::stateless("b").child_of("r")).unwrap();
    let root = tree.materialize(&mut RecordingContext).unwrap();
    let mut children: Vec<_> = root.children.iter().map(|k| k.as_str().to_string()).collect();
    children.sort();
    assert_eq!(children, vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn machine_state_without_done_handler_is_rejected() {
    let mut tree: TreeBuilder<()> = TreeBuilder::new_with_root("machine", "r", "a");
    tree.add_state(
        StateBuilder::<(), ()>::machine_state("a", "billing_subflow", |_ctx| FutureOr::ready(true)).child_of("r"),
    )
    .unwrap();

    let err = tree.materialize(&mut RecordingContext).unwrap_err();
    assert!(matches!(err, TreeDefinitionError::MissingMachineDoneHandler(_)));
}

#[test]
fn machine_state_with_done_handler_materializes() {
    let mut tree: TreeBuilder<()> = TreeBuilder::new_with_root("machine_ok", "r", "a");
    let on_done = TransitionHandlerBuilder::<(), ()>::new().run("notify", |_ctx| {});
    tree.add_state(
        StateBuilder::<(), ()>::machine_state("a", "billing_subflow", |_ctx| FutureOr::ready(true))
            .child_of("r")
            .on_machine_done(on_done),
    )
    .unwrap();

    let root = tree.materialize(&mut RecordingContext).unwrap();
    assert_eq!(root.children, vec![StateKey::new("a")]);
}
