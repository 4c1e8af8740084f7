//! Exercises materialization under a real subscriber, so the `#[instrument]`
//! span on `TreeBuilder::materialize` and its `trace!`/`warn!` calls
//! actually run through a collector instead of the default no-op one.

use tracing_subscriber::EnvFilter;

use statecraft::prelude::*;

struct Node {
    key: StateKey,
}

struct RecordingContext;

impl NodeBuildContext<()> for RecordingContext {
    type Node = Node;

    fn build_root(&mut self, info: TreeNodeBuildInfo<Self::Node, ()>) -> Self::Node {
        Node { key: info.key }
    }

    fn build_interior(&mut self, info: TreeNodeBuildInfo<Self::Node, ()>) -> Self::Node {
        Node { key: info.key }
    }

    fn build_leaf(&mut self, info: TreeNodeBuildInfo<Self::Node, ()>) -> Self::Node {
        // No resolved parent for a leaf outside the reserved root triggers
        // the `warn!` in `TreeBuilder::build_node`; this test's tree never
        // hits that path, but the subscriber below is wired to show it if
        // a future scenario does.
        Node { key: info.key }
    }
}

#[test]
fn materialize_runs_under_a_real_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("statecraft=trace".parse().unwrap()))
        .with_test_writer()
        .try_init();

    let mut tree: TreeBuilder<()> = TreeBuilder::new("traffic_light", "red");
    tree.add_state(StateBuilder::<(), ()>::stateless("red")).unwrap();
    tree.add_state(StateBuilder::<(), ()>::stateless("green")).unwrap();

    let root = tree.materialize(&mut RecordingContext).unwrap();
    assert_eq!(root.key, StateKey::reserved_root());
}
