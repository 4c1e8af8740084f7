//! The per-state declaration accumulator.
//!
//! `StateBuilder<D, U>` is the typed handle returned for one state: it
//! owns that state's data factory, its entry/exit handlers, and its
//! per-message-type handler map. `TreeBuilder` itself cannot hold a
//! homogeneous collection of `StateBuilder<D, U>` for every `D` a caller
//! might pick, so it stores each behind the [`ErasedStateNode`] object
//! trait, which exposes only the structural fields (parent, initial
//! child, finality, filters, metadata, reachable `go_to` targets) that
//! the validator and materializer actually need to walk the tree shape.
//! This mirrors how [`crate::descriptor::MessageHandlerDescriptor`] itself
//! is erased per message type via [`ErasedMessageHandler`] — the same
//! "type-erase down to what structural code needs, keep the rest behind
//! a typed handle" idiom applied one layer up.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::context::{AnyMessageContext, DataFactoryContext, TransitionContext};
use crate::descriptor::{HandlerOutcome, MessageHandlerDescriptor, MessageHandlerInfo, TransitionHandlerDescriptor};
use crate::future_or::FutureOr;
use crate::key::StateKey;
use crate::node::DataFactory;

/// A message-handler descriptor stripped to what the validator and
/// dispatcher need without knowing the concrete message type `M`.
pub trait ErasedMessageHandler<D, U>: Send + Sync {
    fn info(&self) -> &MessageHandlerInfo;
    fn as_any(&self) -> &dyn Any;
}

impl<M, D, U> ErasedMessageHandler<D, U> for MessageHandlerDescriptor<M, D, U, ()>
where
    M: Send + Sync + 'static,
    D: Send + Sync + 'static,
    U: Send + Sync + 'static,
{
    fn info(&self) -> &MessageHandlerInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A `StateBuilder<D, U>` stripped to the structural fields `TreeBuilder`
/// needs to validate and materialize the tree, irrespective of `D`.
pub trait ErasedStateNode<U>: Send + Sync {
    fn key(&self) -> &StateKey;
    fn parent(&self) -> Option<&StateKey>;
    fn set_parent(&mut self, parent: StateKey);
    fn initial_child(&self) -> Option<&StateKey>;
    fn set_initial_child(&mut self, child: StateKey);
    fn is_final(&self) -> bool;
    fn filters(&self) -> &[String];
    fn metadata(&self) -> &HashMap<String, String>;
    /// Every `go_to` target declared by a message handler on this state,
    /// including guarded branches.
    fn go_to_targets(&self) -> Vec<StateKey>;
    fn is_machine_state(&self) -> bool;
    fn has_machine_done_handler(&self) -> bool;
    fn codec(&self) -> Option<&str>;
    /// The nested machine this state spawns on entry, if any.
    fn initial_machine(&self) -> Option<&str>;
    fn has_done_predicate(&self) -> bool;
    /// This state's data factory, type-erased and still callable: the
    /// node-build protocol carries it through rather than invoking it here,
    /// so a runtime re-entering this node later can ask for a fresh value
    /// each time instead of reusing whatever was produced once during
    /// materialization.
    fn data_factory(&self) -> DataFactory<U>;
}

/// History-restoration mode for a state's children, carried as opaque
/// metadata: *which* child to re-enter on re-entry is an executor concern,
/// not validated here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    /// Restores only the directly remembered child.
    Shallow,
    /// Restores the full remembered descendant chain.
    Deep,
}

impl HistoryMode {
    fn as_str(self) -> &'static str {
        match self {
            HistoryMode::Shallow => "shallow",
            HistoryMode::Deep => "deep",
        }
    }
}

/// One value-keyed message-handler registration: a descriptor plus the
/// type-erased equality check that decides whether an incoming message
/// matches the declared value.
struct ValueKeyedHandler<D, U> {
    name: Option<String>,
    matches: Box<dyn Fn(&dyn Any) -> bool + Send + Sync>,
    handler: Box<dyn ErasedMessageHandler<D, U>>,
}

/// One state's full declaration: its data factory, entry/exit handlers,
/// and per-message-type handlers.
pub struct StateBuilder<D, U> {
    key: StateKey,
    parent: Option<StateKey>,
    initial_child: Option<StateKey>,
    is_final: bool,
    initial_data: Arc<dyn Fn(&DataFactoryContext<U>) -> D + Send + Sync>,
    on_enter: Option<TransitionHandlerDescriptor<D, U, ()>>,
    on_exit: Option<TransitionHandlerDescriptor<D, U, ()>>,
    message_handlers: HashMap<TypeId, Box<dyn ErasedMessageHandler<D, U>>>,
    /// Value-keyed registrations, checked before the type-keyed map at
    /// dispatch ("value equality first, then exact runtime type") —
    /// enforced by the executor, not this builder, which only accumulates
    /// the declarations.
    value_handlers: Vec<ValueKeyedHandler<D, U>>,
    /// An "open-coded" fallthrough handler, mutually exclusive with the
    /// keyed maps above: if present, the executor is expected to dispatch
    /// every incoming message to it instead of consulting
    /// `message_handlers`/`value_handlers`.
    open_handler: Option<Arc<dyn Fn(AnyMessageContext<D, U>) -> FutureOr<HandlerOutcome> + Send + Sync>>,
    filters: Vec<String>,
    metadata: HashMap<String, String>,
    codec: Option<String>,
    is_machine_state: bool,
    initial_machine: Option<String>,
    is_done: Option<Arc<dyn Fn(TransitionContext<D, U>) -> FutureOr<bool> + Send + Sync>>,
    on_machine_done: Option<TransitionHandlerDescriptor<D, U, ()>>,
}

impl<D, U> StateBuilder<D, U>
where
    D: Send + Sync + 'static,
    U: Send + Sync + 'static,
{
    /// Creates a state declaration whose data is produced fresh on every
    /// entry by `initial_data`, given the entering transition's context.
    pub fn new(
        key: impl Into<StateKey>,
        initial_data: impl Fn(&DataFactoryContext<U>) -> D + Send + Sync + 'static,
    ) -> Self {
        Self {
            key: key.into(),
            parent: None,
            initial_child: None,
            is_final: false,
            initial_data: Arc::new(initial_data),
            on_enter: None,
            on_exit: None,
            message_handlers: HashMap::new(),
            value_handlers: Vec::new(),
            open_handler: None,
            filters: Vec::new(),
            metadata: HashMap::new(),
            codec: None,
            is_machine_state: false,
            initial_machine: None,
            is_done: None,
            on_machine_done: None,
        }
    }

    pub fn child_of(mut self, parent: impl Into<StateKey>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_initial_child(mut self, child: impl Into<StateKey>) -> Self {
        self.initial_child = Some(child.into());
        self
    }

    pub fn as_final(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn on_enter(mut self, handler: TransitionHandlerDescriptor<D, U, ()>) -> Self {
        self.on_enter = Some(handler);
        self
    }

    pub fn on_exit(mut self, handler: TransitionHandlerDescriptor<D, U, ()>) -> Self {
        self.on_exit = Some(handler);
        self
    }

    /// Registers the handler for message type `M` on this state,
    /// replacing any earlier registration for the same `M` (last
    /// declaration wins, matching how a later `Guards` insertion
    /// overrides an earlier one in the teacher's component model).
    pub fn on_message<M>(mut self, handler: MessageHandlerDescriptor<M, D, U, ()>) -> Self
    where
        M: Send + Sync + 'static,
    {
        self.message_handlers.insert(TypeId::of::<M>(), Box::new(handler));
        self
    }

    /// An opaque declarative flag — used by nested-machine, parallel
    /// region, and history declarations, none of which the builder
    /// interprets structurally; it is carried through to the node-build
    /// protocol for the runtime to act on.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filters.push(filter.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// An opaque persistence-descriptor tag, carried through to the
    /// node-build protocol uninterpreted.
    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = Some(codec.into());
        self
    }

    /// Marks this state as hosting orthogonal regions, entered
    /// simultaneously (the teacher's `Parallel` marker). A supplemental,
    /// non-required declaration: the validator does not interpret it, and
    /// entering every region is the executor's concern.
    pub fn as_parallel(self) -> Self {
        self.with_filter("parallel")
    }

    pub fn is_parallel(&self) -> bool {
        self.filters.iter().any(|f| f == "parallel")
    }

    /// Declares which of this state's descendants should be remembered and
    /// restored on re-entry (the teacher's `History::{Shallow, Deep}`).
    /// Declaration only; restoring history is the executor's concern.
    pub fn with_history(self, mode: HistoryMode) -> Self {
        self.with_metadata("history", mode.as_str())
    }

    /// Declares this state as hosting a nested machine, run to completion
    /// by an external executor: `initial_machine` names which machine to
    /// spawn on entry (an opaque tag — this crate has no machine type of
    /// its own to construct), and `is_done` is the predicate the executor
    /// polls to decide the nested machine has completed. Declaration only;
    /// requires `on_machine_done` before materialization succeeds.
    pub fn as_machine_state(
        mut self,
        initial_machine: impl Into<String>,
        is_done: impl Fn(TransitionContext<D, U>) -> FutureOr<bool> + Send + Sync + 'static,
    ) -> Self {
        self.is_machine_state = true;
        self.initial_machine = Some(initial_machine.into());
        self.is_done = Some(Arc::new(is_done));
        self
    }

    /// The handler run when the nested machine completes.
    pub fn on_machine_done(mut self, handler: TransitionHandlerDescriptor<D, U, ()>) -> Self {
        self.is_machine_state = true;
        self.on_machine_done = Some(handler);
        self
    }

    pub fn key(&self) -> &StateKey {
        &self.key
    }

    pub fn create_data(&self, ctx: &DataFactoryContext<U>) -> D {
        (self.initial_data)(ctx)
    }

    pub fn entry_handler(&self) -> Option<&TransitionHandlerDescriptor<D, U, ()>> {
        self.on_enter.as_ref()
    }

    pub fn exit_handler(&self) -> Option<&TransitionHandlerDescriptor<D, U, ()>> {
        self.on_exit.as_ref()
    }

    pub fn message_handler<M: Send + Sync + 'static>(&self) -> Option<&MessageHandlerDescriptor<M, D, U, ()>> {
        self.message_handlers
            .get(&TypeId::of::<M>())
            .and_then(|erased| erased.as_any().downcast_ref())
    }

    /// Registers a handler keyed by value equality rather than by type:
    /// only an incoming message of type `M` equal to `value` matches,
    /// checked ahead of the type-keyed map at dispatch. `name` labels the
    /// registration for diagrams.
    pub fn on_message_value<M>(
        mut self,
        value: M,
        handler: MessageHandlerDescriptor<M, D, U, ()>,
        name: Option<String>,
    ) -> Self
    where
        M: PartialEq + Send + Sync + 'static,
    {
        self.value_handlers.push(ValueKeyedHandler {
            name,
            matches: Box::new(move |msg: &dyn Any| msg.downcast_ref::<M>().map(|m| m == &value).unwrap_or(false)),
            handler: Box::new(handler),
        });
        self
    }

    /// Looks up the value-keyed handler (if any) whose declared value
    /// equals `value`, in declaration order.
    pub fn value_handler_for<M: Send + Sync + 'static>(&self, value: &M) -> Option<&MessageHandlerDescriptor<M, D, U, ()>> {
        self.value_handlers
            .iter()
            .find(|entry| (entry.matches)(value))
            .and_then(|entry| entry.handler.as_any().downcast_ref())
    }

    /// The `name` given to each value-keyed registration, in declaration
    /// order, for diagram rendering.
    pub fn value_handler_names(&self) -> impl Iterator<Item = Option<&str>> {
        self.value_handlers.iter().map(|entry| entry.name.as_deref())
    }

    /// Installs an "open-coded" fallthrough handler: mutually exclusive
    /// with the keyed maps above. If one is installed,
    /// [`StateBuilder::has_open_handler`] reports it so the executor can
    /// skip the keyed maps entirely — the open-coded handler wins and the
    /// map goes unused.
    pub fn handle_on_message(
        mut self,
        handler: impl Fn(AnyMessageContext<D, U>) -> FutureOr<HandlerOutcome> + Send + Sync + 'static,
    ) -> Self {
        self.open_handler = Some(Arc::new(handler));
        self
    }

    pub fn has_open_handler(&self) -> bool {
        self.open_handler.is_some()
    }

    pub fn open_handler(&self) -> Option<&Arc<dyn Fn(AnyMessageContext<D, U>) -> FutureOr<HandlerOutcome> + Send + Sync>> {
        self.open_handler.as_ref()
    }
}

impl<U> StateBuilder<(), U>
where
    U: Send + Sync + 'static,
{
    /// A state carrying no data of its own.
    pub fn stateless(key: impl Into<StateKey>) -> Self {
        Self::new(key, |_ctx| ())
    }

    /// A final leaf carrying no data: never a parent, never declares an
    /// initial child.
    pub fn final_state(key: impl Into<StateKey>) -> Self {
        Self::stateless(key).as_final()
    }

    /// A state declared as hosting a nested sub-machine, carrying no data
    /// of its own. Requires [`StateBuilder::on_machine_done`] before
    /// materialization succeeds.
    pub fn machine_state(
        key: impl Into<StateKey>,
        initial_machine: impl Into<String>,
        is_done: impl Fn(TransitionContext<(), U>) -> FutureOr<bool> + Send + Sync + 'static,
    ) -> Self {
        Self::stateless(key).as_machine_state(initial_machine, is_done)
    }
}

impl<D, U> StateBuilder<D, U>
where
    D: Send + Sync + 'static,
    U: Send + Sync + 'static,
{
    /// A final leaf carrying data of type `D`: may declare `initial_data`
    /// but never an initial child.
    pub fn final_data_state(
        key: impl Into<StateKey>,
        initial_data: impl Fn(&DataFactoryContext<U>) -> D + Send + Sync + 'static,
    ) -> Self {
        Self::new(key, initial_data).as_final()
    }
}

impl<D, U> ErasedStateNode<U> for StateBuilder<D, U>
where
    D: Send + Sync + 'static,
    U: Send + Sync + 'static,
{
    fn key(&self) -> &StateKey {
        &self.key
    }

    fn parent(&self) -> Option<&StateKey> {
        self.parent.as_ref()
    }

    fn set_parent(&mut self, parent: StateKey) {
        self.parent = Some(parent);
    }

    fn initial_child(&self) -> Option<&StateKey> {
        self.initial_child.as_ref()
    }

    fn set_initial_child(&mut self, child: StateKey) {
        self.initial_child = Some(child);
    }

    fn is_final(&self) -> bool {
        self.is_final
    }

    fn filters(&self) -> &[String] {
        &self.filters
    }

    fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    fn go_to_targets(&self) -> Vec<StateKey> {
        self.message_handlers
            .values()
            .flat_map(|handler| handler.info().go_to_targets())
            .chain(self.value_handlers.iter().flat_map(|entry| entry.handler.info().go_to_targets()))
            .collect()
    }

    fn is_machine_state(&self) -> bool {
        self.is_machine_state
    }

    fn has_machine_done_handler(&self) -> bool {
        self.on_machine_done.is_some()
    }

    fn codec(&self) -> Option<&str> {
        self.codec.as_deref()
    }

    fn initial_machine(&self) -> Option<&str> {
        self.initial_machine.as_deref()
    }

    fn has_done_predicate(&self) -> bool {
        self.is_done.is_some()
    }

    fn data_factory(&self) -> DataFactory<U> {
        let factory = self.initial_data.clone();
        Arc::new(move |ctx| Box::new(factory(ctx)) as Box<dyn Any + Send + Sync>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler_builder::MessageHandlerBuilder;
    use crate::key::StateKey as Key;

    #[test]
    fn stateless_builder_creates_unit_data() {
        let builder: StateBuilder<(), ()> = StateBuilder::stateless("s1").child_of("root");
        let ctx = DataFactoryContext::new(Arc::new(()), Key::new("s1"));
        assert_eq!(builder.create_data(&ctx), ());
        assert_eq!(builder.parent(), Some(&StateKey::new("root")));
    }

    #[test]
    fn data_factory_is_callable_once_per_entry() {
        let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let counted = calls.clone();
        let builder: StateBuilder<u32, ()> = StateBuilder::new("s1", move |_ctx| {
            counted.fetch_add(1, std::sync::atomic::Ordering::SeqCst)
        });

        let factory = ErasedStateNode::data_factory(&builder);
        let ctx = DataFactoryContext::new(Arc::new(()), Key::new("s1"));
        let first = *factory(&ctx).downcast::<u32>().unwrap();
        let second = *factory(&ctx).downcast::<u32>().unwrap();
        assert_eq!(first, 0);
        assert_eq!(second, 1);
    }

    #[test]
    fn registered_message_handler_is_retrievable_by_type() {
        struct Ping;
        let descriptor: MessageHandlerDescriptor<Ping, (), (), ()> =
            MessageHandlerBuilder::new().go_to("s2");
        let builder: StateBuilder<(), ()> = StateBuilder::stateless("s1").on_message(descriptor);

        assert!(builder.message_handler::<Ping>().is_some());
        assert_eq!(builder.go_to_targets(), vec![StateKey::new("s2")]);
    }

    #[test]
    fn machine_state_carries_initial_machine_and_done_predicate() {
        let builder: StateBuilder<(), ()> =
            StateBuilder::machine_state("a", "sub_machine", |_ctx| FutureOr::ready(true));
        assert_eq!(builder.initial_machine.as_deref(), Some("sub_machine"));
        assert!(ErasedStateNode::has_done_predicate(&builder));
    }
}
