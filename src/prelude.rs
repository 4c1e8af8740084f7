//! Convenience re-export of the types most call sites need.

pub use crate::channel::EntryChannel;
pub use crate::context::{
    AncestorDataSource, AnyMessageContext, ChannelPayloadSource, DataFactoryContext, MessageContext, TransitionContext,
};
pub use crate::descriptor::{
    HandlerOutcome, MessageHandlerDescriptor, MessageHandlerInfo, MessageHandlerType,
    TransitionHandlerDescriptor, TransitionHandlerInfo, TransitionHandlerType, TransitionOutcome,
};
pub use crate::error::{TreeDefinitionError, TreeResult};
pub use crate::future_or::FutureOr;
pub use crate::handler_builder::{MessageHandlerBuilder, TransitionHandlerBuilder, TransitionWhenBuilder, WhenBuilder};
pub use crate::key::{DataStateKey, StateKey};
pub use crate::node::{DataFactory, NodeBuildContext, NodeKind, TreeNodeBuildInfo};
pub use crate::state_builder::{HistoryMode, StateBuilder};
pub use crate::tree_builder::TreeBuilder;
