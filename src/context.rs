//! Explicit context structs threaded through the handler-builder chain.
//!
//! The teacher's ECS observers receive their context implicitly (a
//! `Trigger<E>` plus `Query`/`Commands` system params). This crate has no
//! engine to supply that implicitly, so the builder API threads it
//! explicitly as plain structs. Fields are held behind `Arc` rather than
//! borrowed references: guard predicates and handler factories may defer
//! through [`crate::future_or::FutureOr::Pending`], which boxes a `'static`
//! future, so the context handed to them must itself be `'static` and
//! cheaply cloneable rather than tied to one call's stack frame.

use std::any::Any;
use std::sync::Arc;

use crate::key::StateKey;

/// The context visible to a message handler: the incoming message `M`,
/// this state's own data `D`, and a user-supplied context `U` (commonly a
/// handle into the surrounding application, injected by the executor).
pub struct MessageContext<M, D, U> {
    pub message: Arc<M>,
    pub state_data: Arc<D>,
    pub user_context: Arc<U>,
    /// The key of the state this handler was registered on.
    pub state: StateKey,
}

impl<M, D, U> MessageContext<M, D, U> {
    pub fn new(message: Arc<M>, state_data: Arc<D>, user_context: Arc<U>, state: StateKey) -> Self {
        Self {
            message,
            state_data,
            user_context,
            state,
        }
    }
}

impl<M, D, U> Clone for MessageContext<M, D, U> {
    fn clone(&self) -> Self {
        Self {
            message: self.message.clone(),
            state_data: self.state_data.clone(),
            user_context: self.user_context.clone(),
            state: self.state.clone(),
        }
    }
}

/// The context visible to an entry/exit (transition) handler.
pub struct TransitionContext<D, U> {
    pub state_data: Arc<D>,
    pub user_context: Arc<U>,
    pub state: StateKey,
}

impl<D, U> TransitionContext<D, U> {
    pub fn new(state_data: Arc<D>, user_context: Arc<U>, state: StateKey) -> Self {
        Self {
            state_data,
            user_context,
            state,
        }
    }
}

impl<D, U> Clone for TransitionContext<D, U> {
    fn clone(&self) -> Self {
        Self {
            state_data: self.state_data.clone(),
            user_context: self.user_context.clone(),
            state: self.state.clone(),
        }
    }
}

/// The context visible to the single "open-coded" fallthrough handler a
/// state may install with `handle_on_message`, which receives the incoming
/// message with its concrete type already erased — unlike [`MessageContext`],
/// which is specialized per message type `M`.
pub struct AnyMessageContext<D, U> {
    pub message: Arc<dyn Any + Send + Sync>,
    pub state_data: Arc<D>,
    pub user_context: Arc<U>,
    pub state: StateKey,
}

impl<D, U> Clone for AnyMessageContext<D, U> {
    fn clone(&self) -> Self {
        Self {
            message: self.message.clone(),
            state_data: self.state_data.clone(),
            user_context: self.user_context.clone(),
            state: self.state.clone(),
        }
    }
}

/// Ancestor-data access obligation: implemented by a user context `U` that
/// can resolve the data value carried by a proper ancestor data-state,
/// reachable via its key. Handler chains that read a proper ancestor's data
/// require `U: AncestorDataSource<DAnc>`, which is how the builder chain
/// obliges downstream handlers to observe a `DAnc` without the core
/// depending on how ancestor data is actually stored at runtime (that
/// remains the executor's concern).
pub trait AncestorDataSource<DAnc> {
    fn ancestor_data(&self, ancestor: &StateKey) -> Option<Arc<DAnc>>;
}

/// Channel-payload access obligation: implemented by a user context `U`
/// that can supply the payload a transition carried through an
/// [`crate::channel::EntryChannel<P>`]. Entry handlers that read a
/// channel's payload require `U: ChannelPayloadSource<P>`.
pub trait ChannelPayloadSource<P> {
    fn channel_payload(&self) -> Option<Arc<P>>;
}

/// The context available when a state's data factory runs on entry: the
/// shared user context and the key of the state being entered. Deliberately
/// carries no `state_data` field of its own `D` — the factory's whole job
/// is to produce that value, so there is nothing yet to hand back.
pub struct DataFactoryContext<U> {
    pub user_context: Arc<U>,
    pub state: StateKey,
}

impl<U> DataFactoryContext<U> {
    pub fn new(user_context: Arc<U>, state: StateKey) -> Self {
        Self { user_context, state }
    }
}

impl<U> Clone for DataFactoryContext<U> {
    fn clone(&self) -> Self {
        Self {
            user_context: self.user_context.clone(),
            state: self.state.clone(),
        }
    }
}
