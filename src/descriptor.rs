//! The descriptor model: inspectable metadata paired with a factory that
//! produces an executable handler.
//!
//! A descriptor is never itself the handler. It carries an `info` object —
//! enough to render a diagram or validate `go_to` targets without running
//! anything — plus a two-stage factory: `make_context` derives an owned
//! descriptor context from the live message/transition context (this may
//! be deferred, e.g. an async guard predicate), and `make_handler` turns
//! that derived context into the handler the executor ultimately invokes
//! against the live context on every dispatch.
//!
//! This mirrors, in a plain-data form, the separation the teacher keeps
//! between declaring a transition's *shape* (`Source`, `Target`,
//! `EventEdge<E>`) and the system that evaluates it at runtime
//! (`transition_edge_listener`) — declaration and execution never share a
//! type.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::context::{MessageContext, TransitionContext};
use crate::future_or::FutureOr;
use crate::key::StateKey;

/// The kind of a message-handler descriptor, enough on its own to render a
/// diagram edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageHandlerType {
    GoTo,
    GoToSelf,
    Stay,
    Unhandled,
    When,
    WhenWithContext,
    WhenResult,
    Handler,
}

/// The kind of a transition (entry/exit) handler descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionHandlerType {
    Run,
    Post,
    Schedule,
    UpdateData,
    When,
    WhenResult,
}

/// Inspectable metadata for a message-handler descriptor. Sufficient to
/// render a diagram edge and, for `go_to` kinds, to validate the target
/// without executing anything.
#[derive(Debug, Clone, Default)]
pub struct MessageHandlerInfo {
    pub kind: Option<MessageHandlerType>,
    pub message_type: &'static str,
    pub actions: Vec<String>,
    pub conditions: Vec<String>,
    pub message_name: Option<String>,
    pub label: Option<String>,
    pub metadata: HashMap<String, String>,
    /// The `go_to` target, present only for `MessageHandlerType::GoTo`
    /// descriptors (and the terminal arm of `when`/`when_result` chains
    /// that ultimately go-to). The validator scans every descriptor's
    /// `go_to_target` to check invariant 5 without invoking handlers.
    pub go_to_target: Option<StateKey>,
    /// For a guard-composed descriptor (built via repeated `when`
    /// branches), the `info` of each guarded branch in declaration order,
    /// so the validator can reach every `go_to` target without having to
    /// evaluate any guard.
    pub branches: Vec<MessageHandlerInfo>,
}

impl MessageHandlerInfo {
    pub fn new(kind: MessageHandlerType, message_type: &'static str) -> Self {
        Self {
            kind: Some(kind),
            message_type,
            ..Default::default()
        }
    }

    pub fn with_go_to_target(mut self, target: StateKey) -> Self {
        self.go_to_target = Some(target);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.actions.push(action.into());
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.conditions.push(condition.into());
        self
    }

    pub fn with_branch(mut self, branch: MessageHandlerInfo) -> Self {
        self.branches.push(branch);
        self
    }

    /// Every `go_to` target reachable from this descriptor, including
    /// those nested behind guard branches, without evaluating any guard.
    pub fn go_to_targets(&self) -> Vec<StateKey> {
        let mut targets: Vec<StateKey> = self.go_to_target.iter().cloned().collect();
        for branch in &self.branches {
            targets.extend(branch.go_to_targets());
        }
        targets
    }
}

/// Inspectable metadata for a transition (entry/exit) handler descriptor.
#[derive(Debug, Clone, Default)]
pub struct TransitionHandlerInfo {
    pub kind: Option<TransitionHandlerType>,
    pub post_message_type: Option<&'static str>,
    pub update_data_type: Option<&'static str>,
    pub conditions: Vec<String>,
    pub label: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl TransitionHandlerInfo {
    pub fn new(kind: TransitionHandlerType) -> Self {
        Self {
            kind: Some(kind),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_post_message_type(mut self, ty: &'static str) -> Self {
        self.post_message_type = Some(ty);
        self
    }

    pub fn with_update_data_type(mut self, ty: &'static str) -> Self {
        self.update_data_type = Some(ty);
        self
    }
}

/// What running a message handler produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    GoTo(StateKey),
    GoToSelf,
    Stay,
    Unhandled,
}

/// What running a transition (entry/exit) handler produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Completed,
    Posted { message_type: &'static str },
    Scheduled { label: String },
    DataUpdated,
}

/// A handler the executor invokes with the live message context, produced
/// by a descriptor's `make_handler` stage.
pub type BoxMessageHandler<M, D, U> =
    Arc<dyn Fn(MessageContext<M, D, U>) -> FutureOr<HandlerOutcome> + Send + Sync>;

/// A handler the executor invokes with the live transition context.
pub type BoxTransitionHandlerFn<D, U> =
    Arc<dyn Fn(TransitionContext<D, U>) -> FutureOr<TransitionOutcome> + Send + Sync>;

/// A pair of inspectable `info` plus a two-stage factory producing an
/// executable message handler.
///
/// `Ctx` is the owned descriptor context derived by `make_context` — e.g.
/// resolved guard results or ancestor-data snapshots needed by the second
/// stage.
pub struct MessageHandlerDescriptor<M, D, U, Ctx> {
    pub info: MessageHandlerInfo,
    make_context: Arc<dyn Fn(MessageContext<M, D, U>) -> FutureOr<Ctx> + Send + Sync>,
    make_handler: Arc<dyn Fn(Ctx) -> BoxMessageHandler<M, D, U> + Send + Sync>,
}

impl<M, D, U, Ctx> MessageHandlerDescriptor<M, D, U, Ctx>
where
    M: Send + Sync + 'static,
    D: Send + Sync + 'static,
    U: Send + Sync + 'static,
    Ctx: Send + 'static,
{
    pub fn new(
        info: MessageHandlerInfo,
        make_context: impl Fn(MessageContext<M, D, U>) -> FutureOr<Ctx> + Send + Sync + 'static,
        make_handler: impl Fn(Ctx) -> BoxMessageHandler<M, D, U> + Send + Sync + 'static,
    ) -> Self {
        Self {
            info,
            make_context: Arc::new(make_context),
            make_handler: Arc::new(make_handler),
        }
    }

    /// A descriptor with no derived context: `handler` runs directly
    /// against the live message context. Covers the common
    /// `go_to`/`stay`/`unhandled` cases where no guard evaluation or
    /// ancestor-data snapshot is needed.
    pub fn immediate(
        info: MessageHandlerInfo,
        handler: impl Fn(MessageContext<M, D, U>) -> FutureOr<HandlerOutcome> + Send + Sync + 'static,
    ) -> MessageHandlerDescriptor<M, D, U, ()> {
        let handler: BoxMessageHandler<M, D, U> = Arc::new(handler);
        MessageHandlerDescriptor::new(info, |_ctx| FutureOr::ready(()), move |()| handler.clone())
    }

    /// Resolves this descriptor into an invocable handler for the given
    /// live message context.
    pub fn resolve(&self, msg_ctx: MessageContext<M, D, U>) -> FutureOr<BoxMessageHandler<M, D, U>> {
        let make_handler = self.make_handler.clone();
        (self.make_context)(msg_ctx).and_then(move |dctx| FutureOr::ready(make_handler(dctx)))
    }
}

impl<M, D, U, Ctx> fmt::Debug for MessageHandlerDescriptor<M, D, U, Ctx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageHandlerDescriptor")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// A pair of inspectable `info` plus a two-stage factory producing an
/// executable transition (entry/exit) handler.
pub struct TransitionHandlerDescriptor<D, U, Ctx> {
    pub info: TransitionHandlerInfo,
    make_context: Arc<dyn Fn(TransitionContext<D, U>) -> FutureOr<Ctx> + Send + Sync>,
    make_handler: Arc<dyn Fn(Ctx) -> BoxTransitionHandlerFn<D, U> + Send + Sync>,
}

impl<D, U, Ctx> TransitionHandlerDescriptor<D, U, Ctx>
where
    D: Send + Sync + 'static,
    U: Send + Sync + 'static,
    Ctx: Send + 'static,
{
    pub fn new(
        info: TransitionHandlerInfo,
        make_context: impl Fn(TransitionContext<D, U>) -> FutureOr<Ctx> + Send + Sync + 'static,
        make_handler: impl Fn(Ctx) -> BoxTransitionHandlerFn<D, U> + Send + Sync + 'static,
    ) -> Self {
        Self {
            info,
            make_context: Arc::new(make_context),
            make_handler: Arc::new(make_handler),
        }
    }

    pub fn immediate(
        info: TransitionHandlerInfo,
        handler: impl Fn(TransitionContext<D, U>) -> FutureOr<TransitionOutcome> + Send + Sync + 'static,
    ) -> TransitionHandlerDescriptor<D, U, ()> {
        let handler: BoxTransitionHandlerFn<D, U> = Arc::new(handler);
        TransitionHandlerDescriptor::new(info, |_ctx| FutureOr::ready(()), move |()| handler.clone())
    }

    pub fn resolve(&self, ctx: TransitionContext<D, U>) -> FutureOr<BoxTransitionHandlerFn<D, U>> {
        let make_handler = self.make_handler.clone();
        (self.make_context)(ctx).and_then(move |dctx| FutureOr::ready(make_handler(dctx)))
    }
}

impl<D, U, Ctx> fmt::Debug for TransitionHandlerDescriptor<D, U, Ctx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionHandlerDescriptor")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// One branch of a guarded `when` composition: a predicate over the
/// message context, and the sub-descriptor to run if it is the first
/// satisfied predicate in declaration order.
pub struct ConditionDescriptor<M, D, U> {
    pub label: Option<String>,
    predicate: Arc<dyn Fn(MessageContext<M, D, U>) -> FutureOr<bool> + Send + Sync>,
    pub when_true: Arc<MessageHandlerDescriptor<M, D, U, ()>>,
}

impl<M, D, U> ConditionDescriptor<M, D, U>
where
    M: Send + Sync + 'static,
    D: Send + Sync + 'static,
    U: Send + Sync + 'static,
{
    pub fn new(
        predicate: impl Fn(MessageContext<M, D, U>) -> FutureOr<bool> + Send + Sync + 'static,
        when_true: MessageHandlerDescriptor<M, D, U, ()>,
    ) -> Self {
        Self {
            label: None,
            predicate: Arc::new(predicate),
            when_true: Arc::new(when_true),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn evaluate(&self, msg_ctx: MessageContext<M, D, U>) -> FutureOr<bool> {
        (self.predicate)(msg_ctx)
    }
}

impl<M, D, U> Clone for ConditionDescriptor<M, D, U> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            predicate: self.predicate.clone(),
            when_true: self.when_true.clone(),
        }
    }
}

/// The transition-handler analogue of [`ConditionDescriptor`]: entry/exit
/// handlers may also be guard-composed (`TransitionHandlerType::When`),
/// even though a state still carries at most one resolved `on_enter`/`on_exit`
/// descriptor overall.
pub struct TransitionConditionDescriptor<D, U> {
    pub label: Option<String>,
    predicate: Arc<dyn Fn(TransitionContext<D, U>) -> FutureOr<bool> + Send + Sync>,
    pub when_true: Arc<TransitionHandlerDescriptor<D, U, ()>>,
}

impl<D, U> TransitionConditionDescriptor<D, U>
where
    D: Send + Sync + 'static,
    U: Send + Sync + 'static,
{
    pub fn new(
        predicate: impl Fn(TransitionContext<D, U>) -> FutureOr<bool> + Send + Sync + 'static,
        when_true: TransitionHandlerDescriptor<D, U, ()>,
    ) -> Self {
        Self {
            label: None,
            predicate: Arc::new(predicate),
            when_true: Arc::new(when_true),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn evaluate(&self, ctx: TransitionContext<D, U>) -> FutureOr<bool> {
        (self.predicate)(ctx)
    }
}

impl<D, U> Clone for TransitionConditionDescriptor<D, U> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            predicate: self.predicate.clone(),
            when_true: self.when_true.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_descriptor_resolves_synchronously() {
        let info = MessageHandlerInfo::new(MessageHandlerType::Stay, "unit");
        let descriptor: MessageHandlerDescriptor<(), (), (), ()> =
            MessageHandlerDescriptor::immediate(info, |_ctx| FutureOr::ready(HandlerOutcome::Stay));

        let msg_ctx = MessageContext::new(
            Arc::new(()),
            Arc::new(()),
            Arc::new(()),
            StateKey::new("s1"),
        );

        let handler = descriptor.resolve(msg_ctx.clone()).into_ready();
        let outcome = handler(msg_ctx).into_ready();
        assert_eq!(outcome, HandlerOutcome::Stay);
    }

    #[test]
    fn info_carries_go_to_target_for_validation() {
        let info = MessageHandlerInfo::new(MessageHandlerType::GoTo, "unit")
            .with_go_to_target(StateKey::new("s2"));
        assert_eq!(info.go_to_target, Some(StateKey::new("s2")));
    }
}
