//! Fluent builders assembling handler descriptors from chained calls.
//!
//! `MessageHandlerBuilder` mirrors the guard chains the teacher expresses
//! as `Guards` components checked by a run condition before a transition
//! system fires — here the same "first satisfied guard wins, otherwise
//! fall through" shape is expressed as an ordered list of
//! [`ConditionDescriptor`] branches plus a terminal fallback, evaluated by
//! [`FutureOr`] chaining rather than a Bevy run condition.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::context::{AncestorDataSource, ChannelPayloadSource, MessageContext, TransitionContext};
use crate::descriptor::{
    ConditionDescriptor, HandlerOutcome, MessageHandlerDescriptor, MessageHandlerInfo,
    MessageHandlerType, TransitionConditionDescriptor, TransitionHandlerDescriptor, TransitionHandlerInfo,
    TransitionHandlerType, TransitionOutcome,
};
use crate::future_or::FutureOr;
use crate::key::StateKey;

fn evaluate_branches<M, D, U>(
    branches: Arc<Vec<ConditionDescriptor<M, D, U>>>,
    index: usize,
    fallback: Arc<MessageHandlerDescriptor<M, D, U, ()>>,
    msg_ctx: MessageContext<M, D, U>,
) -> FutureOr<HandlerOutcome>
where
    M: Send + Sync + 'static,
    D: Send + Sync + 'static,
    U: Send + Sync + 'static,
{
    if index >= branches.len() {
        let ctx = msg_ctx.clone();
        return fallback.resolve(msg_ctx).and_then(move |handler| handler(ctx));
    }

    let branch = branches[index].clone();
    let ctx_for_eval = msg_ctx.clone();
    branch.evaluate(ctx_for_eval).and_then(move |matched| {
        if matched {
            let ctx = msg_ctx.clone();
            branch.when_true.resolve(msg_ctx).and_then(move |handler| handler(ctx))
        } else {
            evaluate_branches(branches, index + 1, fallback, msg_ctx)
        }
    })
}

/// Accumulates guarded branches for one message type `M` on one state,
/// terminating in a single unguarded outcome (`go_to`, `go_to_self`,
/// `stay`, `unhandled`, or a fully custom `handler`).
pub struct MessageHandlerBuilder<M, D, U> {
    branches: Vec<ConditionDescriptor<M, D, U>>,
    _pd: PhantomData<fn(M, D, U)>,
}

impl<M, D, U> MessageHandlerBuilder<M, D, U>
where
    M: Send + Sync + 'static,
    D: Send + Sync + 'static,
    U: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            branches: Vec::new(),
            _pd: PhantomData,
        }
    }

    /// Begins a guarded branch: if `predicate` is the first branch (in
    /// declaration order) to hold for the incoming message, its
    /// consequence is taken instead of falling through to later branches
    /// or the final terminal call.
    pub fn when(
        self,
        label: impl Into<String>,
        predicate: impl Fn(MessageContext<M, D, U>) -> FutureOr<bool> + Send + Sync + 'static,
    ) -> WhenBuilder<M, D, U> {
        WhenBuilder {
            parent: self,
            label: label.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Like [`Self::when`], but the predicate additionally observes a
    /// proper ancestor's data `DAnc`, resolved through the shared user
    /// context's ancestor-data obligation, reused here for guard
    /// predicates.
    pub fn when_with_data<DAnc>(
        self,
        label: impl Into<String>,
        ancestor: impl Into<StateKey>,
        predicate: impl Fn(MessageContext<M, D, U>, Arc<DAnc>) -> bool + Send + Sync + 'static,
    ) -> WhenBuilder<M, D, U>
    where
        U: AncestorDataSource<DAnc>,
        DAnc: Send + Sync + 'static,
    {
        let ancestor = ancestor.into();
        self.when(label, move |ctx| {
            let matched = ctx
                .user_context
                .ancestor_data(&ancestor)
                .map(|data| predicate(ctx.clone(), data))
                .unwrap_or(false);
            FutureOr::ready(matched)
        })
    }

    /// Terminal: produces a `Result<T, E>` and branches on it. On success,
    /// `on_success` runs with the resolved `T` in hand; on error, `on_error`
    /// runs if registered, otherwise the error is logged and treated as
    /// unhandled — the core has no asynchronous-error channel of its own,
    /// so surfacing it further is the executor's concern once it observes
    /// the unhandled outcome.
    pub fn when_result<T, E>(
        self,
        compute: impl Fn(MessageContext<M, D, U>) -> FutureOr<Result<T, E>> + Send + Sync + 'static,
        on_success: impl Fn(MessageContext<M, D, U>, Arc<T>) -> FutureOr<HandlerOutcome> + Send + Sync + 'static,
        on_error: Option<Arc<dyn Fn(MessageContext<M, D, U>, Arc<E>) -> FutureOr<HandlerOutcome> + Send + Sync>>,
    ) -> MessageHandlerDescriptor<M, D, U, ()>
    where
        T: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        let info = MessageHandlerInfo::new(MessageHandlerType::WhenResult, std::any::type_name::<M>());
        let on_success = Arc::new(on_success);
        self.terminal(info, move |msg_ctx| {
            let ctx_for_branch = msg_ctx.clone();
            let on_error = on_error.clone();
            let on_success = on_success.clone();
            compute(msg_ctx).and_then(move |result| match result {
                Ok(value) => on_success(ctx_for_branch, Arc::new(value)),
                Err(err) => match &on_error {
                    Some(on_error) => on_error(ctx_for_branch, Arc::new(err)),
                    None => {
                        tracing::error!(
                            "when_result produced an error with no registered continuation; reporting unhandled"
                        );
                        FutureOr::ready(HandlerOutcome::Unhandled)
                    }
                },
            })
        })
    }

    fn terminal(
        self,
        info: MessageHandlerInfo,
        handler: impl Fn(MessageContext<M, D, U>) -> FutureOr<HandlerOutcome> + Send + Sync + 'static,
    ) -> MessageHandlerDescriptor<M, D, U, ()> {
        if self.branches.is_empty() {
            return MessageHandlerDescriptor::immediate(info, handler);
        }

        let mut full_info = info.clone();
        for branch in &self.branches {
            full_info = full_info.with_branch(branch.when_true.info.clone());
        }

        let branches = Arc::new(self.branches);
        let fallback = Arc::new(MessageHandlerDescriptor::immediate(info, handler));
        MessageHandlerDescriptor::immediate(full_info, move |msg_ctx| {
            evaluate_branches(branches.clone(), 0, fallback.clone(), msg_ctx)
        })
    }

    /// Terminal: transition to `target` whenever no earlier guard fires.
    pub fn go_to(self, target: impl Into<StateKey>) -> MessageHandlerDescriptor<M, D, U, ()> {
        let target = target.into();
        let info = MessageHandlerInfo::new(MessageHandlerType::GoTo, std::any::type_name::<M>())
            .with_go_to_target(target.clone());
        self.terminal(info, move |_ctx| FutureOr::ready(HandlerOutcome::GoTo(target.clone())))
    }

    /// Terminal: re-enter the current state (self-transition).
    pub fn go_to_self(self) -> MessageHandlerDescriptor<M, D, U, ()> {
        let info = MessageHandlerInfo::new(MessageHandlerType::GoToSelf, std::any::type_name::<M>());
        self.terminal(info, |_ctx| FutureOr::ready(HandlerOutcome::GoToSelf))
    }

    /// Terminal: handle the message without leaving the current state.
    pub fn stay(self) -> MessageHandlerDescriptor<M, D, U, ()> {
        let info = MessageHandlerInfo::new(MessageHandlerType::Stay, std::any::type_name::<M>());
        self.terminal(info, |_ctx| FutureOr::ready(HandlerOutcome::Stay))
    }

    /// Terminal: declare this message unhandled here, so it is offered to
    /// an ancestor state.
    pub fn unhandled(self) -> MessageHandlerDescriptor<M, D, U, ()> {
        let info = MessageHandlerInfo::new(MessageHandlerType::Unhandled, std::any::type_name::<M>());
        self.terminal(info, |_ctx| FutureOr::ready(HandlerOutcome::Unhandled))
    }

    /// Terminal: a fully custom handler deciding its own outcome.
    pub fn handler(
        self,
        f: impl Fn(MessageContext<M, D, U>) -> FutureOr<HandlerOutcome> + Send + Sync + 'static,
    ) -> MessageHandlerDescriptor<M, D, U, ()> {
        let info = MessageHandlerInfo::new(MessageHandlerType::Handler, std::any::type_name::<M>());
        self.terminal(info, f)
    }

    /// Terminal: a custom handler that additionally observes a proper
    /// ancestor's data `DAnc`. Falls through to `unhandled` if the
    /// ancestor's data isn't reachable through the shared user context
    /// (e.g. the ancestor hasn't been entered yet).
    pub fn handler_with_data<DAnc>(
        self,
        ancestor: impl Into<StateKey>,
        f: impl Fn(MessageContext<M, D, U>, Arc<DAnc>) -> FutureOr<HandlerOutcome> + Send + Sync + 'static,
    ) -> MessageHandlerDescriptor<M, D, U, ()>
    where
        U: AncestorDataSource<DAnc>,
        DAnc: Send + Sync + 'static,
    {
        let ancestor = ancestor.into();
        self.handler(move |ctx| match ctx.user_context.ancestor_data(&ancestor) {
            Some(data) => f(ctx, data),
            None => FutureOr::ready(HandlerOutcome::Unhandled),
        })
    }
}

impl<M, D, U> Default for MessageHandlerBuilder<M, D, U>
where
    M: Send + Sync + 'static,
    D: Send + Sync + 'static,
    U: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// The guarded-branch half of a `when(...)` call: must be completed with
/// exactly one terminal method before the branch can be added to the
/// parent builder.
pub struct WhenBuilder<M, D, U> {
    parent: MessageHandlerBuilder<M, D, U>,
    label: String,
    predicate: Arc<dyn Fn(MessageContext<M, D, U>) -> FutureOr<bool> + Send + Sync>,
}

impl<M, D, U> WhenBuilder<M, D, U>
where
    M: Send + Sync + 'static,
    D: Send + Sync + 'static,
    U: Send + Sync + 'static,
{
    fn push(mut self, consequence: MessageHandlerDescriptor<M, D, U, ()>) -> MessageHandlerBuilder<M, D, U> {
        let predicate = self.predicate.clone();
        let condition = ConditionDescriptor::new(move |ctx| predicate(ctx), consequence).with_label(self.label);
        self.parent.branches.push(condition);
        self.parent
    }

    pub fn go_to(self, target: impl Into<StateKey>) -> MessageHandlerBuilder<M, D, U> {
        let target = target.into();
        let info = MessageHandlerInfo::new(MessageHandlerType::GoTo, std::any::type_name::<M>())
            .with_go_to_target(target.clone());
        let descriptor =
            MessageHandlerDescriptor::immediate(info, move |_ctx| FutureOr::ready(HandlerOutcome::GoTo(target.clone())));
        self.push(descriptor)
    }

    pub fn go_to_self(self) -> MessageHandlerBuilder<M, D, U> {
        let info = MessageHandlerInfo::new(MessageHandlerType::GoToSelf, std::any::type_name::<M>());
        let descriptor = MessageHandlerDescriptor::immediate(info, |_ctx| FutureOr::ready(HandlerOutcome::GoToSelf));
        self.push(descriptor)
    }

    pub fn stay(self) -> MessageHandlerBuilder<M, D, U> {
        let info = MessageHandlerInfo::new(MessageHandlerType::Stay, std::any::type_name::<M>());
        let descriptor = MessageHandlerDescriptor::immediate(info, |_ctx| FutureOr::ready(HandlerOutcome::Stay));
        self.push(descriptor)
    }

    pub fn handler(
        self,
        f: impl Fn(MessageContext<M, D, U>) -> FutureOr<HandlerOutcome> + Send + Sync + 'static,
    ) -> MessageHandlerBuilder<M, D, U> {
        let info = MessageHandlerInfo::new(MessageHandlerType::Handler, std::any::type_name::<M>());
        let descriptor = MessageHandlerDescriptor::immediate(info, f);
        self.push(descriptor)
    }
}

fn evaluate_transition_branches<D, U>(
    branches: Arc<Vec<TransitionConditionDescriptor<D, U>>>,
    index: usize,
    fallback: Arc<TransitionHandlerDescriptor<D, U, ()>>,
    ctx: TransitionContext<D, U>,
) -> FutureOr<TransitionOutcome>
where
    D: Send + Sync + 'static,
    U: Send + Sync + 'static,
{
    if index >= branches.len() {
        let for_handler = ctx.clone();
        return fallback.resolve(ctx).and_then(move |handler| handler(for_handler));
    }

    let branch = branches[index].clone();
    let for_eval = ctx.clone();
    branch.evaluate(for_eval).and_then(move |matched| {
        if matched {
            let for_handler = ctx.clone();
            branch.when_true.resolve(ctx).and_then(move |handler| handler(for_handler))
        } else {
            evaluate_transition_branches(branches, index + 1, fallback, ctx)
        }
    })
}

/// Accumulates the single handler for an entry or exit transition on one
/// state. A transition handler may itself be guard-composed
/// (`TransitionHandlerType::When`) even though each state still resolves
/// to at most one `on_enter`/`on_exit` descriptor overall — the guard
/// chain lives *inside* that single descriptor, mirroring
/// [`MessageHandlerBuilder`]'s `when`/terminal shape.
pub struct TransitionHandlerBuilder<D, U> {
    branches: Vec<TransitionConditionDescriptor<D, U>>,
    _pd: PhantomData<fn(D, U)>,
}

impl<D, U> TransitionHandlerBuilder<D, U>
where
    D: Send + Sync + 'static,
    U: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            branches: Vec::new(),
            _pd: PhantomData,
        }
    }

    /// Begins a guarded branch: if `predicate` is the first branch (in
    /// declaration order) to hold, its consequence is taken instead of
    /// falling through to later branches or the final terminal call.
    pub fn when(
        self,
        label: impl Into<String>,
        predicate: impl Fn(TransitionContext<D, U>) -> FutureOr<bool> + Send + Sync + 'static,
    ) -> TransitionWhenBuilder<D, U> {
        TransitionWhenBuilder {
            parent: self,
            label: label.into(),
            predicate: Arc::new(predicate),
        }
    }

    fn terminal(
        self,
        info: TransitionHandlerInfo,
        handler: impl Fn(TransitionContext<D, U>) -> FutureOr<TransitionOutcome> + Send + Sync + 'static,
    ) -> TransitionHandlerDescriptor<D, U, ()> {
        if self.branches.is_empty() {
            return TransitionHandlerDescriptor::immediate(info, handler);
        }

        let mut full_info = info.clone();
        for branch in &self.branches {
            full_info.conditions.push(branch.label.clone().unwrap_or_default());
        }

        let branches = Arc::new(self.branches);
        let fallback = Arc::new(TransitionHandlerDescriptor::immediate(info, handler));
        TransitionHandlerDescriptor::immediate(full_info, move |ctx| {
            evaluate_transition_branches(branches.clone(), 0, fallback.clone(), ctx)
        })
    }

    /// Runs an arbitrary side-effecting action, producing no further
    /// runtime consequence.
    pub fn run(
        self,
        label: impl Into<String>,
        f: impl Fn(TransitionContext<D, U>) + Send + Sync + 'static,
    ) -> TransitionHandlerDescriptor<D, U, ()> {
        let info = TransitionHandlerInfo::new(TransitionHandlerType::Run).with_label(label);
        self.terminal(info, move |ctx| {
            f(ctx);
            FutureOr::ready(TransitionOutcome::Completed)
        })
    }

    /// Like [`Self::run`], but additionally observes a proper ancestor's
    /// data `DAnc`. A no-op if the ancestor's data isn't reachable yet.
    pub fn run_with_data<DAnc>(
        self,
        label: impl Into<String>,
        ancestor: impl Into<StateKey>,
        f: impl Fn(TransitionContext<D, U>, Arc<DAnc>) + Send + Sync + 'static,
    ) -> TransitionHandlerDescriptor<D, U, ()>
    where
        U: AncestorDataSource<DAnc>,
        DAnc: Send + Sync + 'static,
    {
        let ancestor = ancestor.into();
        self.run(label, move |ctx| {
            if let Some(data) = ctx.user_context.ancestor_data(&ancestor) {
                f(ctx, data);
            }
        })
    }

    /// Posts a message of type `P` for the executor to dispatch, mirroring
    /// the teacher's `world.trigger_targets` after a transition completes.
    pub fn post<P>(
        self,
        f: impl Fn(TransitionContext<D, U>) -> P + Send + Sync + 'static,
    ) -> TransitionHandlerDescriptor<D, U, ()>
    where
        P: Send + Sync + 'static,
    {
        let info = TransitionHandlerInfo::new(TransitionHandlerType::Post)
            .with_post_message_type(std::any::type_name::<P>());
        self.terminal(info, move |ctx| {
            let _posted = f(ctx);
            FutureOr::ready(TransitionOutcome::Posted {
                message_type: std::any::type_name::<P>(),
            })
        })
    }

    /// Schedules a timer under `label`, left to the executor's pluggable
    /// timer implementation to actually arm.
    pub fn schedule(self, label: impl Into<String>) -> TransitionHandlerDescriptor<D, U, ()> {
        let label = label.into();
        let info = TransitionHandlerInfo::new(TransitionHandlerType::Schedule).with_label(label.clone());
        self.terminal(info, move |_ctx| {
            FutureOr::ready(TransitionOutcome::Scheduled { label: label.clone() })
        })
    }

    /// Computes and reports this state's updated data value. The executor
    /// is responsible for actually committing `D` into the running node.
    pub fn update_data(
        self,
        f: impl Fn(TransitionContext<D, U>) -> D + Send + Sync + 'static,
    ) -> TransitionHandlerDescriptor<D, U, ()> {
        let info =
            TransitionHandlerInfo::new(TransitionHandlerType::UpdateData).with_update_data_type(std::any::type_name::<D>());
        self.terminal(info, move |ctx| {
            let _next = f(ctx);
            FutureOr::ready(TransitionOutcome::DataUpdated)
        })
    }

    /// A transition handler that observes the payload carried through an
    /// [`crate::channel::EntryChannel<P>`], obliged via
    /// [`ChannelPayloadSource`] on the shared user context.
    pub fn from_channel<P>(
        self,
        f: impl Fn(TransitionContext<D, U>, Arc<P>) + Send + Sync + 'static,
    ) -> TransitionHandlerDescriptor<D, U, ()>
    where
        U: ChannelPayloadSource<P>,
        P: Send + Sync + 'static,
    {
        let info = TransitionHandlerInfo::new(TransitionHandlerType::Run).with_label("from_channel");
        self.terminal(info, move |ctx| {
            if let Some(payload) = ctx.user_context.channel_payload() {
                f(ctx, payload);
            }
            FutureOr::ready(TransitionOutcome::Completed)
        })
    }

    /// Terminal: produces a `Result<T, E>` and branches on it, the
    /// transition-handler counterpart of
    /// [`MessageHandlerBuilder::when_result`].
    pub fn when_result<T, E>(
        self,
        compute: impl Fn(TransitionContext<D, U>) -> FutureOr<Result<T, E>> + Send + Sync + 'static,
        on_success: impl Fn(TransitionContext<D, U>, Arc<T>) -> FutureOr<TransitionOutcome> + Send + Sync + 'static,
        on_error: Option<Arc<dyn Fn(TransitionContext<D, U>, Arc<E>) -> FutureOr<TransitionOutcome> + Send + Sync>>,
    ) -> TransitionHandlerDescriptor<D, U, ()>
    where
        T: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        let info = TransitionHandlerInfo::new(TransitionHandlerType::WhenResult);
        let on_success = Arc::new(on_success);
        self.terminal(info, move |ctx| {
            let ctx_for_branch = ctx.clone();
            let on_error = on_error.clone();
            let on_success = on_success.clone();
            compute(ctx).and_then(move |result| match result {
                Ok(value) => on_success(ctx_for_branch, Arc::new(value)),
                Err(err) => match &on_error {
                    Some(on_error) => on_error(ctx_for_branch, Arc::new(err)),
                    None => {
                        tracing::error!(
                            "when_result produced an error with no registered continuation; reporting completed"
                        );
                        FutureOr::ready(TransitionOutcome::Completed)
                    }
                },
            })
        })
    }
}

impl<D, U> Default for TransitionHandlerBuilder<D, U>
where
    D: Send + Sync + 'static,
    U: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// The guarded-branch half of a `when(...)` call on a
/// [`TransitionHandlerBuilder`]: must be completed with exactly one
/// terminal method before the branch is added to the parent builder.
pub struct TransitionWhenBuilder<D, U> {
    parent: TransitionHandlerBuilder<D, U>,
    label: String,
    predicate: Arc<dyn Fn(TransitionContext<D, U>) -> FutureOr<bool> + Send + Sync>,
}

impl<D, U> TransitionWhenBuilder<D, U>
where
    D: Send + Sync + 'static,
    U: Send + Sync + 'static,
{
    fn push(mut self, consequence: TransitionHandlerDescriptor<D, U, ()>) -> TransitionHandlerBuilder<D, U> {
        let predicate = self.predicate.clone();
        let condition =
            TransitionConditionDescriptor::new(move |ctx| predicate(ctx), consequence).with_label(self.label);
        self.parent.branches.push(condition);
        self.parent
    }

    pub fn run(
        self,
        label: impl Into<String>,
        f: impl Fn(TransitionContext<D, U>) + Send + Sync + 'static,
    ) -> TransitionHandlerBuilder<D, U> {
        let info = TransitionHandlerInfo::new(TransitionHandlerType::Run).with_label(label);
        let descriptor = TransitionHandlerDescriptor::immediate(info, move |ctx| {
            f(ctx);
            FutureOr::ready(TransitionOutcome::Completed)
        });
        self.push(descriptor)
    }

    pub fn post<P>(self, f: impl Fn(TransitionContext<D, U>) -> P + Send + Sync + 'static) -> TransitionHandlerBuilder<D, U>
    where
        P: Send + Sync + 'static,
    {
        let info = TransitionHandlerInfo::new(TransitionHandlerType::Post)
            .with_post_message_type(std::any::type_name::<P>());
        let descriptor = TransitionHandlerDescriptor::immediate(info, move |ctx| {
            let _posted = f(ctx);
            FutureOr::ready(TransitionOutcome::Posted {
                message_type: std::any::type_name::<P>(),
            })
        });
        self.push(descriptor)
    }

    pub fn schedule(self, label: impl Into<String>) -> TransitionHandlerBuilder<D, U> {
        let label = label.into();
        let info = TransitionHandlerInfo::new(TransitionHandlerType::Schedule).with_label(label.clone());
        let descriptor = TransitionHandlerDescriptor::immediate(info, move |_ctx| {
            FutureOr::ready(TransitionOutcome::Scheduled { label: label.clone() })
        });
        self.push(descriptor)
    }

    pub fn update_data(self, f: impl Fn(TransitionContext<D, U>) -> D + Send + Sync + 'static) -> TransitionHandlerBuilder<D, U> {
        let info =
            TransitionHandlerInfo::new(TransitionHandlerType::UpdateData).with_update_data_type(std::any::type_name::<D>());
        let descriptor = TransitionHandlerDescriptor::immediate(info, move |ctx| {
            let _next = f(ctx);
            FutureOr::ready(TransitionOutcome::DataUpdated)
        });
        self.push(descriptor)
    }
}
