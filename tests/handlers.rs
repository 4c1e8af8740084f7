//! Exercises the handler-builder chains (guards, value-keyed dispatch,
//! open-coded fallthrough, ancestor-data access, channel payloads)
//! directly against descriptors, independent of tree materialization.

use std::sync::Arc;

use statecraft::prelude::*;

struct Ping(u32);

struct UserCtx {
    ancestor_value: Option<u32>,
    channel_payload: Option<u32>,
}

impl AncestorDataSource<u32> for UserCtx {
    fn ancestor_data(&self, _ancestor: &StateKey) -> Option<Arc<u32>> {
        self.ancestor_value.map(Arc::new)
    }
}

impl ChannelPayloadSource<u32> for UserCtx {
    fn channel_payload(&self) -> Option<Arc<u32>> {
        self.channel_payload.map(Arc::new)
    }
}

fn msg_ctx(msg: Ping, user: UserCtx) -> MessageContext<Ping, (), UserCtx> {
    MessageContext::new(Arc::new(msg), Arc::new(()), Arc::new(user), StateKey::new("s1"))
}

fn transition_ctx(user: UserCtx) -> TransitionContext<(), UserCtx> {
    TransitionContext::new(Arc::new(()), Arc::new(user), StateKey::new("s1"))
}

#[test]
fn guard_chain_falls_through_to_unhandled() {
    let descriptor: MessageHandlerDescriptor<Ping, (), UserCtx, ()> = MessageHandlerBuilder::new()
        .when("too_small", |ctx| FutureOr::ready(ctx.message.0 < 10))
        .go_to("small_branch")
        .unhandled();

    let ctx = msg_ctx(
        Ping(20),
        UserCtx {
            ancestor_value: None,
            channel_payload: None,
        },
    );
    let handler = descriptor.resolve(ctx.clone()).into_ready();
    assert_eq!(handler(ctx).into_ready(), HandlerOutcome::Unhandled);
}

#[test]
fn guard_chain_takes_first_satisfied_branch() {
    let descriptor: MessageHandlerDescriptor<Ping, (), UserCtx, ()> = MessageHandlerBuilder::new()
        .when("small", |ctx| FutureOr::ready(ctx.message.0 < 10))
        .go_to("small_branch")
        .unhandled();

    let ctx = msg_ctx(
        Ping(3),
        UserCtx {
            ancestor_value: None,
            channel_payload: None,
        },
    );
    let handler = descriptor.resolve(ctx.clone()).into_ready();
    assert_eq!(handler(ctx).into_ready(), HandlerOutcome::GoTo(StateKey::new("small_branch")));
}

#[test]
fn handler_with_data_reads_ancestor_when_present() {
    let descriptor: MessageHandlerDescriptor<Ping, (), UserCtx, ()> =
        MessageHandlerBuilder::new().handler_with_data("ancestor", |_ctx, data: Arc<u32>| {
            FutureOr::ready(if *data > 5 {
                HandlerOutcome::GoToSelf
            } else {
                HandlerOutcome::Stay
            })
        });

    let ctx = msg_ctx(
        Ping(0),
        UserCtx {
            ancestor_value: Some(9),
            channel_payload: None,
        },
    );
    let handler = descriptor.resolve(ctx.clone()).into_ready();
    assert_eq!(handler(ctx).into_ready(), HandlerOutcome::GoToSelf);
}

#[test]
fn handler_with_data_reports_unhandled_when_ancestor_missing() {
    let descriptor: MessageHandlerDescriptor<Ping, (), UserCtx, ()> =
        MessageHandlerBuilder::new().handler_with_data("ancestor", |_ctx, _data: Arc<u32>| {
            FutureOr::ready(HandlerOutcome::GoToSelf)
        });

    let ctx = msg_ctx(
        Ping(0),
        UserCtx {
            ancestor_value: None,
            channel_payload: None,
        },
    );
    let handler = descriptor.resolve(ctx.clone()).into_ready();
    assert_eq!(handler(ctx).into_ready(), HandlerOutcome::Unhandled);
}

#[test]
fn when_result_branches_on_success_and_error() {
    let descriptor: MessageHandlerDescriptor<Ping, (), UserCtx, ()> = MessageHandlerBuilder::new().when_result(
        |ctx| {
            FutureOr::ready(if ctx.message.0 % 2 == 0 {
                Ok(ctx.message.0)
            } else {
                Err("odd")
            })
        },
        |_ctx, value| FutureOr::ready(HandlerOutcome::GoTo(StateKey::new(format!("even-{}", value)))),
        Some(Arc::new(|_ctx, _err: Arc<&str>| FutureOr::ready(HandlerOutcome::Stay))),
    );

    let even_ctx = msg_ctx(
        Ping(4),
        UserCtx {
            ancestor_value: None,
            channel_payload: None,
        },
    );
    let handler = descriptor.resolve(even_ctx.clone()).into_ready();
    assert_eq!(handler(even_ctx).into_ready(), HandlerOutcome::GoTo(StateKey::new("even-4")));

    let odd_ctx = msg_ctx(
        Ping(5),
        UserCtx {
            ancestor_value: None,
            channel_payload: None,
        },
    );
    let handler = descriptor.resolve(odd_ctx.clone()).into_ready();
    assert_eq!(handler(odd_ctx).into_ready(), HandlerOutcome::Stay);
}

#[test]
fn value_keyed_handler_matches_only_declared_value() {
    let handler: MessageHandlerDescriptor<u32, (), (), ()> = MessageHandlerBuilder::new().go_to("matched");
    let state: StateBuilder<(), ()> = StateBuilder::stateless("s1").on_message_value(42u32, handler, Some("answer".into()));

    assert!(state.value_handler_for(&42u32).is_some());
    assert!(state.value_handler_for(&7u32).is_none());
}

#[test]
fn open_coded_handler_is_reported_as_installed() {
    let state: StateBuilder<(), ()> =
        StateBuilder::stateless("s1").handle_on_message(|_ctx| FutureOr::ready(HandlerOutcome::Unhandled));
    assert!(state.has_open_handler());

    let without: StateBuilder<(), ()> = StateBuilder::stateless("s2");
    assert!(!without.has_open_handler());
}

#[test]
fn transition_guard_chain_prefers_first_satisfied_branch() {
    let descriptor: TransitionHandlerDescriptor<(), UserCtx, ()> = TransitionHandlerBuilder::new()
        .when("has_payload", |ctx| FutureOr::ready(ctx.user_context.channel_payload().is_some()))
        .run("with_payload", |_ctx| {})
        .run("fallback", |_ctx| {});

    let ctx = transition_ctx(UserCtx {
        ancestor_value: None,
        channel_payload: Some(1),
    });
    let handler = descriptor.resolve(ctx.clone()).into_ready();
    assert_eq!(handler(ctx).into_ready(), TransitionOutcome::Completed);
}

#[test]
fn run_with_data_is_a_no_op_without_ancestor_data() {
    let descriptor: TransitionHandlerDescriptor<(), UserCtx, ()> =
        TransitionHandlerBuilder::new().run_with_data("touch", "ancestor", |_ctx, _data: Arc<u32>| {});

    let ctx = transition_ctx(UserCtx {
        ancestor_value: None,
        channel_payload: None,
    });
    let handler = descriptor.resolve(ctx.clone()).into_ready();
    assert_eq!(handler(ctx).into_ready(), TransitionOutcome::Completed);
}

#[test]
fn from_channel_reads_payload_when_present() {
    let descriptor: TransitionHandlerDescriptor<(), UserCtx, ()> =
        TransitionHandlerBuilder::new().from_channel(|_ctx, _payload: Arc<u32>| {});

    let ctx = transition_ctx(UserCtx {
        ancestor_value: None,
        channel_payload: Some(7),
    });
    let handler = descriptor.resolve(ctx.clone()).into_ready();
    assert_eq!(handler(ctx).into_ready(), TransitionOutcome::Completed);
}

#[test]
fn transition_when_result_falls_back_to_completed_with_no_error_continuation() {
    let descriptor: TransitionHandlerDescriptor<(), UserCtx, ()> = TransitionHandlerBuilder::new().when_result(
        |_ctx| FutureOr::ready(Err::<u32, &str>("boom")),
        |_ctx, _value| FutureOr::ready(TransitionOutcome::Completed),
        None,
    );

    let ctx = transition_ctx(UserCtx {
        ancestor_value: None,
        channel_payload: None,
    });
    let handler = descriptor.resolve(ctx.clone()).into_ready();
    assert_eq!(handler(ctx).into_ready(), TransitionOutcome::Completed);
}
