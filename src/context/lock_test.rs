use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;

use super::lock::in_user_callback;
use crate::test_utils::read_notify_reply;
use crate::test_utils::server_addr;
use crate::test_utils::RecordingChannelNotify;
use crate::test_utils::TestContext;
use crate::ChannelId;
use crate::ChannelNotify;
use crate::ChannelState;
use crate::Context;
use crate::DbrType;
use crate::Error;
use crate::ReadNotify;
use crate::Status;

/// Calls back into the context from inside its callbacks.
#[derive(Default)]
struct Reentrant {
    context: Mutex<Option<Context>>,
    seen_states: Mutex<Vec<ChannelState>>,
    block_results: Mutex<Vec<Result<bool, String>>>,
    inside_callback: Mutex<Vec<bool>>,
}

impl Reentrant {
    fn context(&self) -> Context {
        match self.context.lock().clone() {
            Some(context) => context,
            None => panic!("context not attached"),
        }
    }
}

impl ChannelNotify for Reentrant {
    fn connect_notify(
        &self,
        channel: ChannelId,
    ) {
        self.inside_callback.lock().push(in_user_callback());
        if let Ok(info) = self.context().channel_info(channel) {
            self.seen_states.lock().push(info.state);
        }
    }

    fn disconnect_notify(
        &self,
        _channel: ChannelId,
    ) {
    }
}

impl ReadNotify for Reentrant {
    fn completion(
        &self,
        _data_type: DbrType,
        _count: u32,
        _data: &Bytes,
    ) {
        let context = self.context();
        let group = context.sync_group_create();
        let result = context
            .sync_group_block(group, Duration::from_millis(1))
            .map_err(|e| e.to_string());
        self.block_results.lock().push(result);
    }

    fn exception(
        &self,
        _status: Status,
        _context: &str,
        _data_type: DbrType,
        _count: u32,
    ) {
    }
}

#[test]
fn test_callback_may_reenter_context() {
    let ctx = TestContext::new();
    let notify = Arc::new(Reentrant::default());
    *notify.context.lock() = Some(ctx.context.clone());

    ctx.connect_channel("motor1:pos", notify.clone(), server_addr(1), DbrType::DOUBLE, 1);

    assert_eq!(*notify.seen_states.lock(), vec![ChannelState::Connected]);
    assert_eq!(*notify.inside_callback.lock(), vec![true]);
    assert!(!in_user_callback());
}

#[test]
fn test_blocking_inside_callback_is_refused() {
    let ctx = TestContext::new();
    let notify = Arc::new(Reentrant::default());
    *notify.context.lock() = Some(ctx.context.clone());
    let (cid, circuit) = ctx.connect_channel("motor1:pos", notify.clone(), server_addr(1), DbrType::DOUBLE, 1);

    let io = ctx
        .context
        .read_notify_request(cid, DbrType::DOUBLE, 1, notify.clone())
        .unwrap();
    ctx.context
        .deliver(circuit, &read_notify_reply(io, Status::Normal, DbrType::DOUBLE, 1, &[0; 8]));

    assert_eq!(
        *notify.block_results.lock(),
        vec![Err(Error::BlockingInCallback.to_string())]
    );
}

#[test]
fn test_every_callback_batch_is_bracketed() {
    let ctx = TestContext::new();
    let notify = RecordingChannelNotify::new();

    ctx.connect_channel("motor1:pos", notify, server_addr(1), DbrType::DOUBLE, 1);
    ctx.context.exception(Status::Internal, "outer", file!(), line!());

    assert!(ctx.notify.initiated() > 0);
    assert_eq!(ctx.notify.initiated(), ctx.notify.completed());
}

#[test]
fn test_nested_callback_guard_brackets_once() {
    let ctx = TestContext::new();
    let inner = &ctx.context.inner;

    {
        let _outer = inner.callback_guard();
        let _nested = inner.callback_guard();
        assert_eq!(ctx.notify.initiated(), 1);
    }

    assert_eq!(ctx.notify.initiated(), 1);
    assert_eq!(ctx.notify.completed(), 1);
}

#[test]
#[should_panic(expected = "callback lock requested while holding the context state lock")]
fn test_callback_lock_after_state_lock_panics() {
    let ctx = TestContext::new();
    let inner = &ctx.context.inner;

    let _state = inner.lock_state_only();
    let _callbacks = inner.callback_guard();
}

#[test]
#[should_panic(expected = "context state lock is not reentrant")]
fn test_state_lock_is_not_reentrant() {
    let ctx = TestContext::new();
    let inner = &ctx.context.inner;

    let _first = inner.lock_state_only();
    let _second = inner.lock_state_only();
}

#[test]
fn test_unlocked_releases_state_lock_for_the_closure() {
    let ctx = TestContext::new();
    let inner = &ctx.context.inner;
    let callbacks = inner.callback_guard();
    let mut state = inner.lock_state(&callbacks);

    let reentered = state.unlocked(|| {
        let _again = inner.lock_state_only();
        in_user_callback()
    });

    assert!(reentered);
    assert!(!in_user_callback());
    assert_eq!(state.channels.len(), 0);
}

#[test]
fn test_state_only_guard_waits_without_running_user_code() {
    let ctx = TestContext::new();
    let inner = &ctx.context.inner;
    let mut state = inner.lock_state_only();

    let woken = state.wait_for(&inner.group_done, Duration::from_millis(10));

    assert!(!woken);
    assert!(!in_user_callback());
    assert_eq!(state.channels.len(), 0);
}

#[test]
#[should_panic(expected = "context state lock is not reentrant")]
fn test_callback_state_guard_is_not_reentrant() {
    let ctx = TestContext::new();
    let inner = &ctx.context.inner;
    let callbacks = inner.callback_guard();

    let _state = inner.lock_state(&callbacks);
    let _again = inner.lock_state_only();
}
