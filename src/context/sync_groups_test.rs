use std::thread;
use std::time::Duration;

use crate::test_utils::doubles;
use crate::test_utils::read_notify_reply;
use crate::test_utils::server_addr;
use crate::test_utils::write_notify_reply;
use crate::test_utils::RecordingChannelNotify;
use crate::test_utils::TestContext;
use crate::ChannelId;
use crate::CircuitId;
use crate::Command;
use crate::DbrType;
use crate::Error;
use crate::GroupId;
use crate::Status;

fn connected(ctx: &TestContext) -> (ChannelId, CircuitId) {
    ctx.connect_channel(
        "motor1:pos",
        RecordingChannelNotify::new(),
        server_addr(1),
        DbrType::DOUBLE,
        2,
    )
}

#[test]
fn test_group_completes_when_every_member_answers() {
    let ctx = TestContext::new();
    let (cid, circuit) = connected(&ctx);
    let group = ctx.context.sync_group_create();
    let read = ctx
        .context
        .sync_group_read(group, cid, DbrType::DOUBLE, 1)
        .unwrap();
    let write = ctx
        .context
        .sync_group_write(group, cid, DbrType::DOUBLE, 1, &doubles(&[9.0]))
        .unwrap();
    assert!(!ctx.context.sync_group_test(group).unwrap());

    ctx.context
        .deliver(circuit, &read_notify_reply(read, Status::Normal, DbrType::DOUBLE, 1, &doubles(&[1.0])));
    assert!(!ctx.context.sync_group_test(group).unwrap());
    ctx.context
        .deliver(circuit, &write_notify_reply(write, Status::Normal, DbrType::DOUBLE, 1));

    assert!(ctx.context.sync_group_test(group).unwrap());
    let results = ctx.context.sync_group_results(group).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].io, read);
    assert_eq!(results[0].data, Some(doubles(&[1.0])));
    assert_eq!(results[1].io, write);
    assert_eq!(results[1].status, Status::Normal);
    assert_eq!(results[1].data, None);
    let info = ctx.context.sync_group_info(group).unwrap();
    assert_eq!(info.outstanding, 0);
    assert_eq!(info.completed, 2);
    assert_eq!(info.completions, 1);
    assert_eq!(ctx.context.outstanding_io(), 0);
}

#[test]
fn test_failed_member_is_recorded_with_its_status() {
    let ctx = TestContext::new();
    let (cid, circuit) = connected(&ctx);
    let group = ctx.context.sync_group_create();
    let read = ctx
        .context
        .sync_group_read(group, cid, DbrType::DOUBLE, 2)
        .unwrap();

    ctx.context
        .deliver(circuit, &read_notify_reply(read, Status::GetFailed, DbrType::DOUBLE, 2, &[]));

    let results = ctx.context.sync_group_results(group).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, Status::GetFailed);
    assert_eq!(results[0].data, None);
    assert!(ctx.context.sync_group_test(group).unwrap());
}

#[test]
fn test_block_flushes_and_times_out() {
    let ctx = TestContext::new();
    let (cid, circuit) = connected(&ctx);
    let group = ctx.context.sync_group_create();
    ctx.context
        .sync_group_read(group, cid, DbrType::DOUBLE, 1)
        .unwrap();

    let done = ctx
        .context
        .sync_group_block(group, Duration::from_millis(20))
        .unwrap();

    assert!(!done);
    assert_eq!(
        ctx.transport.sent_commands(circuit).last(),
        Some(&Command::ReadNotify.code())
    );
    assert_eq!(ctx.context.sync_group_info(group).unwrap().outstanding, 1);
}

#[test]
fn test_block_on_empty_group_returns_at_once() {
    let ctx = TestContext::new();
    let group = ctx.context.sync_group_create();

    assert!(ctx
        .context
        .sync_group_block(group, Duration::from_secs(0))
        .unwrap());
}

#[test]
fn test_block_is_woken_by_delivery_thread() {
    let ctx = TestContext::new();
    let (cid, circuit) = connected(&ctx);
    let group = ctx.context.sync_group_create();
    let read = ctx
        .context
        .sync_group_read(group, cid, DbrType::DOUBLE, 1)
        .unwrap();
    let context = ctx.context.clone();

    let delivery = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        context.deliver(circuit, &read_notify_reply(read, Status::Normal, DbrType::DOUBLE, 1, &doubles(&[3.0])));
    });
    let done = ctx
        .context
        .sync_group_block(group, Duration::from_secs(10))
        .unwrap();
    delivery.join().unwrap();

    assert!(done);
    assert_eq!(ctx.context.sync_group_results(group).unwrap().len(), 1);
}

#[test]
fn test_destroy_is_deferred_until_members_finish() {
    let ctx = TestContext::new();
    let (cid, circuit) = connected(&ctx);
    let group = ctx.context.sync_group_create();
    let read = ctx
        .context
        .sync_group_read(group, cid, DbrType::DOUBLE, 1)
        .unwrap();

    ctx.context.sync_group_destroy(group).unwrap();

    assert!(ctx.context.sync_group_info(group).unwrap().closed);
    assert!(matches!(
        ctx.context.sync_group_read(group, cid, DbrType::DOUBLE, 1),
        Err(Error::BadSyncGroup(_))
    ));
    assert!(matches!(
        ctx.context.sync_group_destroy(group),
        Err(Error::BadSyncGroup(_))
    ));

    ctx.context
        .deliver(circuit, &read_notify_reply(read, Status::Normal, DbrType::DOUBLE, 1, &doubles(&[1.0])));

    assert!(matches!(
        ctx.context.sync_group_info(group),
        Err(Error::BadSyncGroup(_))
    ));
    assert_eq!(ctx.context.outstanding_io(), 0);
}

#[test]
fn test_idle_group_is_released_on_destroy() {
    let ctx = TestContext::new();
    let group = ctx.context.sync_group_create();

    ctx.context.sync_group_destroy(group).unwrap();

    assert!(matches!(
        ctx.context.sync_group_test(group),
        Err(Error::BadSyncGroup(_))
    ));
    assert!(matches!(
        ctx.context.sync_group_destroy(group),
        Err(Error::BadSyncGroup(_))
    ));
}

#[test]
fn test_reset_cancels_members_and_clears_results() {
    let ctx = TestContext::new();
    let (cid, circuit) = connected(&ctx);
    let group = ctx.context.sync_group_create();
    let first = ctx
        .context
        .sync_group_read(group, cid, DbrType::DOUBLE, 1)
        .unwrap();
    let second = ctx
        .context
        .sync_group_read(group, cid, DbrType::DOUBLE, 1)
        .unwrap();
    ctx.context
        .deliver(circuit, &read_notify_reply(first, Status::Normal, DbrType::DOUBLE, 1, &doubles(&[1.0])));

    ctx.context.sync_group_reset(group).unwrap();
    ctx.context
        .deliver(circuit, &read_notify_reply(second, Status::Normal, DbrType::DOUBLE, 1, &doubles(&[2.0])));

    assert!(ctx.context.sync_group_test(group).unwrap());
    assert!(ctx.context.sync_group_results(group).unwrap().is_empty());
    assert_eq!(ctx.context.outstanding_io(), 0);
    assert_eq!(ctx.context.channel_info(cid).unwrap().outstanding_io, 0);

    // still usable after a reset
    ctx.context
        .sync_group_read(group, cid, DbrType::DOUBLE, 1)
        .unwrap();
    assert!(!ctx.context.sync_group_test(group).unwrap());
}

#[test]
fn test_reset_releases_group_closed_with_members_pending() {
    let ctx = TestContext::new();
    let (cid, circuit) = connected(&ctx);
    let group = ctx.context.sync_group_create();
    let read = ctx
        .context
        .sync_group_read(group, cid, DbrType::DOUBLE, 1)
        .unwrap();
    ctx.context.sync_group_destroy(group).unwrap();

    ctx.context.sync_group_reset(group).unwrap();

    assert!(matches!(ctx.context.sync_group_info(group), Err(Error::BadSyncGroup(_))));
    assert!(matches!(ctx.context.sync_group_destroy(group), Err(Error::BadSyncGroup(_))));
    assert_eq!(ctx.context.outstanding_io(), 0);
    // the late reply finds nothing
    ctx.context
        .deliver(circuit, &read_notify_reply(read, Status::Normal, DbrType::DOUBLE, 1, &doubles(&[1.0])));
    assert_eq!(ctx.context.channel_info(cid).unwrap().outstanding_io, 0);
}

#[test]
fn test_block_is_woken_by_reset() {
    let ctx = TestContext::new();
    let (cid, _) = connected(&ctx);
    let group = ctx.context.sync_group_create();
    ctx.context
        .sync_group_read(group, cid, DbrType::DOUBLE, 1)
        .unwrap();
    let context = ctx.context.clone();

    let resetter = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        context.sync_group_reset(group).unwrap();
    });
    let done = ctx
        .context
        .sync_group_block(group, Duration::from_secs(10))
        .unwrap();
    resetter.join().unwrap();

    assert!(done);
    assert!(ctx.context.sync_group_results(group).unwrap().is_empty());
}

#[test]
fn test_disconnect_finishes_members_with_disconnected() {
    let ctx = TestContext::new();
    let (cid, circuit) = connected(&ctx);
    let group = ctx.context.sync_group_create();
    ctx.context
        .sync_group_read(group, cid, DbrType::DOUBLE, 1)
        .unwrap();
    ctx.context
        .sync_group_write(group, cid, DbrType::DOUBLE, 1, &doubles(&[1.0]))
        .unwrap();

    ctx.context.circuit_failed(circuit, "connection reset");

    assert!(ctx.context.sync_group_test(group).unwrap());
    let statuses: Vec<Status> = ctx
        .context
        .sync_group_results(group)
        .unwrap()
        .iter()
        .map(|r| r.status)
        .collect();
    assert_eq!(statuses, vec![Status::Disconnected, Status::Disconnected]);
    assert_eq!(ctx.context.sync_group_info(group).unwrap().completions, 1);
}

#[test]
fn test_destroying_channel_drops_its_members() {
    let ctx = TestContext::new();
    let (cid, _) = connected(&ctx);
    let group = ctx.context.sync_group_create();
    ctx.context
        .sync_group_read(group, cid, DbrType::DOUBLE, 1)
        .unwrap();

    ctx.context.destroy_channel(cid).unwrap();

    assert!(ctx.context.sync_group_test(group).unwrap());
    assert!(ctx.context.sync_group_results(group).unwrap().is_empty());
}

#[test]
fn test_rejected_request_does_not_join_group() {
    let ctx = TestContext::new();
    let (cid, _) = connected(&ctx);
    let group = ctx.context.sync_group_create();

    assert!(ctx
        .context
        .sync_group_read(group, cid, DbrType::DOUBLE, 3)
        .is_err());

    assert!(ctx.context.sync_group_test(group).unwrap());
    assert_eq!(ctx.context.sync_group_info(group).unwrap().completions, 0);
}

#[test]
fn test_unknown_group_is_refused() {
    let ctx = TestContext::new();
    let (cid, _) = connected(&ctx);
    let group = GroupId(77);

    assert!(matches!(ctx.context.sync_group_test(group), Err(Error::BadSyncGroup(77))));
    assert!(matches!(
        ctx.context.sync_group_block(group, Duration::from_millis(1)),
        Err(Error::BadSyncGroup(77))
    ));
    assert!(matches!(ctx.context.sync_group_reset(group), Err(Error::BadSyncGroup(77))));
    assert!(matches!(
        ctx.context.sync_group_read(group, cid, DbrType::DOUBLE, 1),
        Err(Error::BadSyncGroup(77))
    ));
    assert_eq!(ctx.context.outstanding_io(), 0);
}
