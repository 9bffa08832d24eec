//! Nothing reaches a callback once its object has been destroyed, and
//! destroying a channel leaves no IO behind.

use ca_client_engine::test_utils::doubles;
use ca_client_engine::test_utils::event_response;
use ca_client_engine::test_utils::read_notify_reply;
use ca_client_engine::test_utils::server_addr;
use ca_client_engine::test_utils::write_notify_reply;
use ca_client_engine::test_utils::RecordingChannelNotify;
use ca_client_engine::test_utils::RecordingIoNotify;
use ca_client_engine::test_utils::TestContext;
use ca_client_engine::DbrType;
use ca_client_engine::EventMask;
use ca_client_engine::Status;

#[test]
fn test_no_delivery_after_channel_destroy() {
    let ctx = TestContext::new();
    let channel = RecordingChannelNotify::new();
    let (cid, circuit) = ctx.connect_channel("tank:level", channel.clone(), server_addr(1), DbrType::DOUBLE, 1);
    let io = RecordingIoNotify::new();
    let read = ctx
        .context
        .read_notify_request(cid, DbrType::DOUBLE, 1, io.clone())
        .unwrap();
    let write = ctx
        .context
        .write_notify_request(cid, DbrType::DOUBLE, 1, &doubles(&[0.5]), io.clone())
        .unwrap();
    let sub = ctx
        .context
        .subscription_request(cid, DbrType::DOUBLE, 1, EventMask::VALUE, io.clone())
        .unwrap();
    let before = channel.events().len();

    ctx.context.destroy_channel(cid).unwrap();
    ctx.context
        .deliver(circuit, &read_notify_reply(read, Status::Normal, DbrType::DOUBLE, 1, &doubles(&[1.0])));
    ctx.context
        .deliver(circuit, &write_notify_reply(write, Status::Normal, DbrType::DOUBLE, 1));
    ctx.context
        .deliver(circuit, &event_response(sub, Status::Normal, DbrType::DOUBLE, 1, &doubles(&[1.0])));
    ctx.context.circuit_failed(circuit, "connection reset");

    assert!(io.is_empty());
    assert_eq!(channel.events().len(), before);
    assert_eq!(ctx.context.outstanding_io(), 0);
    assert_eq!(ctx.context.channel_count(), 0);
}

#[test]
fn test_many_channels_destroyed_leave_no_io() {
    let ctx = TestContext::new();
    let io = RecordingIoNotify::new();
    let mut channels = Vec::new();
    for n in 0..20u8 {
        let (cid, _) = ctx.connect_channel(
            &format!("pump{n}:speed"),
            RecordingChannelNotify::new(),
            server_addr(1 + n % 3),
            DbrType::DOUBLE,
            1,
        );
        ctx.context
            .read_notify_request(cid, DbrType::DOUBLE, 1, io.clone())
            .unwrap();
        ctx.context
            .subscription_request(cid, DbrType::DOUBLE, 1, EventMask::VALUE, io.clone())
            .unwrap();
        channels.push(cid);
    }
    assert_eq!(ctx.context.outstanding_io(), 40);

    for cid in channels {
        ctx.context.destroy_channel(cid).unwrap();
    }

    assert_eq!(ctx.context.outstanding_io(), 0);
    assert_eq!(ctx.context.channel_count(), 0);
    assert!(io.is_empty());
}
