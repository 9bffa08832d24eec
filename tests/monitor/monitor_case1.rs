//! A motor position subscription sees every posted event until it or its
//! channel is destroyed, and nothing afterwards.

use ca_client_engine::test_utils::doubles;
use ca_client_engine::test_utils::event_response;
use ca_client_engine::test_utils::IoEvent;
use ca_client_engine::test_utils::RecordingIoNotify;
use ca_client_engine::test_utils::TestContext;
use ca_client_engine::Command;
use ca_client_engine::DbrType;
use ca_client_engine::Error;
use ca_client_engine::EventMask;
use ca_client_engine::Status;

use crate::common::motor;

#[test]
fn test_subscription_sees_events_until_cancelled() {
    let ctx = TestContext::new();
    let (cid, circuit, _) = motor(&ctx);
    let updates = RecordingIoNotify::new();

    let sub = ctx
        .context
        .subscription_request(
            cid,
            DbrType::DOUBLE,
            1,
            EventMask::VALUE | EventMask::ALARM,
            updates.clone(),
        )
        .unwrap();
    ctx.context.flush();
    let add = ctx.transport.sent_messages(circuit).pop().unwrap();
    assert_eq!(add.header.command, Command::EventAdd.code());
    assert_eq!(add.header.param2, sub.0);

    for position in [10.0, 10.5, 11.0] {
        ctx.context.deliver(
            circuit,
            &event_response(sub, Status::Normal, DbrType::DOUBLE, 1, &doubles(&[position])),
        );
    }
    assert!(ctx.context.destroy_io(sub, cid).unwrap());
    ctx.context.deliver(
        circuit,
        &event_response(sub, Status::Normal, DbrType::DOUBLE, 1, &doubles(&[11.5])),
    );

    let positions: Vec<_> = updates
        .events()
        .into_iter()
        .map(|e| match e {
            IoEvent::Data { data, .. } => data,
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    assert_eq!(
        positions,
        vec![doubles(&[10.0]), doubles(&[10.5]), doubles(&[11.0])]
    );
    assert_eq!(ctx.context.outstanding_io(), 0);

    ctx.context.flush();
    let cancel = ctx.transport.sent_messages(circuit).pop().unwrap();
    assert_eq!(cancel.header.command, Command::EventCancel.code());
    assert_eq!(cancel.header.param2, sub.0);
}

#[test]
fn test_subscription_sees_events_until_channel_destroyed() {
    let ctx = TestContext::new();
    let (cid, circuit, channel) = motor(&ctx);
    let updates = RecordingIoNotify::new();
    let sub = ctx
        .context
        .subscription_request(
            cid,
            DbrType::DOUBLE,
            1,
            EventMask::VALUE | EventMask::ALARM,
            updates.clone(),
        )
        .unwrap();

    for position in [20.0, 20.5, 21.0] {
        ctx.context.deliver(
            circuit,
            &event_response(sub, Status::Normal, DbrType::DOUBLE, 1, &doubles(&[position])),
        );
    }
    let channel_events = channel.events().len();
    ctx.context.destroy_channel(cid).unwrap();
    ctx.context.deliver(
        circuit,
        &event_response(sub, Status::Normal, DbrType::DOUBLE, 1, &doubles(&[21.5])),
    );
    ctx.context.circuit_failed(circuit, "connection reset");

    assert_eq!(updates.len(), 3);
    assert_eq!(channel.events().len(), channel_events);
    assert_eq!(ctx.context.outstanding_io(), 0);
    assert_eq!(ctx.context.channel_count(), 0);
    assert!(matches!(
        ctx.context.destroy_io(sub, cid),
        Err(Error::BadChannel(_))
    ));
}
