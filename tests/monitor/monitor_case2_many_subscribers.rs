//! Several subscriptions on one channel are routed independently.

use ca_client_engine::test_utils::doubles;
use ca_client_engine::test_utils::event_response;
use ca_client_engine::test_utils::RecordingIoNotify;
use ca_client_engine::test_utils::TestContext;
use ca_client_engine::DbrType;
use ca_client_engine::EventMask;
use ca_client_engine::Status;

use crate::common::motor;

#[test]
fn test_each_subscription_receives_only_its_events() {
    let ctx = TestContext::new();
    let (cid, circuit, _) = motor(&ctx);
    let value = RecordingIoNotify::new();
    let alarm = RecordingIoNotify::new();
    let value_sub = ctx
        .context
        .subscription_request(cid, DbrType::DOUBLE, 1, EventMask::VALUE, value.clone())
        .unwrap();
    let alarm_sub = ctx
        .context
        .subscription_request(cid, DbrType::DOUBLE, 1, EventMask::ALARM, alarm.clone())
        .unwrap();

    ctx.context.deliver(
        circuit,
        &event_response(value_sub, Status::Normal, DbrType::DOUBLE, 1, &doubles(&[1.0])),
    );
    ctx.context.deliver(
        circuit,
        &event_response(value_sub, Status::Normal, DbrType::DOUBLE, 1, &doubles(&[2.0])),
    );
    ctx.context.deliver(
        circuit,
        &event_response(alarm_sub, Status::Normal, DbrType::DOUBLE, 1, &doubles(&[2.0])),
    );
    ctx.context.destroy_io(value_sub, cid).unwrap();
    ctx.context.deliver(
        circuit,
        &event_response(alarm_sub, Status::Normal, DbrType::DOUBLE, 1, &doubles(&[3.0])),
    );

    assert_eq!(value.len(), 2);
    assert_eq!(alarm.len(), 2);
    assert_eq!(ctx.context.outstanding_io(), 1);
}
