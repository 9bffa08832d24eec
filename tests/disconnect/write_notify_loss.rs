//! Losing the transport under an outstanding write: the write fails exactly
//! once, the channel hears one disconnect, and it comes back on a new
//! circuit once the server is found again.

use ca_client_engine::test_utils::access_rights_response;
use ca_client_engine::test_utils::create_channel_reply;
use ca_client_engine::test_utils::doubles;
use ca_client_engine::test_utils::server_addr;
use ca_client_engine::test_utils::sid_of;
use ca_client_engine::test_utils::write_notify_reply;
use ca_client_engine::test_utils::IoEvent;
use ca_client_engine::test_utils::RecordingIoNotify;
use ca_client_engine::test_utils::TestContext;
use ca_client_engine::AccessRights;
use ca_client_engine::ChannelState;
use ca_client_engine::DbrType;
use ca_client_engine::Status;

use crate::common::motor;

#[test]
fn test_transport_loss_fails_write_once() {
    let ctx = TestContext::new();
    let (cid, circuit, channel) = motor(&ctx);
    let write = RecordingIoNotify::new();
    let io = ctx
        .context
        .write_notify_request(cid, DbrType::DOUBLE, 1, &doubles(&[42.0]), write.clone())
        .unwrap();
    ctx.context.flush();

    ctx.context.circuit_failed(circuit, "connection reset by peer");
    ctx.context.circuit_failed(circuit, "connection reset by peer");
    ctx.context
        .deliver(circuit, &write_notify_reply(io, Status::Normal, DbrType::DOUBLE, 1));

    assert_eq!(
        write.events(),
        vec![IoEvent::Exception {
            status: Status::Disconnected,
            context: "virtual circuit disconnect".to_string(),
            data_type: DbrType::DOUBLE,
            count: 1,
        }]
    );
    assert_eq!(channel.disconnects(), 1);
    assert_eq!(ctx.context.outstanding_io(), 0);
    assert_eq!(ctx.context.channel_info(cid).unwrap().state, ChannelState::Searching);
}

#[test]
fn test_channel_reconnects_after_loss() {
    let ctx = TestContext::new();
    let (cid, circuit, channel) = motor(&ctx);
    ctx.context.circuit_failed(circuit, "connection reset by peer");

    let again = ctx.bind(cid, server_addr(1));
    ctx.context
        .deliver(again, &access_rights_response(cid, AccessRights::READ_WRITE));
    ctx.context
        .deliver(again, &create_channel_reply(cid, sid_of(cid), DbrType::DOUBLE, 1));

    assert_ne!(circuit, again);
    assert_eq!(channel.connects(), 2);
    let write = RecordingIoNotify::new();
    let io = ctx
        .context
        .write_notify_request(cid, DbrType::DOUBLE, 1, &doubles(&[1.0]), write.clone())
        .unwrap();
    ctx.context
        .deliver(again, &write_notify_reply(io, Status::Normal, DbrType::DOUBLE, 1));
    assert_eq!(write.events(), vec![IoEvent::Written]);
}
