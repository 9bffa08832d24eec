//! A sync group reports completion exactly when its last member finishes.

use ca_client_engine::test_utils::doubles;
use ca_client_engine::test_utils::read_notify_reply;
use ca_client_engine::test_utils::server_addr;
use ca_client_engine::test_utils::RecordingChannelNotify;
use ca_client_engine::test_utils::TestContext;
use ca_client_engine::DbrType;
use ca_client_engine::Status;

#[test]
fn test_group_completes_exactly_at_zero() {
    let ctx = TestContext::new();
    let (cid, circuit) = ctx.connect_channel(
        "magnet:current",
        RecordingChannelNotify::new(),
        server_addr(1),
        DbrType::DOUBLE,
        1,
    );
    let group = ctx.context.sync_group_create();
    let members: Vec<_> = (0..5)
        .map(|_| {
            ctx.context
                .sync_group_read(group, cid, DbrType::DOUBLE, 1)
                .unwrap()
        })
        .collect();

    for (answered, io) in members.iter().enumerate() {
        assert!(!ctx.context.sync_group_test(group).unwrap());
        assert_eq!(ctx.context.sync_group_info(group).unwrap().outstanding, members.len() - answered);
        ctx.context.deliver(
            circuit,
            &read_notify_reply(*io, Status::Normal, DbrType::DOUBLE, 1, &doubles(&[answered as f64])),
        );
    }

    assert!(ctx.context.sync_group_test(group).unwrap());
    let info = ctx.context.sync_group_info(group).unwrap();
    assert_eq!(info.completions, 1);
    assert_eq!(info.completed, 5);
}
