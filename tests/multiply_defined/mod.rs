//! The same channel name answered by two servers.

use ca_client_engine::test_utils::server_addr;
use ca_client_engine::test_utils::TestContext;
use ca_client_engine::Status;
use ca_client_engine::CA_MINOR_PROTOCOL_REVISION;

use crate::common::motor;
use crate::common::MOTOR;

#[test]
fn test_second_answer_names_both_servers() {
    let ctx = TestContext::new();
    let (cid, _, channel) = motor(&ctx);

    ctx.context
        .search_response(cid, server_addr(2), CA_MINOR_PROTOCOL_REVISION);

    let exceptions = ctx.notify.exceptions();
    assert_eq!(exceptions.len(), 1);
    let (status, report) = &exceptions[0];
    assert_eq!(*status, Status::DoubleChannel);
    assert!(report.contains(MOTOR));
    assert!(report.contains(&server_addr(1).to_string()));
    assert!(report.contains(&server_addr(2).to_string()));

    // the first server keeps the channel
    let info = ctx.context.channel_info(cid).unwrap();
    assert_eq!(info.server, Some(server_addr(1)));
    assert_eq!(channel.disconnects(), 0);
    assert_eq!(ctx.transport.connects().len(), 1);
}
