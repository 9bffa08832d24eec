//! Every gap in a server's beacon sequence is counted once, however the
//! beacons arrive.

use std::time::Duration;
use std::time::Instant;

use ca_client_engine::test_utils::server_addr;
use ca_client_engine::test_utils::TestContext;

#[test]
fn test_each_gap_counted_once() {
    let ctx = TestContext::new();
    let start = Instant::now();
    let at = |secs: u64| start + Duration::from_secs(secs);

    // two servers, interleaved, with relayed repeats
    let plan: &[(u8, u64, u32)] = &[
        (1, 0, 100),
        (2, 0, 5000),
        (1, 15, 101),
        (1, 15, 101),
        (2, 15, 5001),
        (1, 30, 105),
        (2, 30, 5001),
        (1, 45, 106),
        (2, 45, 0),
        (2, 60, 1),
    ];
    for (server, secs, number) in plan {
        ctx.context.beacon_notify(server_addr(*server), at(*secs), *number, 13);
    }

    // 101 -> 105 on the first server, 5001 -> 0 (restart) on the second
    assert_eq!(ctx.context.beacon_anomalies_since_program_start(), 2);
    assert_eq!(ctx.resolver.anomalies(), vec![server_addr(1), server_addr(2)]);
}
