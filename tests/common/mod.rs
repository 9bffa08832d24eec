use std::sync::Arc;

use ca_client_engine::test_utils::server_addr;
use ca_client_engine::test_utils::RecordingChannelNotify;
use ca_client_engine::test_utils::TestContext;
use ca_client_engine::ChannelId;
use ca_client_engine::CircuitId;
use ca_client_engine::DbrType;

pub const MOTOR: &str = "motor1:pos";

/// Generous bound for waits on real timers
pub const WAIT_TIMEOUT_IN_MS: u64 = 5000;

/// Motor position channel connected to the first test server as one double.
pub fn motor(ctx: &TestContext) -> (ChannelId, CircuitId, Arc<RecordingChannelNotify>) {
    let notify = RecordingChannelNotify::new();
    let (cid, circuit) = ctx.connect_channel(MOTOR, notify.clone(), server_addr(1), DbrType::DOUBLE, 1);
    (cid, circuit, notify)
}
