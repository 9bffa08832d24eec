//! A context driven by tokio timers instead of the manual test queue.

use std::sync::Arc;
use std::time::Duration;

use ca_client_engine::test_utils::server_addr;
use ca_client_engine::test_utils::version_response;
use ca_client_engine::test_utils::FakeResolver;
use ca_client_engine::test_utils::FakeTransport;
use ca_client_engine::test_utils::RecordingChannelNotify;
use ca_client_engine::test_utils::RecordingContextNotify;
use ca_client_engine::ChannelState;
use ca_client_engine::Command;
use ca_client_engine::Context;
use ca_client_engine::ContextConfig;
use ca_client_engine::Status;
use ca_client_engine::TokioTimerQueue;
use ca_client_engine::CA_MINOR_PROTOCOL_REVISION;
use tokio::time::sleep;
use tokio::time::timeout;

use crate::common::MOTOR;
use crate::common::WAIT_TIMEOUT_IN_MS;

struct Harness {
    context: Context,
    notify: Arc<RecordingContextNotify>,
    transport: Arc<FakeTransport>,
    resolver: Arc<FakeResolver>,
}

fn harness(config: ContextConfig) -> Harness {
    let notify = RecordingContextNotify::new();
    let transport = FakeTransport::new();
    let resolver = FakeResolver::new();
    let timers = Arc::new(TokioTimerQueue::try_current().unwrap());
    let context = Context::new(config, notify.clone(), transport.clone(), resolver.clone(), timers).unwrap();
    Harness {
        context,
        notify,
        transport,
        resolver,
    }
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    let polled = timeout(Duration::from_millis(WAIT_TIMEOUT_IN_MS), async {
        while !done() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "condition not reached in time");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unanswered_connect_times_out() {
    let h = harness(ContextConfig {
        connection_timeout_ms: 30,
        ..ContextConfig::default()
    });
    let cid = h
        .context
        .create_channel(MOTOR, RecordingChannelNotify::new(), 0)
        .unwrap();

    h.context
        .search_response(cid, server_addr(1), CA_MINOR_PROTOCOL_REVISION);
    wait_until(|| h.resolver.searches_for(cid) == 2).await;

    assert_eq!(h.transport.disconnects().len(), 1);
    assert_eq!(h.context.circuit_count(), 0);
    assert_eq!(h.context.channel_info(cid).unwrap().state, ChannelState::Searching);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_silent_server_is_probed_and_reported() {
    let h = harness(ContextConfig {
        echo_period_ms: 20,
        ..ContextConfig::default()
    });
    let cid = h
        .context
        .create_channel(MOTOR, RecordingChannelNotify::new(), 0)
        .unwrap();
    h.context
        .search_response(cid, server_addr(1), CA_MINOR_PROTOCOL_REVISION);
    let circuit = h.transport.circuit_for(server_addr(1)).unwrap();
    h.context.circuit_connected(circuit);
    h.context
        .deliver(circuit, &version_response(CA_MINOR_PROTOCOL_REVISION));

    wait_until(|| h.notify.statuses().contains(&Status::UnresponsiveTimeout)).await;

    assert!(h
        .transport
        .sent_commands(circuit)
        .contains(&Command::Echo.code()));
    assert_eq!(h.context.circuit_count(), 1);
}
