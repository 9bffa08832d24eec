use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;

use super::access_rights_response;
use super::create_channel_reply;
use super::version_response;
use super::FakeResolver;
use super::FakeTransport;
use super::ManualTimerQueue;
use super::RecordingContextNotify;
use crate::AccessRights;
use crate::ChannelId;
use crate::ChannelNotify;
use crate::CircuitId;
use crate::Context;
use crate::ContextConfig;
use crate::DbrType;
use crate::CA_MINOR_PROTOCOL_REVISION;
use crate::PRIORITY_DEFAULT;

/// Server-assigned id the harness hands out for a channel
pub fn sid_of(cid: ChannelId) -> u32 {
    cid.0 + 1000
}

/// `10.0.0.<n>:5064`
pub fn server_addr(n: u8) -> SocketAddr {
    SocketAddr::from(([10, 0, 0, n], 5064))
}

/// A context wired to recording fakes, plus helpers that play the server
/// side of the handshake.
pub struct TestContext {
    pub context: Context,
    pub notify: Arc<RecordingContextNotify>,
    pub transport: Arc<FakeTransport>,
    pub resolver: Arc<FakeResolver>,
    pub timers: Arc<ManualTimerQueue>,
    greeted: Mutex<HashSet<CircuitId>>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(ContextConfig {
            user_name: "operator".into(),
            host_name: "console".into(),
            ..ContextConfig::default()
        })
    }

    pub fn with_config(config: ContextConfig) -> Self {
        let notify = RecordingContextNotify::new();
        let transport = FakeTransport::new();
        let resolver = FakeResolver::new();
        let timers = ManualTimerQueue::new();
        let context = match Context::new(config, notify.clone(), transport.clone(), resolver.clone(), timers.clone())
        {
            Ok(context) => context,
            Err(e) => panic!("test context config rejected: {e}"),
        };
        Self {
            context,
            notify,
            transport,
            resolver,
            timers,
            greeted: Mutex::new(HashSet::new()),
        }
    }

    /// Answer the search for `cid` from `address` and complete the circuit
    /// handshake if this is a new circuit. The channel is left pending.
    pub fn bind(
        &self,
        cid: ChannelId,
        address: SocketAddr,
    ) -> CircuitId {
        self.context.search_response(cid, address, CA_MINOR_PROTOCOL_REVISION);
        let circuit = match self.transport.circuit_for(address) {
            Some(circuit) => circuit,
            None => panic!("no circuit opened to {address}"),
        };
        if self.greeted.lock().insert(circuit) {
            self.context.circuit_connected(circuit);
            self.context
                .deliver(circuit, &version_response(CA_MINOR_PROTOCOL_REVISION));
        }
        circuit
    }

    /// Create `name` and drive it to connected on `address`.
    pub fn connect_channel(
        &self,
        name: &str,
        notify: Arc<dyn ChannelNotify>,
        address: SocketAddr,
        native_type: DbrType,
        native_count: u32,
    ) -> (ChannelId, CircuitId) {
        self.connect_channel_at(name, notify, address, PRIORITY_DEFAULT, native_type, native_count)
    }

    pub fn connect_channel_at(
        &self,
        name: &str,
        notify: Arc<dyn ChannelNotify>,
        address: SocketAddr,
        priority: u8,
        native_type: DbrType,
        native_count: u32,
    ) -> (ChannelId, CircuitId) {
        let cid = match self.context.create_channel(name, notify, priority) {
            Ok(cid) => cid,
            Err(e) => panic!("create_channel({name}) failed: {e}"),
        };
        let circuit = self.bind(cid, address);
        self.context
            .deliver(circuit, &access_rights_response(cid, AccessRights::READ_WRITE));
        self.context
            .deliver(circuit, &create_channel_reply(cid, sid_of(cid), native_type, native_count));
        (cid, circuit)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
