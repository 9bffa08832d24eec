//! One persistent connection to one server.
//!
//! A circuit is driven through `Connecting -> ReceivingVersion -> Connected`
//! and ends in `Disconnected`. It owns the bytes in both directions: an
//! outbound queue the context flushes to the transport, and a reassembly
//! buffer borrowed from the [`BufferPool`] that is swapped for a large one
//! only while an oversized message is in flight.

use std::collections::BTreeSet;
use std::fmt;

use bytes::Bytes;
use bytes::BytesMut;
use tracing::debug;
use tracing::trace;

use crate::proto::encode_client_name;
use crate::proto::encode_echo;
use crate::proto::encode_host_name;
use crate::proto::encode_version;
use crate::take_message;
use crate::BufferPool;
use crate::ChannelId;
use crate::CircuitId;
use crate::Command;
use crate::Message;
use crate::MessageHeader;
use crate::ProtocolError;
use crate::ServerId;
use crate::TimerHandle;
use crate::CA_MINOR_PROTOCOL_REVISION;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Transport asked to connect, nothing may be sent yet
    Connecting,
    /// Byte stream is up, waiting for the server's version message
    ReceivingVersion,
    Connected,
    Disconnected,
}

impl CircuitState {
    fn describe(self) -> &'static str {
        match self {
            CircuitState::Connecting => "connecting",
            CircuitState::ReceivingVersion => "receiving version",
            CircuitState::Connected => "connected",
            CircuitState::Disconnected => "disconnected",
        }
    }
}

/// Outcome of one receive watchdog expiry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogAction {
    /// Traffic arrived since the previous expiry
    Idle,
    /// Silence: probe the server with an echo request
    SendEcho,
    /// The probe went unanswered; the circuit just became unresponsive
    Unresponsive,
    /// Still unresponsive, already reported
    StillUnresponsive,
}

pub struct VirtualCircuit {
    id: CircuitId,
    server: ServerId,
    state: CircuitState,
    minor_version: u16,
    channels: BTreeSet<ChannelId>,
    recv: BytesMut,
    recv_is_large: bool,
    outbound: BytesMut,
    activity: bool,
    echo_pending: bool,
    unresponsive: bool,
    connect_timer: Option<TimerHandle>,
    watchdog: Option<TimerHandle>,
}

impl VirtualCircuit {
    /// New circuit with its greeting (version, client name, host name)
    /// already queued. `minor_version` is the revision announced in the
    /// search reply, replaced by the server's version message later.
    pub fn new(
        id: CircuitId,
        server: ServerId,
        minor_version: u16,
        recv: BytesMut,
        user_name: &str,
        host_name: &str,
    ) -> Self {
        let mut outbound = BytesMut::new();
        encode_version(&mut outbound, server.priority, CA_MINOR_PROTOCOL_REVISION);
        encode_client_name(&mut outbound, user_name);
        encode_host_name(&mut outbound, host_name);

        Self {
            id,
            server,
            state: CircuitState::Connecting,
            minor_version,
            channels: BTreeSet::new(),
            recv,
            recv_is_large: false,
            outbound,
            activity: false,
            echo_pending: false,
            unresponsive: false,
            connect_timer: None,
            watchdog: None,
        }
    }

    pub fn id(&self) -> CircuitId {
        self.id
    }

    pub fn server(&self) -> ServerId {
        self.server
    }

    pub fn priority(&self) -> u8 {
        self.server.priority
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// Minor protocol revision announced by the server
    pub fn minor_version(&self) -> u16 {
        self.minor_version
    }

    /// Queued bytes may be handed to the transport
    pub fn can_send(&self) -> bool {
        matches!(self.state, CircuitState::ReceivingVersion | CircuitState::Connected)
    }

    pub fn is_unresponsive(&self) -> bool {
        self.unresponsive
    }

    pub fn echo_pending(&self) -> bool {
        self.echo_pending
    }

    pub fn bind_channel(
        &mut self,
        channel: ChannelId,
    ) {
        self.channels.insert(channel);
    }

    pub fn unbind_channel(
        &mut self,
        channel: ChannelId,
    ) -> bool {
        self.channels.remove(&channel)
    }

    pub fn channels(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.channels.iter().copied()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Outbound queue for request encoders
    pub fn outbound(&mut self) -> &mut BytesMut {
        &mut self.outbound
    }

    pub fn queued_len(&self) -> usize {
        self.outbound.len()
    }

    /// Everything queued so far, if sending is allowed and anything is queued.
    pub fn take_outbound(&mut self) -> Option<Bytes> {
        if !self.can_send() || self.outbound.is_empty() {
            return None;
        }
        Some(self.outbound.split().freeze())
    }

    /// The transport finished opening the byte stream.
    pub fn transport_connected(&mut self) -> Result<(), ProtocolError> {
        if self.state != CircuitState::Connecting {
            return Err(ProtocolError::UnexpectedMessage {
                command: Command::Version.code(),
                state: self.state.describe(),
            });
        }
        self.state = CircuitState::ReceivingVersion;
        debug!(circuit_id = %self.id, server = %self.server, "circuit awaiting version");
        Ok(())
    }

    /// Append inbound bytes to the reassembly buffer.
    ///
    /// When the bytes do not fit the small buffer it is exchanged for a large
    /// one from `pool`, keeping whatever partial message it held.
    pub fn receive(
        &mut self,
        bytes: &[u8],
        pool: &BufferPool,
    ) {
        self.activity = true;
        let needed = self.recv.len() + bytes.len();
        if !self.recv_is_large && needed > pool.small_size() {
            let mut large = pool.allocate_large();
            large.extend_from_slice(&self.recv);
            let small = std::mem::replace(&mut self.recv, large);
            pool.release_small(small);
            self.recv_is_large = true;
            trace!(circuit_id = %self.id, needed, "swapped to large receive buffer");
        }
        self.recv.extend_from_slice(bytes);
    }

    /// Split off the next complete message and check it against the state
    /// machine. A version message is consumed here and moves the circuit to
    /// `Connected`.
    pub fn next_message(
        &mut self,
        limit: usize,
        pool: &BufferPool,
    ) -> Result<Option<Message>, ProtocolError> {
        let Some(msg) = take_message(&mut self.recv, limit)? else {
            self.shrink_buffer(pool);
            return Ok(None);
        };
        self.accept(&msg.header)?;
        Ok(Some(msg))
    }

    fn accept(
        &mut self,
        header: &MessageHeader,
    ) -> Result<(), ProtocolError> {
        let is_version = header.command == Command::Version.code();
        match self.state {
            CircuitState::ReceivingVersion if is_version => {
                self.state = CircuitState::Connected;
                self.minor_version = header.count as u16;
                debug!(circuit_id = %self.id, minor = self.minor_version, "circuit connected");
                if let Some(timer) = self.connect_timer.take() {
                    timer.cancel();
                }
                Ok(())
            }
            CircuitState::Connected => {
                if is_version {
                    self.minor_version = header.count as u16;
                }
                Ok(())
            }
            state => Err(ProtocolError::UnexpectedMessage {
                command: header.command,
                state: state.describe(),
            }),
        }
    }

    /// Go back to a small buffer once nothing is pending in the large one.
    fn shrink_buffer(
        &mut self,
        pool: &BufferPool,
    ) {
        if self.recv_is_large && self.recv.is_empty() {
            let small = pool.allocate_small();
            let large = std::mem::replace(&mut self.recv, small);
            pool.release_large(large);
            self.recv_is_large = false;
        }
    }

    pub fn uses_large_buffer(&self) -> bool {
        self.recv_is_large
    }

    pub fn set_connect_timer(
        &mut self,
        timer: TimerHandle,
    ) {
        if let Some(old) = self.connect_timer.replace(timer) {
            old.cancel();
        }
    }

    pub fn set_watchdog(
        &mut self,
        timer: TimerHandle,
    ) {
        if let Some(old) = self.watchdog.replace(timer) {
            old.cancel();
        }
    }

    /// Queue an echo request unless one is already outstanding on a circuit
    /// not yet declared unresponsive.
    pub fn probe(&mut self) -> bool {
        if self.echo_pending && !self.unresponsive {
            return false;
        }
        encode_echo(&mut self.outbound);
        self.echo_pending = true;
        true
    }

    pub fn echo_received(&mut self) {
        self.echo_pending = false;
    }

    /// Inbound traffic since the last check proves the server alive.
    /// Returns true when this ends an unresponsive period.
    pub fn clear_watchdog(&mut self) -> bool {
        self.echo_pending = false;
        std::mem::replace(&mut self.unresponsive, false)
    }

    pub fn watchdog_expired(&mut self) -> WatchdogAction {
        if std::mem::replace(&mut self.activity, false) {
            return WatchdogAction::Idle;
        }
        if self.unresponsive {
            return WatchdogAction::StillUnresponsive;
        }
        if self.echo_pending {
            self.unresponsive = true;
            return WatchdogAction::Unresponsive;
        }
        WatchdogAction::SendEcho
    }

    /// Enter `Disconnected`: stop timers, drop unsent bytes, return the
    /// receive buffer to `pool` and hand back the channels that were bound.
    pub fn shutdown(
        &mut self,
        pool: &BufferPool,
    ) -> Vec<ChannelId> {
        self.state = CircuitState::Disconnected;
        for timer in [self.connect_timer.take(), self.watchdog.take()].into_iter().flatten() {
            timer.cancel();
        }
        self.outbound.clear();
        let recv = std::mem::take(&mut self.recv);
        if std::mem::replace(&mut self.recv_is_large, false) {
            pool.release_large(recv);
        } else {
            pool.release_small(recv);
        }
        std::mem::take(&mut self.channels).into_iter().collect()
    }
}

impl fmt::Debug for VirtualCircuit {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("VirtualCircuit")
            .field("id", &self.id)
            .field("server", &self.server)
            .field("state", &self.state)
            .field("minor_version", &self.minor_version)
            .field("channels", &self.channels.len())
            .field("queued", &self.outbound.len())
            .field("unresponsive", &self.unresponsive)
            .finish()
    }
}
