//! Circuit lifecycle: opening on demand from search replies, flushing,
//! feeding inbound bytes, timers, and tearing down.

use std::net::SocketAddr;

use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::multiply_defined::double_channel_report;
use super::run_callbacks;
use super::Callback;
use super::Context;
use super::ContextInner;
use super::ContextState;
use super::StateGuard;
use crate::proto::encode_create_channel;
use crate::ChannelId;
use crate::CircuitId;
use crate::CircuitState;
use crate::ProtocolError;
use crate::ServerId;
use crate::Status;
use crate::VirtualCircuit;
use crate::WatchdogAction;
use crate::CA_MINOR_PROTOCOL_REVISION;

impl Context {
    /// Name resolution found `cid` at `server`. Binds the channel to the
    /// circuit for that server, creating the circuit on first use, and
    /// queues the create request.
    ///
    /// A reply for a channel already bound elsewhere is reported as a
    /// `DoubleChannel` exception and otherwise ignored.
    pub fn search_response(
        &self,
        cid: ChannelId,
        server: SocketAddr,
        minor_version: u16,
    ) {
        let callbacks = self.inner.callback_guard();
        let mut state = self.inner.lock_state(&callbacks);
        self.inner.search_response(&mut state, cid, server, minor_version);
    }

    /// The transport finished opening the stream for `circuit`.
    pub fn circuit_connected(
        &self,
        circuit: CircuitId,
    ) {
        let callbacks = self.inner.callback_guard();
        let mut state = self.inner.lock_state(&callbacks);
        self.inner.circuit_connected(&mut state, circuit);
    }

    /// Bytes received on `circuit`, in stream order. Runs every callback the
    /// completed messages trigger before returning.
    pub fn deliver(
        &self,
        circuit: CircuitId,
        bytes: &[u8],
    ) {
        let callbacks = self.inner.callback_guard();
        let mut state = self.inner.lock_state(&callbacks);
        self.inner.deliver(&mut state, circuit, bytes);
    }

    /// The transport lost `circuit`.
    pub fn circuit_failed(
        &self,
        circuit: CircuitId,
        reason: &str,
    ) {
        let callbacks = self.inner.callback_guard();
        let mut state = self.inner.lock_state(&callbacks);
        self.inner.disconnect_circuit(&mut state, circuit, reason);
    }

    /// Hand every queued request to the transport, higher priority circuits
    /// first.
    pub fn flush(&self) {
        let callbacks = self.inner.callback_guard();
        let mut state = self.inner.lock_state(&callbacks);
        self.inner.flush_all(&mut state);
    }
}

impl ContextInner {
    fn search_response(
        &self,
        state: &mut StateGuard<'_>,
        cid: ChannelId,
        address: SocketAddr,
        minor_version: u16,
    ) {
        let Some(channel) = state.channels.get_mut(cid.0) else {
            trace!(%cid, %address, "search reply for unknown channel");
            return;
        };

        if let Some(bound) = channel.server() {
            if bound != address && channel.record_rejected(address) {
                let report = double_channel_report(channel.name(), bound, channel.rejected_servers());
                warn!(%cid, %bound, %address, "channel name answered by more than one server");
                self.raise(state, Status::DoubleChannel, &report, file!(), line!());
            }
            return;
        }

        let server = ServerId {
            address,
            priority: channel.priority(),
        };
        self.resolver.cancel(cid);
        let Some(circuit_id) = self.open_circuit(state, server, minor_version) else {
            if let Some(channel) = state.channels.get(cid.0) {
                self.resolver.search(cid, channel.name());
            }
            return;
        };

        let st = &mut **state;
        let (Some(channel), Some(circuit)) = (st.channels.get_mut(cid.0), st.circuits.get_mut(circuit_id.0)) else {
            return;
        };
        channel.bind(circuit_id, address);
        circuit.bind_channel(cid);
        encode_create_channel(circuit.outbound(), cid.0, CA_MINOR_PROTOCOL_REVISION, channel.name());
        debug!(%cid, circuit_id = %circuit_id, %address, "channel bound to circuit");

        self.flush_circuit(state, circuit_id);
    }

    /// Circuit for `server`, reusing a live one. `None` when the transport
    /// refused to connect.
    fn open_circuit(
        &self,
        state: &mut StateGuard<'_>,
        server: ServerId,
        minor_version: u16,
    ) -> Option<CircuitId> {
        if let Some(id) = state.servers.get(&server).copied() {
            if state.circuits.get(id.0).is_some_and(|c| c.state() != CircuitState::Disconnected) {
                return Some(id);
            }
            state.servers.remove(&server);
        }

        let recv = self.buffers.allocate_small();
        let (user, host) = (&self.config.user_name, &self.config.host_name);
        let id = CircuitId(
            state
                .circuits
                .insert_with(|id| VirtualCircuit::new(CircuitId(id), server, minor_version, recv, user, host)),
        );

        if let Err(e) = self.transport.connect(id, server) {
            warn!(circuit_id = %id, %server, error = %e, "circuit connect failed");
            if let Some(mut circuit) = state.circuits.remove(id.0) {
                circuit.shutdown(&self.buffers);
            }
            return None;
        }

        state.servers.insert(server, id);
        let timer = self.schedule(self.config.connection_timeout(), move |inner| inner.connection_timeout(id));
        if let Some(circuit) = state.circuits.get_mut(id.0) {
            circuit.set_connect_timer(timer);
        }
        info!(circuit_id = %id, %server, "circuit opening");
        Some(id)
    }

    fn circuit_connected(
        &self,
        state: &mut StateGuard<'_>,
        id: CircuitId,
    ) {
        let Some(circuit) = state.circuits.get_mut(id.0) else {
            debug!(circuit_id = %id, "connect reported for unknown circuit");
            return;
        };
        if let Err(e) = circuit.transport_connected() {
            self.protocol_violation(state, id, e);
            return;
        }
        let watchdog = self.schedule(self.config.echo_period(), move |inner| inner.watchdog_expired(id));
        circuit.set_watchdog(watchdog);

        self.flush_circuit(state, id);
    }

    fn deliver(
        &self,
        state: &mut StateGuard<'_>,
        id: CircuitId,
        bytes: &[u8],
    ) {
        let Some(circuit) = state.circuits.get_mut(id.0) else {
            trace!(circuit_id = %id, len = bytes.len(), "bytes for unknown circuit dropped");
            return;
        };
        circuit.receive(bytes, &self.buffers);
        if circuit.clear_watchdog() {
            info!(circuit_id = %id, "circuit responsive again");
        }

        let limit = self.payload_limit();
        loop {
            // dispatch may have dropped the circuit
            let Some(circuit) = state.circuits.get_mut(id.0) else {
                return;
            };
            match circuit.next_message(limit, &self.buffers) {
                Ok(Some(msg)) => self.dispatch(state, id, msg),
                Ok(None) => return,
                Err(e) => {
                    self.protocol_violation(state, id, e);
                    return;
                }
            }
        }
    }

    /// Drop the circuit and report the violation.
    pub(super) fn protocol_violation(
        &self,
        state: &mut StateGuard<'_>,
        id: CircuitId,
        err: ProtocolError,
    ) {
        error!(circuit_id = %id, error = %err, "protocol violation");
        self.disconnect_circuit(state, id, "protocol violation");
        let context = format!("circuit {id}: {err}");
        self.raise(state, Status::Internal, &context, file!(), line!());
    }

    pub(super) fn flush_circuit(
        &self,
        state: &mut StateGuard<'_>,
        id: CircuitId,
    ) {
        let Some(bytes) = state.circuits.get_mut(id.0).and_then(VirtualCircuit::take_outbound) else {
            return;
        };
        trace!(circuit_id = %id, len = bytes.len(), "flushing circuit");
        if let Err(e) = self.transport.send(id, bytes) {
            warn!(circuit_id = %id, error = %e, "send failed");
            self.disconnect_circuit(state, id, "send failed");
        }
    }

    /// Flush once the queue has grown past the configured threshold.
    pub(super) fn auto_flush(
        &self,
        state: &mut StateGuard<'_>,
        id: CircuitId,
    ) {
        let queued = state.circuits.get(id.0).map_or(0, VirtualCircuit::queued_len);
        if queued >= self.config.flush_threshold {
            self.flush_circuit(state, id);
        }
    }

    fn flush_all(
        &self,
        state: &mut StateGuard<'_>,
    ) {
        let mut order: Vec<(u8, CircuitId)> = state.circuits.values().map(|c| (c.priority(), c.id())).collect();
        order.sort_by(|a, b| b.cmp(a));
        for (_, id) in order {
            self.flush_circuit(state, id);
        }
    }

    /// Tear down a circuit. Every channel bound to it goes back to name
    /// resolution and every IO on those channels fails once with
    /// `Disconnected`.
    pub(super) fn disconnect_circuit(
        &self,
        state: &mut StateGuard<'_>,
        id: CircuitId,
        reason: &str,
    ) {
        let st = &mut **state;
        let Some(mut circuit) = st.circuits.remove(id.0) else {
            return;
        };
        let server = circuit.server();
        if st.servers.get(&server) == Some(&id) {
            st.servers.remove(&server);
        }
        let channels = circuit.shutdown(&self.buffers);
        self.transport.disconnect(id);
        warn!(circuit_id = %id, %server, reason, channels = channels.len(), "circuit disconnected");

        let mut callbacks = Vec::new();
        for cid in channels {
            self.return_to_search(st, cid, &mut callbacks);
        }
        run_callbacks(state, callbacks);
    }

    /// Unbind one channel, fail its IO and restart its search. The caller
    /// removes the channel from its circuit.
    pub(super) fn return_to_search(
        &self,
        st: &mut ContextState,
        cid: ChannelId,
        callbacks: &mut Vec<(ChannelId, Callback)>,
    ) {
        let Some(channel) = st.channels.get_mut(cid.0) else {
            return;
        };
        let was_connected = channel.is_connected();
        let ops = channel.uninstall_all_io(&mut st.ios);
        channel.unbind();
        let notify = channel.notify();
        self.resolver.search(cid, channel.name());

        for op in ops {
            if let Some(callback) = self.fail_io(st, op, Status::Disconnected, "virtual circuit disconnect") {
                callbacks.push((cid, callback));
            }
        }
        if was_connected {
            callbacks.push((cid, Box::new(move || notify.disconnect_notify(cid))));
        }
    }

    /// Connection-establishment deadline
    fn connection_timeout(
        &self,
        id: CircuitId,
    ) {
        let callbacks = self.callback_guard();
        let mut state = self.lock_state(&callbacks);
        let server = match state.circuits.get(id.0) {
            Some(circuit) if circuit.state() != CircuitState::Connected => circuit.server(),
            _ => return,
        };
        warn!(circuit_id = %id, %server, "circuit connect timed out");
        self.disconnect_circuit(&mut state, id, "connection timeout");
    }

    fn watchdog_expired(
        &self,
        id: CircuitId,
    ) {
        let callbacks = self.callback_guard();
        let mut state = self.lock_state(&callbacks);
        let Some(circuit) = state.circuits.get_mut(id.0) else {
            return;
        };

        let action = circuit.watchdog_expired();
        if action == WatchdogAction::SendEcho {
            circuit.probe();
        }
        let server = circuit.server();
        let timer = self.schedule(self.config.echo_period(), move |inner| inner.watchdog_expired(id));
        circuit.set_watchdog(timer);

        match action {
            WatchdogAction::Idle | WatchdogAction::StillUnresponsive => {}
            WatchdogAction::SendEcho => {
                trace!(circuit_id = %id, "receive watchdog expired, sending echo");
                self.flush_circuit(&mut state, id);
            }
            WatchdogAction::Unresponsive => {
                warn!(circuit_id = %id, %server, "circuit unresponsive");
                let context = format!("virtual circuit to {server} unresponsive");
                self.raise(&mut state, Status::UnresponsiveTimeout, &context, file!(), line!());
            }
        }
    }

    /// Echo-probe unresponsive circuits to a server that just beaconed.
    pub(super) fn probe_unresponsive(
        &self,
        state: &mut StateGuard<'_>,
        address: SocketAddr,
    ) {
        let mut probed = Vec::new();
        for id in state.circuits.ids() {
            if let Some(circuit) = state.circuits.get_mut(id) {
                if circuit.server().address == address && circuit.is_unresponsive() && circuit.probe() {
                    probed.push(CircuitId(id));
                }
            }
        }
        for id in probed {
            debug!(circuit_id = %id, %address, "probing unresponsive circuit after beacon");
            self.flush_circuit(state, id);
        }
    }
}
