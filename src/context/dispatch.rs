//! Response dispatch: one arm per command a server may send on a circuit.
//!
//! Every lookup goes through the id tables. A response whose id is no longer
//! registered, or is registered against a channel on a different circuit, is
//! logged and dropped.

use bytes::Bytes;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::run_callbacks;
use super::Callback;
use super::ContextInner;
use super::ContextState;
use super::StateGuard;
use crate::AccessRights;
use crate::ChannelId;
use crate::CircuitId;
use crate::Command;
use crate::DbrType;
use crate::GroupResult;
use crate::IoId;
use crate::IoKind;
use crate::IoOperation;
use crate::IoRef;
use crate::Message;
use crate::MessageHeader;
use crate::ProtocolError;
use crate::ReadIo;
use crate::ReadTarget;
use crate::RecycleIo;
use crate::Status;
use crate::WriteIo;
use crate::WriteTarget;

impl ContextInner {
    pub(super) fn dispatch(
        &self,
        state: &mut StateGuard<'_>,
        circuit: CircuitId,
        msg: Message,
    ) {
        let header = msg.header;
        let Some(command) = Command::from_code(header.command) else {
            self.protocol_violation(state, circuit, ProtocolError::UnknownCommand(header.command));
            return;
        };
        trace!(circuit_id = %circuit, ?command, len = msg.body.len(), "response");

        match command {
            Command::Version | Command::ClearChannel => {}
            Command::Echo => {
                if let Some(vc) = state.circuits.get_mut(circuit.0) {
                    vc.echo_received();
                }
            }
            Command::EventAdd => self.subscription_update(state, circuit, &header, msg.body),
            Command::Read => self.read_response(state, circuit, &header, Status::Normal, msg.body),
            Command::ReadNotify => {
                let status = Status::from_code(header.param1);
                self.read_response(state, circuit, &header, status, msg.body);
            }
            Command::WriteNotify => self.write_response(state, circuit, &header),
            Command::Error => self.error_response(state, circuit, &msg),
            Command::AccessRights => self.access_rights_response(state, circuit, &header),
            Command::CreateChannel => self.create_channel_response(state, circuit, &header),
            Command::CreateChannelFail | Command::ServerDisconnect => {
                self.channel_lost(state, circuit, ChannelId(header.param1), command)
            }
            Command::EventCancel
            | Command::Write
            | Command::Search
            | Command::Beacon
            | Command::NotFound
            | Command::ClientName
            | Command::HostName => {
                let err = ProtocolError::UnexpectedMessage {
                    command: header.command,
                    state: "connected",
                };
                self.protocol_violation(state, circuit, err);
            }
        }
    }

    /// True when `cid` is registered and bound to `circuit`.
    pub(super) fn on_circuit(
        st: &ContextState,
        cid: ChannelId,
        circuit: CircuitId,
    ) -> bool {
        st.channels.get(cid.0).is_some_and(|c| c.circuit() == Some(circuit))
    }

    /// Unregister the IO a response names, provided it belongs to a channel
    /// of the circuit the response arrived on.
    pub(super) fn take_io(
        &self,
        st: &mut ContextState,
        io: IoRef,
        circuit: CircuitId,
    ) -> Option<IoOperation> {
        if st.ios.kind_of(io.id) != Some(io.kind) {
            trace!(ioid = %io.id, kind = ?io.kind, "response for unknown io");
            return None;
        }
        let cid = st.ios.channel_of(io.id)?;
        if !Self::on_circuit(st, cid, circuit) {
            warn!(ioid = %io.id, %cid, circuit_id = %circuit, "response for io of another circuit");
            return None;
        }
        let op = st.ios.recycle(io)?;
        if let Some(channel) = st.channels.get_mut(cid.0) {
            channel.detach_io(io.id);
        }
        Some(op)
    }

    fn subscription_update(
        &self,
        state: &mut StateGuard<'_>,
        circuit: CircuitId,
        header: &MessageHeader,
        body: Bytes,
    ) {
        let id = IoId(header.param2);
        let Some(sub) = state.ios.subscription(id) else {
            trace!(ioid = %id, "update for unknown subscription");
            return;
        };
        if !Self::on_circuit(state, sub.channel, circuit) {
            warn!(ioid = %id, circuit_id = %circuit, "subscription update from another circuit");
            return;
        }

        let notify = sub.notify.clone();
        let status = Status::from_code(header.param1);
        let (data_type, count) = (DbrType(header.data_type), header.count);
        if status.is_success() {
            state.unlocked(|| notify.current(data_type, count, &body));
        } else {
            state.unlocked(|| notify.exception(status, "subscription update failed", data_type, count));
        }
    }

    fn read_response(
        &self,
        state: &mut StateGuard<'_>,
        circuit: CircuitId,
        header: &MessageHeader,
        status: Status,
        body: Bytes,
    ) {
        let io = IoRef {
            kind: IoKind::Read,
            id: IoId(header.param2),
        };
        let Some(IoOperation::Read(read)) = self.take_io(state, io, circuit) else {
            return;
        };

        let (data_type, count) = (DbrType(header.data_type), header.count);
        match read.target {
            ReadTarget::User(notify) if status.is_success() => {
                state.unlocked(|| notify.completion(data_type, count, &body));
            }
            ReadTarget::User(notify) => {
                state.unlocked(|| notify.exception(status, "read failed", data_type, count));
            }
            ReadTarget::Group(group) => {
                let result = GroupResult {
                    io: read.id,
                    channel: read.channel,
                    status,
                    data_type,
                    count,
                    data: status.is_success().then_some(body),
                };
                self.finish_group_member(state, group, result);
            }
        }
    }

    fn write_response(
        &self,
        state: &mut StateGuard<'_>,
        circuit: CircuitId,
        header: &MessageHeader,
    ) {
        let io = IoRef {
            kind: IoKind::Write,
            id: IoId(header.param2),
        };
        let Some(IoOperation::Write(write)) = self.take_io(state, io, circuit) else {
            return;
        };

        let status = Status::from_code(header.param1);
        match write.target {
            WriteTarget::User(notify) if status.is_success() => state.unlocked(|| notify.completion()),
            WriteTarget::User(notify) => {
                let (data_type, count) = (write.data_type, write.count);
                state.unlocked(|| notify.exception(status, "write failed", data_type, count));
            }
            WriteTarget::Group(group) => {
                let result = GroupResult {
                    io: write.id,
                    channel: write.channel,
                    status,
                    data_type: write.data_type,
                    count: write.count,
                    data: None,
                };
                self.finish_group_member(state, group, result);
            }
        }
    }

    fn access_rights_response(
        &self,
        state: &mut StateGuard<'_>,
        circuit: CircuitId,
        header: &MessageHeader,
    ) {
        let cid = ChannelId(header.param1);
        let rights = AccessRights(header.param2);
        let Some(channel) = state.channels.get_mut(cid.0) else {
            trace!(%cid, "access rights for unknown channel");
            return;
        };
        if channel.circuit() != Some(circuit) {
            warn!(%cid, circuit_id = %circuit, "access rights from another circuit");
            return;
        }
        channel.set_access_rights(rights);
        debug!(%cid, ?rights, "access rights changed");

        // a pending channel reports its rights together with the connect
        if channel.is_connected() {
            let notify = channel.notify();
            state.unlocked(|| notify.access_rights_notify(cid, rights));
        }
    }

    fn create_channel_response(
        &self,
        state: &mut StateGuard<'_>,
        circuit: CircuitId,
        header: &MessageHeader,
    ) {
        let cid = ChannelId(header.param1);
        let Some(channel) = state.channels.get_mut(cid.0) else {
            trace!(%cid, "create reply for unknown channel");
            return;
        };
        if channel.circuit() != Some(circuit) || channel.is_connected() {
            warn!(%cid, circuit_id = %circuit, "unexpected create reply");
            return;
        }

        channel.connect(header.param2, DbrType(header.data_type), header.count);
        debug!(
            %cid,
            sid = header.param2,
            native_type = header.data_type,
            native_count = header.count,
            "channel connected"
        );
        let notify = channel.notify();
        let rights = channel.access_rights();
        state.unlocked(|| {
            notify.connect_notify(cid);
            notify.access_rights_notify(cid, rights);
        });
    }

    /// The server refused or dropped one channel; it goes back to name
    /// resolution while the circuit stays up.
    fn channel_lost(
        &self,
        state: &mut StateGuard<'_>,
        circuit: CircuitId,
        cid: ChannelId,
        command: Command,
    ) {
        if !Self::on_circuit(state, cid, circuit) {
            trace!(%cid, circuit_id = %circuit, ?command, "channel notice for unknown channel");
            return;
        }
        debug!(%cid, circuit_id = %circuit, ?command, "server released channel");

        let st = &mut **state;
        if let Some(vc) = st.circuits.get_mut(circuit.0) {
            vc.unbind_channel(cid);
        }
        let mut callbacks = Vec::new();
        self.return_to_search(st, cid, &mut callbacks);
        run_callbacks(state, callbacks);
    }

    /// Fail one unregistered operation. Group members finish in place; user
    /// targets get their exception as the returned callback.
    pub(super) fn fail_io(
        &self,
        st: &mut ContextState,
        op: IoOperation,
        status: Status,
        context: &str,
    ) -> Option<Callback> {
        let context = context.to_string();
        let (data_type, count) = (op.data_type(), op.count());
        match op {
            IoOperation::Read(ReadIo {
                target: ReadTarget::User(notify),
                ..
            }) => Some(Box::new(move || notify.exception(status, &context, data_type, count))),
            IoOperation::Write(WriteIo {
                target: WriteTarget::User(notify),
                ..
            }) => Some(Box::new(move || notify.exception(status, &context, data_type, count))),
            IoOperation::Subscription(sub) => {
                Some(Box::new(move || sub.notify.exception(status, &context, data_type, count)))
            }
            IoOperation::Read(ReadIo {
                id,
                channel,
                target: ReadTarget::Group(group),
                ..
            })
            | IoOperation::Write(WriteIo {
                id,
                channel,
                target: WriteTarget::Group(group),
                ..
            }) => {
                let result = GroupResult {
                    io: id,
                    channel,
                    status,
                    data_type,
                    count,
                    data: None,
                };
                self.finish_group_member(st, group, result);
                None
            }
        }
    }
}
