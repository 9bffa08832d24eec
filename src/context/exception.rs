//! Error responses. The server echoes the header of the request it rejected;
//! the embedded command decides who hears about it.

use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::run_callbacks;
use super::ContextInner;
use super::StateGuard;
use crate::parse_error_body;
use crate::ChannelId;
use crate::CircuitId;
use crate::Command;
use crate::DbrType;
use crate::IoId;
use crate::IoKind;
use crate::IoRef;
use crate::Message;
use crate::MessageHeader;
use crate::Status;

impl ContextInner {
    pub(super) fn error_response(
        &self,
        state: &mut StateGuard<'_>,
        circuit: CircuitId,
        msg: &Message,
    ) {
        let (request, context) = match parse_error_body(&msg.body) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.protocol_violation(state, circuit, e);
                return;
            }
        };
        let status = Status::from_code(msg.header.param2);
        debug!(
            circuit_id = %circuit,
            request = request.command,
            %status,
            context = context.as_str(),
            "error response"
        );

        match Command::from_code(request.command) {
            Some(Command::EventAdd) => self.subscription_exception(state, circuit, &request, status, &context),
            Some(Command::Read | Command::ReadNotify) => {
                self.io_exception(state, circuit, IoKind::Read, &request, status, &context)
            }
            Some(Command::WriteNotify) => self.io_exception(state, circuit, IoKind::Write, &request, status, &context),
            Some(Command::Write) => self.write_exception(state, circuit, &request, status, &context),
            _ => {
                let context = format!("{context} (request command {})", request.command);
                self.raise(state, status, &context, file!(), line!());
            }
        }
    }

    /// The subscription stays installed.
    fn subscription_exception(
        &self,
        state: &mut StateGuard<'_>,
        circuit: CircuitId,
        request: &MessageHeader,
        status: Status,
        context: &str,
    ) {
        let id = IoId(request.param2);
        let Some(sub) = state.ios.subscription(id) else {
            trace!(ioid = %id, "error for unknown subscription");
            return;
        };
        if !Self::on_circuit(state, sub.channel, circuit) {
            warn!(ioid = %id, circuit_id = %circuit, "subscription error from another circuit");
            return;
        }
        let notify = sub.notify.clone();
        let (data_type, count) = (DbrType(request.data_type), request.count);
        state.unlocked(|| notify.exception(status, context, data_type, count));
    }

    /// One-shot reads and writes end with the exception.
    fn io_exception(
        &self,
        state: &mut StateGuard<'_>,
        circuit: CircuitId,
        kind: IoKind,
        request: &MessageHeader,
        status: Status,
        context: &str,
    ) {
        let io = IoRef {
            kind,
            id: IoId(request.param2),
        };
        let st = &mut **state;
        let Some(op) = self.take_io(st, io, circuit) else {
            return;
        };
        let cid = op.channel();
        let callbacks = self
            .fail_io(st, op, status, context)
            .map(|callback| (cid, callback))
            .into_iter()
            .collect();
        run_callbacks(state, callbacks);
    }

    /// A plain write carries the channel id where other requests carry an
    /// IO id.
    fn write_exception(
        &self,
        state: &mut StateGuard<'_>,
        circuit: CircuitId,
        request: &MessageHeader,
        status: Status,
        context: &str,
    ) {
        let cid = ChannelId(request.param2);
        if !Self::on_circuit(state, cid, circuit) {
            trace!(%cid, "write error for unknown channel");
            return;
        }
        let Some(notify) = state.channels.get(cid.0).map(|c| c.notify()) else {
            return;
        };
        state.unlocked(|| notify.exception(cid, status, context));
    }
}
