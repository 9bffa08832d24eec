//! Request issue and IO cancellation.

use std::sync::Arc;

use tracing::trace;
use tracing::warn;

use super::Context;
use super::ContextInner;
use super::StateGuard;
use crate::proto::encode_event_add;
use crate::proto::encode_event_cancel;
use crate::proto::encode_read_notify;
use crate::proto::encode_write;
use crate::proto::encode_write_notify;
use crate::ChannelId;
use crate::CircuitId;
use crate::DbrType;
use crate::Error;
use crate::EventMask;
use crate::IoId;
use crate::IoOperation;
use crate::IoRef;
use crate::ReadIo;
use crate::ReadNotify;
use crate::ReadTarget;
use crate::RecycleIo;
use crate::Result;
use crate::StateNotify;
use crate::SubscriptionIo;
use crate::WriteIo;
use crate::WriteNotify;
use crate::WriteTarget;

impl Context {
    /// Read `count` elements of `data_type` once. A count of 0 reads the
    /// server's current element count.
    ///
    /// Failures after the request is accepted reach `notify.exception`.
    pub fn read_notify_request(
        &self,
        cid: ChannelId,
        data_type: DbrType,
        count: u32,
        notify: Arc<dyn ReadNotify>,
    ) -> Result<IoId> {
        let callbacks = self.inner.callback_guard();
        let mut state = self.inner.lock_state(&callbacks);
        self.inner.issue_read(&mut state, cid, data_type, count, ReadTarget::User(notify))
    }

    /// Write without completion. A rejection by the server reaches the
    /// channel's exception callback.
    pub fn write_request(
        &self,
        cid: ChannelId,
        data_type: DbrType,
        count: u32,
        value: &[u8],
    ) -> Result<()> {
        let callbacks = self.inner.callback_guard();
        let mut state = self.inner.lock_state(&callbacks);
        self.inner.issue_write(&mut state, cid, data_type, count, value, None)?;
        Ok(())
    }

    pub fn write_notify_request(
        &self,
        cid: ChannelId,
        data_type: DbrType,
        count: u32,
        value: &[u8],
        notify: Arc<dyn WriteNotify>,
    ) -> Result<IoId> {
        let callbacks = self.inner.callback_guard();
        let mut state = self.inner.lock_state(&callbacks);
        let id = self
            .inner
            .issue_write(&mut state, cid, data_type, count, value, Some(WriteTarget::User(notify)))?;
        id.ok_or(Error::ChannelNotConnected(cid.0))
    }

    /// Subscribe to the events selected by `mask`. Updates keep arriving
    /// until the subscription is destroyed with [`Context::destroy_io`] or
    /// its channel disconnects.
    pub fn subscription_request(
        &self,
        cid: ChannelId,
        data_type: DbrType,
        count: u32,
        mask: EventMask,
        notify: Arc<dyn StateNotify>,
    ) -> Result<IoId> {
        let callbacks = self.inner.callback_guard();
        let mut state = self.inner.lock_state(&callbacks);
        self.inner.issue_subscription(&mut state, cid, data_type, count, mask, notify)
    }

    /// Cancel an outstanding operation of `cid`. Returns false when `io` is
    /// not registered against that channel, e.g. because it completed.
    ///
    /// No callback for `io` runs after this returns.
    pub fn destroy_io(
        &self,
        io: IoId,
        cid: ChannelId,
    ) -> Result<bool> {
        let callbacks = self.inner.callback_guard();
        let mut state = self.inner.lock_state(&callbacks);
        self.inner.destroy_io(&mut state, io, cid)
    }
}

impl ContextInner {
    /// Circuit and minor revision a request on `cid` travels with
    fn route(
        state: &StateGuard<'_>,
        cid: ChannelId,
    ) -> Result<(CircuitId, u16)> {
        let channel = state.channels.get(cid.0).ok_or(Error::BadChannel(cid.0))?;
        let circuit = channel.circuit().ok_or(Error::ChannelNotConnected(cid.0))?;
        let minor = state
            .circuits
            .get(circuit.0)
            .map(|c| c.minor_version())
            .ok_or(Error::ChannelNotConnected(cid.0))?;
        Ok((circuit, minor))
    }

    fn check_payload(
        &self,
        size: usize,
    ) -> Result<()> {
        let limit = self.config.max_array_bytes;
        if size > limit {
            return Err(Error::PayloadTooLarge { size, limit });
        }
        Ok(())
    }

    fn check_read_payload(
        &self,
        data_type: DbrType,
        count: u32,
    ) -> Result<()> {
        match data_type.element_size() {
            Some(size) => self.check_payload(size * count as usize),
            None => Ok(()),
        }
    }

    pub(super) fn issue_read(
        &self,
        state: &mut StateGuard<'_>,
        cid: ChannelId,
        data_type: DbrType,
        count: u32,
        target: ReadTarget,
    ) -> Result<IoId> {
        let (circuit_id, minor) = Self::route(state, cid)?;
        let st = &mut **state;
        let channel = st.channels.get_mut(cid.0).ok_or(Error::BadChannel(cid.0))?;
        let count = channel.check_read(data_type, count, minor)?;
        self.check_read_payload(data_type, count)?;
        let sid = channel.sid().ok_or(Error::ChannelNotConnected(cid.0))?;

        let id = st.ios.allocate_id();
        if let ReadTarget::Group(group) = &target {
            st.groups
                .get_mut(group.0)
                .ok_or(Error::BadSyncGroup(group.0))?
                .add_member(id)?;
        }
        channel.attach_io(id);
        st.ios.install(IoOperation::Read(ReadIo {
            id,
            channel: cid,
            data_type,
            count,
            target,
        }));
        if let Some(circuit) = st.circuits.get_mut(circuit_id.0) {
            encode_read_notify(circuit.outbound(), data_type, count, sid, id.0);
        }
        trace!(%cid, ioid = %id, %data_type, count, "read issued");

        self.auto_flush(state, circuit_id);
        Ok(id)
    }

    /// Queue a write. Plain writes (`target` of `None`) register no IO and
    /// return `None`.
    pub(super) fn issue_write(
        &self,
        state: &mut StateGuard<'_>,
        cid: ChannelId,
        data_type: DbrType,
        count: u32,
        value: &[u8],
        target: Option<WriteTarget>,
    ) -> Result<Option<IoId>> {
        let (circuit_id, _) = Self::route(state, cid)?;
        let st = &mut **state;
        let channel = st.channels.get_mut(cid.0).ok_or(Error::BadChannel(cid.0))?;
        channel.check_write(data_type, count, value)?;
        self.check_payload(value.len())?;
        let sid = channel.sid().ok_or(Error::ChannelNotConnected(cid.0))?;

        let id = match target {
            None => {
                if let Some(circuit) = st.circuits.get_mut(circuit_id.0) {
                    encode_write(circuit.outbound(), data_type, count, sid, cid.0, value);
                }
                None
            }
            Some(target) => {
                let id = st.ios.allocate_id();
                if let WriteTarget::Group(group) = &target {
                    st.groups
                        .get_mut(group.0)
                        .ok_or(Error::BadSyncGroup(group.0))?
                        .add_member(id)?;
                }
                channel.attach_io(id);
                st.ios.install(IoOperation::Write(WriteIo {
                    id,
                    channel: cid,
                    data_type,
                    count,
                    target,
                }));
                if let Some(circuit) = st.circuits.get_mut(circuit_id.0) {
                    encode_write_notify(circuit.outbound(), data_type, count, sid, id.0, value);
                }
                Some(id)
            }
        };
        trace!(%cid, ioid = ?id, %data_type, count, len = value.len(), "write issued");

        self.auto_flush(state, circuit_id);
        Ok(id)
    }

    fn issue_subscription(
        &self,
        state: &mut StateGuard<'_>,
        cid: ChannelId,
        data_type: DbrType,
        count: u32,
        mask: EventMask,
        notify: Arc<dyn StateNotify>,
    ) -> Result<IoId> {
        let (circuit_id, minor) = Self::route(state, cid)?;
        let st = &mut **state;
        let channel = st.channels.get_mut(cid.0).ok_or(Error::BadChannel(cid.0))?;
        let count = channel.check_subscription(data_type, count, mask, minor)?;
        self.check_read_payload(data_type, count)?;
        let sid = channel.sid().ok_or(Error::ChannelNotConnected(cid.0))?;

        let id = st.ios.allocate_id();
        channel.attach_io(id);
        st.ios.install(IoOperation::Subscription(SubscriptionIo {
            id,
            channel: cid,
            data_type,
            count,
            mask,
            notify,
        }));
        if let Some(circuit) = st.circuits.get_mut(circuit_id.0) {
            encode_event_add(circuit.outbound(), data_type, count, sid, id.0, mask);
        }
        trace!(%cid, ioid = %id, %data_type, count, ?mask, "subscription issued");

        self.auto_flush(state, circuit_id);
        Ok(id)
    }

    fn destroy_io(
        &self,
        state: &mut StateGuard<'_>,
        io: IoId,
        cid: ChannelId,
    ) -> Result<bool> {
        let st = &mut **state;
        if !st.channels.contains(cid.0) {
            return Err(Error::BadChannel(cid.0));
        }
        let Some(kind) = st.ios.kind_of(io) else {
            return Ok(false);
        };
        if st.ios.channel_of(io) != Some(cid) {
            warn!(ioid = %io, %cid, "io destroy names the wrong channel");
            return Ok(false);
        }
        let Some(op) = st.ios.recycle(IoRef { kind, id: io }) else {
            return Ok(false);
        };

        let mut flush = None;
        if let Some(channel) = st.channels.get_mut(cid.0) {
            channel.detach_io(io);
            if let (IoOperation::Subscription(sub), Some(sid), Some(circuit_id)) =
                (&op, channel.sid(), channel.circuit())
            {
                if let Some(circuit) = st.circuits.get_mut(circuit_id.0) {
                    encode_event_cancel(circuit.outbound(), sub.data_type, sub.count, sid, io.0);
                    flush = Some(circuit_id);
                }
            }
        }
        if let Some(group) = op.group() {
            self.cancel_group_member(st, group, io);
        }
        trace!(ioid = %io, %cid, ?kind, "io destroyed");

        if let Some(circuit_id) = flush {
            self.auto_flush(state, circuit_id);
        }
        Ok(true)
    }
}
