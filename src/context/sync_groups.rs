//! Sync groups: batches of reads and writes waited on as a unit.
//!
//! Members are ordinary IO operations whose target is the group. Waiters
//! sleep on the context's condition variable, which is signalled with the
//! state lock held each time a group's outstanding count reaches zero.

use std::time::Duration;
use std::time::Instant;

use tracing::debug;
use tracing::trace;

use super::lock::in_user_callback;
use super::Context;
use super::ContextInner;
use super::ContextState;
use crate::ChannelId;
use crate::DbrType;
use crate::Error;
use crate::GroupId;
use crate::GroupResult;
use crate::IoId;
use crate::ReadTarget;
use crate::RecycleIo;
use crate::Result;
use crate::SyncGroup;
use crate::SyncGroupInfo;
use crate::WriteTarget;

impl Context {
    pub fn sync_group_create(&self) -> GroupId {
        let mut state = self.inner.lock_state_only();
        let id = GroupId(state.groups.insert_with(|id| SyncGroup::new(GroupId(id))));
        debug!(group = %id, "sync group created");
        id
    }

    /// Issue a read whose result is collected by `group`.
    pub fn sync_group_read(
        &self,
        group: GroupId,
        cid: ChannelId,
        data_type: DbrType,
        count: u32,
    ) -> Result<IoId> {
        let callbacks = self.inner.callback_guard();
        let mut state = self.inner.lock_state(&callbacks);
        self.inner.check_group_open(&state, group)?;
        self.inner
            .issue_read(&mut state, cid, data_type, count, ReadTarget::Group(group))
    }

    /// Issue a write whose acknowledgement is collected by `group`.
    pub fn sync_group_write(
        &self,
        group: GroupId,
        cid: ChannelId,
        data_type: DbrType,
        count: u32,
        value: &[u8],
    ) -> Result<IoId> {
        let callbacks = self.inner.callback_guard();
        let mut state = self.inner.lock_state(&callbacks);
        self.inner.check_group_open(&state, group)?;
        let id = self.inner.issue_write(
            &mut state,
            cid,
            data_type,
            count,
            value,
            Some(WriteTarget::Group(group)),
        )?;
        id.ok_or(Error::ChannelNotConnected(cid.0))
    }

    /// True when no member is outstanding.
    pub fn sync_group_test(
        &self,
        group: GroupId,
    ) -> Result<bool> {
        let state = self.inner.lock_state_only();
        Ok(Self::group(&state, group)?.is_complete())
    }

    /// Flush, then wait up to `timeout` for every member to finish. Returns
    /// false when the wait timed out; outstanding members stay registered.
    ///
    /// # Errors
    /// `Error::BlockingInCallback` when called from inside a callback of
    /// this context
    pub fn sync_group_block(
        &self,
        group: GroupId,
        timeout: Duration,
    ) -> Result<bool> {
        if in_user_callback() {
            return Err(Error::BlockingInCallback);
        }
        self.flush();

        let deadline = Instant::now() + timeout;
        let mut state = self.inner.lock_state_only();
        loop {
            if Self::group(&state, group)?.is_complete() {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                debug!(%group, "sync group wait timed out");
                return Ok(false);
            }
            state.wait_for(&self.inner.group_done, deadline - now);
        }
    }

    /// Cancel outstanding members and discard collected results. Waiters
    /// are woken, and a group already destroyed is released.
    pub fn sync_group_reset(
        &self,
        group: GroupId,
    ) -> Result<()> {
        let mut state = self.inner.lock_state_only();
        let st = &mut *state;
        let pending = st
            .groups
            .get_mut(group.0)
            .ok_or(Error::BadSyncGroup(group.0))?
            .reset();
        let drained = !pending.is_empty();
        for io in pending {
            if let Some(op) = st.ios.recycle_id(io) {
                if let Some(channel) = st.channels.get_mut(op.channel().0) {
                    channel.detach_io(io);
                }
            }
        }
        debug!(%group, "sync group reset");
        if drained {
            self.inner.group_drained(st, group);
        }
        Ok(())
    }

    pub fn sync_group_results(
        &self,
        group: GroupId,
    ) -> Result<Vec<GroupResult>> {
        let state = self.inner.lock_state_only();
        Ok(Self::group(&state, group)?.results().to_vec())
    }

    pub fn sync_group_info(
        &self,
        group: GroupId,
    ) -> Result<SyncGroupInfo> {
        let state = self.inner.lock_state_only();
        Ok(Self::group(&state, group)?.info())
    }

    /// Close the group. It is released at once when idle, otherwise when
    /// its last member completes or is cancelled.
    pub fn sync_group_destroy(
        &self,
        group: GroupId,
    ) -> Result<()> {
        let mut state = self.inner.lock_state_only();
        let sg = state.groups.get_mut(group.0).ok_or(Error::BadSyncGroup(group.0))?;
        if sg.is_closed() {
            return Err(Error::BadSyncGroup(group.0));
        }
        if sg.close() {
            state.groups.remove(group.0);
            debug!(%group, "sync group released");
        } else {
            debug!(%group, "sync group closed, release deferred");
        }
        Ok(())
    }

    fn group(
        state: &ContextState,
        group: GroupId,
    ) -> Result<&SyncGroup> {
        state.groups.get(group.0).ok_or(Error::BadSyncGroup(group.0))
    }
}

impl ContextInner {
    fn check_group_open(
        &self,
        state: &ContextState,
        group: GroupId,
    ) -> Result<()> {
        state
            .groups
            .get(group.0)
            .ok_or(Error::BadSyncGroup(group.0))?
            .check_open()
    }

    /// Record a member's result; wake waiters when the group drains.
    pub(super) fn finish_group_member(
        &self,
        st: &mut ContextState,
        group: GroupId,
        result: GroupResult,
    ) {
        let io = result.io;
        let done = match st.groups.get_mut(group.0) {
            Some(sg) => sg.complete_member(result),
            None => {
                trace!(%group, ioid = %io, "result for released sync group");
                return;
            }
        };
        if done {
            self.group_drained(st, group);
        }
    }

    /// Drop a member without a result.
    pub(super) fn cancel_group_member(
        &self,
        st: &mut ContextState,
        group: GroupId,
        io: IoId,
    ) {
        if st.groups.get_mut(group.0).is_some_and(|sg| sg.cancel_member(io)) {
            self.group_drained(st, group);
        }
    }

    fn group_drained(
        &self,
        st: &mut ContextState,
        group: GroupId,
    ) {
        trace!(%group, "sync group complete");
        self.group_done.notify_all();
        if st.groups.get(group.0).is_some_and(SyncGroup::is_releasable) {
            st.groups.remove(group.0);
            debug!(%group, "sync group released");
        }
    }
}
