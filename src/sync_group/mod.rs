//! Batches of IO operations waited on as a unit.
//!
//! A group only counts: members are ordinary reads and writes whose results
//! are collected here instead of reaching a user callback. The context owns
//! the group table and the condition variable waiters sleep on.

use std::collections::BTreeSet;

use bytes::Bytes;

use crate::ChannelId;
use crate::DbrType;
use crate::Error;
use crate::GroupId;
use crate::IoId;
use crate::Result;
use crate::Status;


/// Outcome of one finished member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupResult {
    pub io: IoId,
    pub channel: ChannelId,
    pub status: Status,
    pub data_type: DbrType,
    pub count: u32,
    /// Value of a successful read
    pub data: Option<Bytes>,
}

/// Point-in-time copy of a group's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncGroupInfo {
    pub id: GroupId,
    pub outstanding: usize,
    pub completed: usize,
    /// Times the outstanding count dropped to zero
    pub completions: u64,
    pub closed: bool,
}

#[derive(Debug)]
pub struct SyncGroup {
    id: GroupId,
    outstanding: BTreeSet<IoId>,
    results: Vec<GroupResult>,
    completions: u64,
    closed: bool,
}

impl SyncGroup {
    pub fn new(id: GroupId) -> Self {
        Self {
            id,
            outstanding: BTreeSet::new(),
            results: Vec::new(),
            completions: 0,
            closed: false,
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Accepts members until closed.
    pub fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::BadSyncGroup(self.id.0));
        }
        Ok(())
    }

    pub fn add_member(
        &mut self,
        io: IoId,
    ) -> Result<()> {
        self.check_open()?;
        self.outstanding.insert(io);
        Ok(())
    }

    /// Record a finished member. Returns true when this was the last
    /// outstanding one.
    pub fn complete_member(
        &mut self,
        result: GroupResult,
    ) -> bool {
        if !self.outstanding.remove(&result.io) {
            return false;
        }
        self.results.push(result);
        self.settle()
    }

    /// Drop a member that will never complete, without a result.
    pub fn cancel_member(
        &mut self,
        io: IoId,
    ) -> bool {
        if !self.outstanding.remove(&io) {
            return false;
        }
        self.settle()
    }

    fn settle(&mut self) -> bool {
        if self.outstanding.is_empty() {
            self.completions += 1;
            return true;
        }
        false
    }

    pub fn is_complete(&self) -> bool {
        self.outstanding.is_empty()
    }

    pub fn outstanding(&self) -> impl Iterator<Item = IoId> + '_ {
        self.outstanding.iter().copied()
    }

    pub fn results(&self) -> &[GroupResult] {
        &self.results
    }

    /// Forget outstanding members and collected results; the caller is
    /// responsible for cancelling the members themselves.
    pub fn reset(&mut self) -> Vec<IoId> {
        self.results.clear();
        std::mem::take(&mut self.outstanding).into_iter().collect()
    }

    /// Stop accepting members. Returns true when the group can be released
    /// right away.
    pub fn close(&mut self) -> bool {
        self.closed = true;
        self.outstanding.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Closed and nothing left to wait for
    pub fn is_releasable(&self) -> bool {
        self.closed && self.outstanding.is_empty()
    }

    pub fn info(&self) -> SyncGroupInfo {
        SyncGroupInfo {
            id: self.id,
            outstanding: self.outstanding.len(),
            completed: self.results.len(),
            completions: self.completions,
            closed: self.closed,
        }
    }
}
