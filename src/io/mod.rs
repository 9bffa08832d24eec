//! Outstanding IO operations.
//!
//! Reads, writes and subscriptions each live in their own [`IdTable`], so a
//! response whose command names one kind can never complete an operation of
//! another. All three draw ids from one chronological counter: an IO id is
//! unique across kinds for as long as its operation is registered.

use std::fmt;
use std::sync::Arc;

use crate::ChannelId;
use crate::DbrType;
use crate::EventMask;
use crate::GroupId;
use crate::IdTable;
use crate::IoId;
use crate::ReadNotify;
use crate::StateNotify;
use crate::WriteNotify;


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoKind {
    Read,
    Write,
    Subscription,
}

/// Kind-qualified IO id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IoRef {
    pub kind: IoKind,
    pub id: IoId,
}

/// Where a read result goes
#[derive(Clone)]
pub enum ReadTarget {
    User(Arc<dyn ReadNotify>),
    Group(GroupId),
}

/// Where a write acknowledgement goes
#[derive(Clone)]
pub enum WriteTarget {
    User(Arc<dyn WriteNotify>),
    Group(GroupId),
}

pub struct ReadIo {
    pub id: IoId,
    pub channel: ChannelId,
    pub data_type: DbrType,
    pub count: u32,
    pub target: ReadTarget,
}

pub struct WriteIo {
    pub id: IoId,
    pub channel: ChannelId,
    pub data_type: DbrType,
    pub count: u32,
    pub target: WriteTarget,
}

/// Repeats until cancelled.
pub struct SubscriptionIo {
    pub id: IoId,
    pub channel: ChannelId,
    pub data_type: DbrType,
    pub count: u32,
    pub mask: EventMask,
    pub notify: Arc<dyn StateNotify>,
}

pub enum IoOperation {
    Read(ReadIo),
    Write(WriteIo),
    Subscription(SubscriptionIo),
}

impl IoOperation {
    pub fn io_ref(&self) -> IoRef {
        let (kind, id) = match self {
            IoOperation::Read(io) => (IoKind::Read, io.id),
            IoOperation::Write(io) => (IoKind::Write, io.id),
            IoOperation::Subscription(io) => (IoKind::Subscription, io.id),
        };
        IoRef { kind, id }
    }

    pub fn channel(&self) -> ChannelId {
        match self {
            IoOperation::Read(io) => io.channel,
            IoOperation::Write(io) => io.channel,
            IoOperation::Subscription(io) => io.channel,
        }
    }

    pub fn data_type(&self) -> DbrType {
        match self {
            IoOperation::Read(io) => io.data_type,
            IoOperation::Write(io) => io.data_type,
            IoOperation::Subscription(io) => io.data_type,
        }
    }

    pub fn count(&self) -> u32 {
        match self {
            IoOperation::Read(io) => io.count,
            IoOperation::Write(io) => io.count,
            IoOperation::Subscription(io) => io.count,
        }
    }

    /// Sync group the operation counts toward, if any
    pub fn group(&self) -> Option<GroupId> {
        match self {
            IoOperation::Read(ReadIo {
                target: ReadTarget::Group(group),
                ..
            }) => Some(*group),
            IoOperation::Write(WriteIo {
                target: WriteTarget::Group(group),
                ..
            }) => Some(*group),
            _ => None,
        }
    }
}

impl fmt::Debug for IoOperation {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("IoOperation")
            .field("io", &self.io_ref())
            .field("channel", &self.channel())
            .field("data_type", &self.data_type())
            .field("count", &self.count())
            .finish()
    }
}

/// Capability to unregister an IO operation and release its pool slot.
///
/// Channel code receives this by reference; only the IO tables implement it.
pub trait RecycleIo {
    fn recycle(
        &mut self,
        io: IoRef,
    ) -> Option<IoOperation>;

    fn registered_kind(
        &self,
        id: IoId,
    ) -> Option<IoKind>;

    /// Recycle by bare id, whatever its kind.
    fn recycle_id(
        &mut self,
        id: IoId,
    ) -> Option<IoOperation> {
        let kind = self.registered_kind(id)?;
        self.recycle(IoRef { kind, id })
    }
}

pub struct IoTables {
    next_id: u32,
    reads: IdTable<ReadIo>,
    writes: IdTable<WriteIo>,
    subscriptions: IdTable<SubscriptionIo>,
}

impl IoTables {
    pub fn with_chunk(chunk: usize) -> Self {
        Self {
            next_id: 1,
            reads: IdTable::with_chunk(chunk),
            writes: IdTable::with_chunk(chunk),
            subscriptions: IdTable::with_chunk(chunk),
        }
    }

    /// Next id not registered in any of the three tables
    pub fn allocate_id(&mut self) -> IoId {
        loop {
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);
            if self.kind_of(IoId(id)).is_none() {
                return IoId(id);
            }
        }
    }

    /// Register an operation built with an id from [`IoTables::allocate_id`].
    pub fn install(
        &mut self,
        op: IoOperation,
    ) -> IoRef {
        let io = op.io_ref();
        match op {
            IoOperation::Read(read) => self.reads.insert_at(io.id.0, read),
            IoOperation::Write(write) => self.writes.insert_at(io.id.0, write),
            IoOperation::Subscription(sub) => self.subscriptions.insert_at(io.id.0, sub),
        }
        io
    }

    pub fn kind_of(
        &self,
        id: IoId,
    ) -> Option<IoKind> {
        if self.reads.contains(id.0) {
            Some(IoKind::Read)
        } else if self.writes.contains(id.0) {
            Some(IoKind::Write)
        } else if self.subscriptions.contains(id.0) {
            Some(IoKind::Subscription)
        } else {
            None
        }
    }

    pub fn read(
        &self,
        id: IoId,
    ) -> Option<&ReadIo> {
        self.reads.get(id.0)
    }

    pub fn write(
        &self,
        id: IoId,
    ) -> Option<&WriteIo> {
        self.writes.get(id.0)
    }

    pub fn subscription(
        &self,
        id: IoId,
    ) -> Option<&SubscriptionIo> {
        self.subscriptions.get(id.0)
    }

    /// Owning channel of a registered operation of any kind
    pub fn channel_of(
        &self,
        id: IoId,
    ) -> Option<ChannelId> {
        self.read(id)
            .map(|io| io.channel)
            .or_else(|| self.write(id).map(|io| io.channel))
            .or_else(|| self.subscription(id).map(|io| io.channel))
    }

    pub fn len(&self) -> usize {
        self.reads.len() + self.writes.len() + self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Operations registered against `channel`, across all kinds
    pub fn count_for_channel(
        &self,
        channel: ChannelId,
    ) -> usize {
        self.reads.values().filter(|io| io.channel == channel).count()
            + self.writes.values().filter(|io| io.channel == channel).count()
            + self.subscriptions.values().filter(|io| io.channel == channel).count()
    }

    #[cfg(test)]
    pub(crate) fn set_next_id(
        &mut self,
        next_id: u32,
    ) {
        self.next_id = next_id;
    }
}

impl RecycleIo for IoTables {
    fn recycle(
        &mut self,
        io: IoRef,
    ) -> Option<IoOperation> {
        match io.kind {
            IoKind::Read => self.reads.remove(io.id.0).map(IoOperation::Read),
            IoKind::Write => self.writes.remove(io.id.0).map(IoOperation::Write),
            IoKind::Subscription => self.subscriptions.remove(io.id.0).map(IoOperation::Subscription),
        }
    }

    fn registered_kind(
        &self,
        id: IoId,
    ) -> Option<IoKind> {
        self.kind_of(id)
    }
}
