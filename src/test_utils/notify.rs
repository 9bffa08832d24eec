use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::AccessRights;
use crate::ChannelId;
use crate::ChannelNotify;
use crate::ContextNotify;
use crate::DbrType;
use crate::ReadNotify;
use crate::StateNotify;
use crate::Status;
use crate::WriteNotify;

/// Context exceptions and callback batch brackets, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingContextNotify {
    exceptions: Mutex<Vec<(Status, String)>>,
    initiated: AtomicUsize,
    completed: AtomicUsize,
}

impl RecordingContextNotify {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn exceptions(&self) -> Vec<(Status, String)> {
        self.exceptions.lock().clone()
    }

    pub fn statuses(&self) -> Vec<Status> {
        self.exceptions.lock().iter().map(|(status, _)| *status).collect()
    }

    pub fn initiated(&self) -> usize {
        self.initiated.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

impl ContextNotify for RecordingContextNotify {
    fn exception(
        &self,
        status: Status,
        context: &str,
        _file: &str,
        _line: u32,
    ) {
        self.exceptions.lock().push((status, context.to_string()));
    }

    fn callback_processing_initiate(&self) {
        self.initiated.fetch_add(1, Ordering::SeqCst);
    }

    fn callback_processing_complete(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Connected(ChannelId),
    Disconnected(ChannelId),
    AccessRights(ChannelId, AccessRights),
    Exception(ChannelId, Status, String),
}

#[derive(Debug, Default)]
pub struct RecordingChannelNotify {
    events: Mutex<Vec<ChannelEvent>>,
}

impl RecordingChannelNotify {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<ChannelEvent> {
        self.events.lock().clone()
    }

    pub fn connects(&self) -> usize {
        self.count(|e| matches!(e, ChannelEvent::Connected(_)))
    }

    pub fn disconnects(&self) -> usize {
        self.count(|e| matches!(e, ChannelEvent::Disconnected(_)))
    }

    fn count(
        &self,
        pred: impl Fn(&ChannelEvent) -> bool,
    ) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }
}

impl ChannelNotify for RecordingChannelNotify {
    fn connect_notify(
        &self,
        channel: ChannelId,
    ) {
        self.events.lock().push(ChannelEvent::Connected(channel));
    }

    fn disconnect_notify(
        &self,
        channel: ChannelId,
    ) {
        self.events.lock().push(ChannelEvent::Disconnected(channel));
    }

    fn access_rights_notify(
        &self,
        channel: ChannelId,
        rights: AccessRights,
    ) {
        self.events.lock().push(ChannelEvent::AccessRights(channel, rights));
    }

    fn exception(
        &self,
        channel: ChannelId,
        status: Status,
        context: &str,
    ) {
        self.events
            .lock()
            .push(ChannelEvent::Exception(channel, status, context.to_string()));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoEvent {
    /// Read completion or subscription update
    Data {
        data_type: DbrType,
        count: u32,
        data: Bytes,
    },
    Written,
    Exception {
        status: Status,
        context: String,
        data_type: DbrType,
        count: u32,
    },
}

/// Records every read, write and subscription callback it receives.
#[derive(Debug, Default)]
pub struct RecordingIoNotify {
    events: Mutex<Vec<IoEvent>>,
}

impl RecordingIoNotify {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<IoEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn exception_statuses(&self) -> Vec<Status> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                IoEvent::Exception { status, .. } => Some(*status),
                _ => None,
            })
            .collect()
    }

    fn push_exception(
        &self,
        status: Status,
        context: &str,
        data_type: DbrType,
        count: u32,
    ) {
        self.events.lock().push(IoEvent::Exception {
            status,
            context: context.to_string(),
            data_type,
            count,
        });
    }

    fn push_data(
        &self,
        data_type: DbrType,
        count: u32,
        data: &Bytes,
    ) {
        self.events.lock().push(IoEvent::Data {
            data_type,
            count,
            data: data.clone(),
        });
    }
}

impl ReadNotify for RecordingIoNotify {
    fn completion(
        &self,
        data_type: DbrType,
        count: u32,
        data: &Bytes,
    ) {
        self.push_data(data_type, count, data);
    }

    fn exception(
        &self,
        status: Status,
        context: &str,
        data_type: DbrType,
        count: u32,
    ) {
        self.push_exception(status, context, data_type, count);
    }
}

impl WriteNotify for RecordingIoNotify {
    fn completion(&self) {
        self.events.lock().push(IoEvent::Written);
    }

    fn exception(
        &self,
        status: Status,
        context: &str,
        data_type: DbrType,
        count: u32,
    ) {
        self.push_exception(status, context, data_type, count);
    }
}

impl StateNotify for RecordingIoNotify {
    fn current(
        &self,
        data_type: DbrType,
        count: u32,
        data: &Bytes,
    ) {
        self.push_data(data_type, count, data);
    }

    fn exception(
        &self,
        status: Status,
        context: &str,
        data_type: DbrType,
        count: u32,
    ) {
        self.push_exception(status, context, data_type, count);
    }
}
