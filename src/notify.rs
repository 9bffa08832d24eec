//! Callback contracts between the engine and user code.
//!
//! Every method here is invoked with the context's callback lock held and its
//! internal state lock released, so an implementation may call back into the
//! public [`Context`](crate::Context) surface, but two callbacks of one
//! context never run concurrently.

use bytes::Bytes;
#[cfg(test)]
use mockall::automock;

use crate::AccessRights;
use crate::ChannelId;
use crate::DbrType;
use crate::Status;

/// Context-wide notification target.
#[cfg_attr(test, automock)]
pub trait ContextNotify: Send + Sync + 'static {
    /// An error that has no single owning operation, or that the owning
    /// operation had no way to receive.
    fn exception(
        &self,
        status: Status,
        context: &str,
        file: &str,
        line: u32,
    );

    /// A batch of callbacks is about to be delivered on this thread.
    fn callback_processing_initiate(&self) {}

    /// The batch announced by `callback_processing_initiate` is finished.
    fn callback_processing_complete(&self) {}
}

/// Connection state changes of one channel.
#[cfg_attr(test, automock)]
pub trait ChannelNotify: Send + Sync + 'static {
    fn connect_notify(
        &self,
        channel: ChannelId,
    );

    fn disconnect_notify(
        &self,
        channel: ChannelId,
    );

    fn access_rights_notify(
        &self,
        _channel: ChannelId,
        _rights: AccessRights,
    ) {
    }

    /// Channel-level failure, e.g. a rejected plain write.
    fn exception(
        &self,
        _channel: ChannelId,
        _status: Status,
        _context: &str,
    ) {
    }
}

/// One-shot read completion.
#[cfg_attr(test, automock)]
pub trait ReadNotify: Send + Sync + 'static {
    fn completion(
        &self,
        data_type: DbrType,
        count: u32,
        data: &Bytes,
    );

    fn exception(
        &self,
        status: Status,
        context: &str,
        data_type: DbrType,
        count: u32,
    );
}

/// One-shot write completion.
#[cfg_attr(test, automock)]
pub trait WriteNotify: Send + Sync + 'static {
    fn completion(&self);

    fn exception(
        &self,
        status: Status,
        context: &str,
        data_type: DbrType,
        count: u32,
    );
}

/// Repeating subscription updates.
#[cfg_attr(test, automock)]
pub trait StateNotify: Send + Sync + 'static {
    fn current(
        &self,
        data_type: DbrType,
        count: u32,
        data: &Bytes,
    );

    fn exception(
        &self,
        status: Status,
        context: &str,
        data_type: DbrType,
        count: u32,
    );
}
