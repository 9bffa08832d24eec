//! Client Context Error Hierarchy
//!
//! Errors returned across the public operation surface. Failures that belong
//! to one outstanding operation (access denied by the server, bounds exceeded,
//! disconnect) are never returned here; they travel to that operation's
//! callback as a [`Status`](crate::Status).

use config::ConfigError;

use crate::Status;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Channel id is not (or no longer) registered with this context
    #[error("Channel {0} is not known to this context")]
    BadChannel(u32),

    /// Operation needs a connected channel
    #[error("Channel {0} is not connected")]
    ChannelNotConnected(u32),

    /// Requested element count is larger than the channel's native count
    #[error("Requested element count {requested} exceeds native element count {native}")]
    TypeMismatch { requested: u32, native: u32 },

    /// Unknown or unsupported DBR type code
    #[error("Invalid DBR type code {0}")]
    BadType(u16),

    /// Serialized value does not fit the requested type/count
    #[error("Value is {actual} bytes but type/count require {expected} bytes")]
    BadValueLength { expected: usize, actual: usize },

    #[error("Read access denied on channel {0}")]
    NoReadAccess(u32),

    #[error("Write access denied on channel {0}")]
    NoWriteAccess(u32),

    /// Subscription without any event selected
    #[error("Subscription event mask is empty")]
    BadMask,

    #[error("Priority {0} is outside the supported range")]
    BadPriority(u8),

    #[error("Channel name is empty")]
    EmptyChannelName,

    /// Sync group id unknown, or the group no longer accepts members
    #[error("Sync group {0} is unknown or closed")]
    BadSyncGroup(u32),

    /// Waiting for network completion from inside a callback would deadlock
    /// the delivery thread that is running the callback
    #[error("Blocking wait requested from inside a callback")]
    BlockingInCallback,

    #[error("Payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Wire-level violations
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Byte stream failures reported by the transport boundary
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Context configuration validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Message payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Unrecognized command code {0}")]
    UnknownCommand(u16),

    /// The command is valid but not allowed in the circuit's current state
    #[error("Command {command} is not expected while {state}")]
    UnexpectedMessage { command: u16, state: &'static str },

    #[error("Malformed body for command {command}: {reason}")]
    MalformedBody { command: u16, reason: &'static str },
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connect to {server} failed: {reason}")]
    ConnectFailed { server: String, reason: String },

    #[error("Send on circuit {circuit} failed: {reason}")]
    SendFailed { circuit: u32, reason: String },
}

impl Error {
    /// Wire status equivalent, used when an error has to be routed through
    /// the exception path instead of being returned.
    pub fn status(&self) -> Status {
        match self {
            Error::BadChannel(_) => Status::BadChannelId,
            Error::ChannelNotConnected(_) => Status::Disconnected,
            Error::TypeMismatch { .. } => Status::BadCount,
            Error::BadType(_) => Status::BadType,
            Error::BadValueLength { .. } => Status::BadCount,
            Error::NoReadAccess(_) => Status::NoReadAccess,
            Error::NoWriteAccess(_) => Status::NoWriteAccess,
            Error::BadMask => Status::BadMask,
            Error::BadPriority(_) => Status::BadPriority,
            Error::EmptyChannelName => Status::EmptyString,
            Error::BadSyncGroup(_) => Status::BadSyncGroup,
            Error::BlockingInCallback => Status::EventsDisallowed,
            Error::PayloadTooLarge { .. } => Status::TooLarge,
            Error::Protocol(_) => Status::Internal,
            Error::Transport(_) => Status::Disconnected,
            Error::Config(_) => Status::Internal,
        }
    }
}
