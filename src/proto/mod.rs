//! Wire schema of the virtual circuit byte stream.
//!
//! Every message is a fixed header followed by a payload padded to
//! [`MESSAGE_ALIGNMENT`]. All numeric fields travel big-endian; conversion
//! happens explicitly through the `bytes` big-endian accessors on both the
//! send and the receive path.

mod command;
mod dbr;
mod header;
mod message;
mod request;
mod status;

pub use command::*;
pub use dbr::*;
pub use header::*;
pub use message::*;
pub(crate) use request::*;
pub use status::*;


/// Payloads are padded to this boundary
pub const MESSAGE_ALIGNMENT: usize = 8;

/// Round `len` up to the payload alignment.
pub(crate) fn align_payload(len: usize) -> usize {
    (len + MESSAGE_ALIGNMENT - 1) & !(MESSAGE_ALIGNMENT - 1)
}
