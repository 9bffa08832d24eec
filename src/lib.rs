//! # ca-client-engine
//!
//! Client context engine for the Channel Access control-system protocol.
//!
//! A [`Context`] keeps the client side of every named remote variable
//! (channel) a program uses: it binds channels to per-server virtual
//! circuits, issues reads, writes and subscriptions, routes every response
//! and error to the callback that owns it, tracks server beacons and batches
//! IO into sync groups.
//!
//! Sockets, name resolution and timers stay outside: the engine talks to a
//! [`Transport`], a [`NameResolver`] and a [`TimerQueue`] supplied by the
//! caller, and is fed back through [`Context::circuit_connected`],
//! [`Context::deliver`], [`Context::circuit_failed`] and
//! [`Context::search_response`].
//!
//! ## Key Types
//!
//! - [`Context`] - the public operation surface
//! - [`ContextNotify`], [`ChannelNotify`], [`ReadNotify`], [`WriteNotify`],
//!   [`StateNotify`] - callback contracts
//! - [`ContextConfig`] - layered configuration
//! - [`Status`] - typed operation outcome with its wire encoding

mod beacon;
mod channel;
mod circuit;
mod config;
mod constants;
mod context;
mod errors;
mod io;
mod notify;
mod pool;
mod proto;
mod sync_group;
mod table;
mod timer;
mod transport;
mod types;

pub use beacon::*;
pub use channel::*;
pub use circuit::*;
pub use config::*;
pub use constants::*;
pub use context::*;
pub use errors::*;
pub use io::*;
pub use notify::*;
pub use pool::*;
pub use proto::*;
pub use sync_group::*;
pub use table::*;
pub use timer::*;
pub use transport::*;
pub use types::*;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
