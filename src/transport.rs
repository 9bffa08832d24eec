//! Collaborators at the network edge of the engine.
//!
//! The engine never touches sockets. It asks a [`Transport`] to open, feed
//! and drop per-server byte streams, and a [`NameResolver`] to locate the
//! server hosting a channel name. Results flow back through
//! [`Context::circuit_connected`](crate::Context::circuit_connected),
//! [`Context::deliver`](crate::Context::deliver),
//! [`Context::circuit_failed`](crate::Context::circuit_failed) and
//! [`Context::search_response`](crate::Context::search_response).
//!
//! Implementations are called with the context's internal state lock held;
//! they must hand work off and return, never call back into the context on
//! the same thread.

use std::net::SocketAddr;

use bytes::Bytes;
#[cfg(test)]
use mockall::automock;

use crate::ChannelId;
use crate::CircuitId;
use crate::ServerId;
use crate::TransportError;

#[cfg_attr(test, automock)]
pub trait Transport: Send + Sync + 'static {
    /// Start opening an ordered, reliable byte stream for `circuit`.
    fn connect(
        &self,
        circuit: CircuitId,
        server: ServerId,
    ) -> Result<(), TransportError>;

    /// Queue bytes for transmission, in order.
    fn send(
        &self,
        circuit: CircuitId,
        bytes: Bytes,
    ) -> Result<(), TransportError>;

    /// Drop the stream; nothing is reported back for this circuit afterwards.
    fn disconnect(
        &self,
        circuit: CircuitId,
    );
}

#[cfg_attr(test, automock)]
pub trait NameResolver: Send + Sync + 'static {
    /// Begin (or resume) searching for `name`.
    fn search(
        &self,
        channel: ChannelId,
        name: &str,
    );

    /// Stop searching for a channel that was bound or destroyed.
    fn cancel(
        &self,
        channel: ChannelId,
    );

    /// A server at `address` restarted or its beacons were lost; pending
    /// searches should be retried promptly.
    fn beacon_anomaly(
        &self,
        address: SocketAddr,
    );
}
