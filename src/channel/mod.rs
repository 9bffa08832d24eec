//! Client side of one named remote variable.
//!
//! A channel is created `Searching`, becomes `Pending` once a search reply
//! binds it to a circuit, and `Connected` when the server answers the create
//! request. Losing the circuit sends it back to `Searching` without
//! destroying it; only the context destroys channels.

use std::collections::BTreeSet;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::AccessRights;
use crate::ChannelId;
use crate::ChannelNotify;
use crate::CircuitId;
use crate::DbrType;
use crate::Error;
use crate::EventMask;
use crate::IoId;
use crate::IoOperation;
use crate::RecycleIo;
use crate::Result;
use crate::CA_MINOR_DYNAMIC_COUNT;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Waiting for the name resolver
    Searching,
    /// Bound to a circuit, create request in flight
    Pending,
    Connected,
}

/// Point-in-time copy of a channel's public attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub name: String,
    pub priority: u8,
    pub state: ChannelState,
    pub server: Option<SocketAddr>,
    pub native_type: Option<DbrType>,
    pub native_count: u32,
    pub access_rights: AccessRights,
    pub outstanding_io: usize,
}

/// Server-side attributes learned when a create request succeeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Binding {
    sid: u32,
    native_type: DbrType,
    native_count: u32,
}

pub struct Channel {
    id: ChannelId,
    name: String,
    priority: u8,
    notify: Arc<dyn ChannelNotify>,
    state: ChannelState,
    circuit: Option<CircuitId>,
    server: Option<SocketAddr>,
    binding: Option<Binding>,
    rights: AccessRights,
    ios: BTreeSet<IoId>,
    rejected: Vec<SocketAddr>,
}

impl Channel {
    pub fn new(
        id: ChannelId,
        name: String,
        priority: u8,
        notify: Arc<dyn ChannelNotify>,
    ) -> Self {
        Self {
            id,
            name,
            priority,
            notify,
            state: ChannelState::Searching,
            circuit: None,
            server: None,
            binding: None,
            rights: AccessRights::NONE,
            ios: BTreeSet::new(),
            rejected: Vec::new(),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn notify(&self) -> Arc<dyn ChannelNotify> {
        self.notify.clone()
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ChannelState::Connected
    }

    pub fn circuit(&self) -> Option<CircuitId> {
        self.circuit
    }

    pub fn server(&self) -> Option<SocketAddr> {
        self.server
    }

    /// Server-assigned id, present only while connected
    pub fn sid(&self) -> Option<u32> {
        self.binding.map(|b| b.sid)
    }

    pub fn native_count(&self) -> u32 {
        self.binding.map(|b| b.native_count).unwrap_or(0)
    }

    pub fn access_rights(&self) -> AccessRights {
        self.rights
    }

    /// Addresses of servers that also answered for this name
    pub fn rejected_servers(&self) -> &[SocketAddr] {
        &self.rejected
    }

    /// Bind to the circuit chosen by a search reply.
    pub fn bind(
        &mut self,
        circuit: CircuitId,
        server: SocketAddr,
    ) {
        self.state = ChannelState::Pending;
        self.circuit = Some(circuit);
        self.server = Some(server);
        self.binding = None;
    }

    /// Server accepted the create request.
    pub fn connect(
        &mut self,
        sid: u32,
        native_type: DbrType,
        native_count: u32,
    ) {
        self.state = ChannelState::Connected;
        self.binding = Some(Binding {
            sid,
            native_type,
            native_count,
        });
    }

    pub fn set_access_rights(
        &mut self,
        rights: AccessRights,
    ) {
        self.rights = rights;
    }

    /// Return to name resolution. Yields the circuit the channel was bound
    /// to, if any.
    pub fn unbind(&mut self) -> Option<CircuitId> {
        self.state = ChannelState::Searching;
        self.binding = None;
        self.rights = AccessRights::NONE;
        self.server = None;
        self.circuit.take()
    }

    /// Remember a second server claiming this name. Returns false when the
    /// address was already recorded.
    pub fn record_rejected(
        &mut self,
        address: SocketAddr,
    ) -> bool {
        if self.rejected.contains(&address) {
            return false;
        }
        self.rejected.push(address);
        true
    }

    pub fn attach_io(
        &mut self,
        id: IoId,
    ) {
        self.ios.insert(id);
    }

    pub fn detach_io(
        &mut self,
        id: IoId,
    ) -> bool {
        self.ios.remove(&id)
    }

    pub fn io_ids(&self) -> impl Iterator<Item = IoId> + '_ {
        self.ios.iter().copied()
    }

    pub fn io_count(&self) -> usize {
        self.ios.len()
    }

    /// Unregister every outstanding operation of this channel, oldest first.
    ///
    /// Ids no longer present in the tables are dropped silently.
    pub fn uninstall_all_io(
        &mut self,
        tables: &mut dyn RecycleIo,
    ) -> Vec<IoOperation> {
        let ids = std::mem::take(&mut self.ios);
        ids.into_iter().filter_map(|id| tables.recycle_id(id)).collect()
    }

    fn connected_binding(&self) -> Result<Binding> {
        match (self.state, self.binding) {
            (ChannelState::Connected, Some(binding)) => Ok(binding),
            _ => Err(Error::ChannelNotConnected(self.id.0)),
        }
    }

    /// Check a read or subscription request and resolve its element count.
    ///
    /// A count of 0 asks for the server's current count when the circuit
    /// supports it, and for the native count otherwise.
    pub fn check_read(
        &self,
        data_type: DbrType,
        count: u32,
        minor_version: u16,
    ) -> Result<u32> {
        let binding = self.connected_binding()?;
        if !data_type.is_valid() {
            return Err(Error::BadType(data_type.0));
        }
        if count > binding.native_count {
            return Err(Error::TypeMismatch {
                requested: count,
                native: binding.native_count,
            });
        }
        if !self.rights.read_permit() {
            return Err(Error::NoReadAccess(self.id.0));
        }
        if count == 0 && minor_version < CA_MINOR_DYNAMIC_COUNT {
            return Ok(binding.native_count);
        }
        Ok(count)
    }

    pub fn check_subscription(
        &self,
        data_type: DbrType,
        count: u32,
        mask: EventMask,
        minor_version: u16,
    ) -> Result<u32> {
        if mask.is_empty() {
            return Err(Error::BadMask);
        }
        self.check_read(data_type, count, minor_version)
    }

    /// Check a write request against the serialized value.
    pub fn check_write(
        &self,
        data_type: DbrType,
        count: u32,
        value: &[u8],
    ) -> Result<()> {
        let binding = self.connected_binding()?;
        let Some(element_size) = data_type.element_size() else {
            return Err(Error::BadType(data_type.0));
        };
        if count == 0 || count > binding.native_count {
            return Err(Error::TypeMismatch {
                requested: count,
                native: binding.native_count,
            });
        }
        if !self.rights.write_permit() {
            return Err(Error::NoWriteAccess(self.id.0));
        }
        let expected = element_size * count as usize;
        if value.len() != expected {
            return Err(Error::BadValueLength {
                expected,
                actual: value.len(),
            });
        }
        Ok(())
    }

    pub fn info(&self) -> ChannelInfo {
        ChannelInfo {
            id: self.id,
            name: self.name.clone(),
            priority: self.priority,
            state: self.state,
            server: self.server,
            native_type: self.binding.map(|b| b.native_type),
            native_count: self.native_count(),
            access_rights: self.rights,
            outstanding_io: self.ios.len(),
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("circuit", &self.circuit)
            .field("ios", &self.ios.len())
            .finish()
    }
}
