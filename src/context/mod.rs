//! The client context: owner of every channel, IO operation, circuit and
//! sync group, and the only entry point for callers, delivery threads and
//! timers.
//!
//! ## Locking
//! All tables sit behind one state mutex. User callbacks run under a
//! separate reentrant callback lock with the state mutex released, so a
//! callback may issue new requests, but two callbacks of one context never
//! overlap. See [`lock`] for how the order between the two is enforced.
//!
//! ## Recycling
//! Every object lives in a pool slot reached through an id table. An object
//! leaves its table before any callback about its end is made; a response
//! racing with a local cancel therefore misses and is dropped.

mod circuits;
mod dispatch;
mod exception;
mod lock;
mod multiply_defined;
mod requests;
mod sync_groups;

#[cfg(test)]
mod lock_test;
#[cfg(test)]
mod sync_groups_test;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Weak;
use std::time::Duration;
use std::time::Instant;

use parking_lot::Condvar;
use parking_lot::Mutex;
use parking_lot::ReentrantMutex;
use tracing::debug;
use tracing::info;
use tracing::trace;

use crate::highest_priority_level_below;
use crate::lowest_priority_level_above;
use crate::proto::encode_clear_channel;
use crate::BeaconEvent;
use crate::BeaconTracker;
use crate::BufferPool;
use crate::Channel;
use crate::ChannelId;
use crate::ChannelInfo;
use crate::ChannelNotify;
use crate::CircuitId;
use crate::ContextConfig;
use crate::ContextNotify;
use crate::Error;
use crate::IdTable;
use crate::IoTables;
use crate::NameResolver;
use crate::Result;
use crate::ServerId;
use crate::Status;
use crate::SyncGroup;
use crate::TimerHandle;
use crate::TimerQueue;
use crate::Transport;
use crate::VirtualCircuit;
use crate::EXTENDED_HEADER_SIZE;
use crate::PRIORITY_MAX;

use lock::StateGuard;

/// User code deferred until the state lock can be released
type Callback = Box<dyn FnOnce()>;

/// Handle to a client context. Clones share one context.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

pub(crate) struct ContextInner {
    state: Mutex<ContextState>,
    callback_lock: ReentrantMutex<()>,
    /// Signalled, with the state lock held, whenever a sync group drains
    group_done: Condvar,
    notify: Arc<dyn ContextNotify>,
    transport: Arc<dyn Transport>,
    resolver: Arc<dyn NameResolver>,
    timers: Arc<dyn TimerQueue>,
    config: ContextConfig,
    buffers: BufferPool,
    this: Weak<ContextInner>,
}

pub(crate) struct ContextState {
    channels: IdTable<Channel>,
    ios: IoTables,
    circuits: IdTable<VirtualCircuit>,
    servers: HashMap<ServerId, CircuitId>,
    beacons: BeaconTracker,
    groups: IdTable<SyncGroup>,
}

impl ContextState {
    fn new(config: &ContextConfig) -> Self {
        let pools = &config.pools;
        Self {
            channels: IdTable::with_chunk(pools.channel_chunk),
            ios: IoTables::with_chunk(pools.io_chunk),
            circuits: IdTable::with_chunk(pools.circuit_chunk),
            servers: HashMap::new(),
            beacons: BeaconTracker::new(),
            groups: IdTable::with_chunk(pools.group_chunk),
        }
    }
}

impl Context {
    /// Build a context around its collaborators.
    ///
    /// # Errors
    /// `Error::Config` when `config` fails validation
    pub fn new(
        config: ContextConfig,
        notify: Arc<dyn ContextNotify>,
        transport: Arc<dyn Transport>,
        resolver: Arc<dyn NameResolver>,
        timers: Arc<dyn TimerQueue>,
    ) -> Result<Self> {
        config.validate()?;

        let buffers = BufferPool::new(
            config.pools.small_buffer_size,
            config.max_array_bytes + EXTENDED_HEADER_SIZE,
            config.pools.buffer_cache,
        );
        let inner = Arc::new_cyclic(|this| ContextInner {
            state: Mutex::new(ContextState::new(&config)),
            callback_lock: ReentrantMutex::new(()),
            group_done: Condvar::new(),
            notify,
            transport,
            resolver,
            timers,
            config,
            buffers,
            this: this.clone(),
        });
        info!("client context created");
        Ok(Self { inner })
    }

    pub fn config(&self) -> &ContextConfig {
        &self.inner.config
    }

    /// Register a channel and start looking for its server. Never blocks
    /// on the network.
    pub fn create_channel(
        &self,
        name: &str,
        notify: Arc<dyn ChannelNotify>,
        priority: u8,
    ) -> Result<ChannelId> {
        if name.is_empty() {
            return Err(Error::EmptyChannelName);
        }
        if priority > PRIORITY_MAX {
            return Err(Error::BadPriority(priority));
        }

        let mut state = self.inner.lock_state_only();
        let owned = name.to_string();
        let cid = ChannelId(
            state
                .channels
                .insert_with(|id| Channel::new(ChannelId(id), owned, priority, notify)),
        );
        self.inner.resolver.search(cid, name);
        debug!(%cid, name, priority, "channel created");
        Ok(cid)
    }

    /// Cancel every operation of the channel, tell the server when connected
    /// and forget the channel.
    ///
    /// No callback for the channel or its operations runs after this
    /// returns.
    ///
    /// # Errors
    /// `Error::BadChannel` for an id that is not registered, including a
    /// second destroy of the same channel
    pub fn destroy_channel(
        &self,
        cid: ChannelId,
    ) -> Result<()> {
        let callbacks = self.inner.callback_guard();
        let mut state = self.inner.lock_state(&callbacks);
        self.inner.destroy_channel(&mut state, cid)
    }

    pub fn channel_info(
        &self,
        cid: ChannelId,
    ) -> Result<ChannelInfo> {
        let state = self.inner.lock_state_only();
        state
            .channels
            .get(cid.0)
            .map(Channel::info)
            .ok_or(Error::BadChannel(cid.0))
    }

    pub fn channel_count(&self) -> usize {
        self.inner.lock_state_only().channels.len()
    }

    /// IO operations currently registered, across all kinds
    pub fn outstanding_io(&self) -> usize {
        self.inner.lock_state_only().ios.len()
    }

    pub fn circuit_count(&self) -> usize {
        self.inner.lock_state_only().circuits.len()
    }

    /// Record a server beacon and react to gaps in its sequence.
    pub fn beacon_notify(
        &self,
        address: SocketAddr,
        time: Instant,
        beacon_number: u32,
        protocol_revision: u16,
    ) {
        let callbacks = self.inner.callback_guard();
        let mut state = self.inner.lock_state(&callbacks);

        let event = state.beacons.observe(address, time, beacon_number, protocol_revision);
        if event == BeaconEvent::Anomaly {
            info!(%address, beacon_number, "beacon anomaly, retrying searches");
            self.inner.resolver.beacon_anomaly(address);
        }
        self.inner.probe_unresponsive(&mut state, address);
    }

    pub fn beacon_anomalies_since_program_start(&self) -> u64 {
        self.inner.lock_state_only().beacons.anomalies()
    }

    /// Estimated beacon period of the server a channel is bound to. `None`
    /// while the channel is unbound.
    pub fn beacon_period(
        &self,
        cid: ChannelId,
    ) -> Result<Option<Duration>> {
        let state = self.inner.lock_state_only();
        let channel = state.channels.get(cid.0).ok_or(Error::BadChannel(cid.0))?;
        let assumed = self.inner.config.beacon_period();
        Ok(channel
            .server()
            .map(|addr| state.beacons.period(&addr).unwrap_or(assumed)))
    }

    pub fn lowest_priority_level_above(
        &self,
        priority: u8,
    ) -> u8 {
        lowest_priority_level_above(priority)
    }

    pub fn highest_priority_level_below(
        &self,
        priority: u8,
    ) -> u8 {
        highest_priority_level_below(priority)
    }

    /// Route an error to the context's notification target.
    pub fn exception(
        &self,
        status: Status,
        context: &str,
        file: &str,
        line: u32,
    ) {
        let _callbacks = self.inner.callback_guard();
        self.inner.notify.exception(status, context, file, line);
    }

    /// Log a summary of the context; higher levels add per-circuit and
    /// per-channel detail.
    pub fn show(
        &self,
        level: u32,
    ) {
        let state = self.inner.lock_state_only();
        info!(
            channels = state.channels.len(),
            circuits = state.circuits.len(),
            io = state.ios.len(),
            sync_groups = state.groups.len(),
            beacon_servers = state.beacons.len(),
            beacon_anomalies = state.beacons.anomalies(),
            "client context"
        );
        if level >= 1 {
            for circuit in state.circuits.values() {
                info!(?circuit, "circuit");
            }
        }
        if level >= 2 {
            for channel in state.channels.values() {
                info!(info = ?channel.info(), "channel");
            }
        }
    }
}

impl ContextInner {
    fn destroy_channel(
        &self,
        state: &mut StateGuard<'_>,
        cid: ChannelId,
    ) -> Result<()> {
        let st = &mut **state;
        let Some(mut channel) = st.channels.remove(cid.0) else {
            return Err(Error::BadChannel(cid.0));
        };

        for op in channel.uninstall_all_io(&mut st.ios) {
            if let Some(group) = op.group() {
                self.cancel_group_member(st, group, op.io_ref().id);
            }
        }

        match channel.circuit() {
            Some(circuit_id) => {
                if let Some(circuit) = st.circuits.get_mut(circuit_id.0) {
                    circuit.unbind_channel(cid);
                    if let Some(sid) = channel.sid() {
                        encode_clear_channel(circuit.outbound(), sid, cid.0);
                    }
                }
                self.auto_flush(state, circuit_id);
            }
            None => self.resolver.cancel(cid),
        }
        debug!(%cid, name = channel.name(), "channel destroyed");
        Ok(())
    }

    /// Schedule `f` on the timer queue. It runs only while the context is
    /// still alive.
    fn schedule(
        &self,
        delay: Duration,
        f: impl FnOnce(&ContextInner) + Send + 'static,
    ) -> TimerHandle {
        let this = self.this.clone();
        self.timers.schedule(
            delay,
            Box::new(move || {
                if let Some(inner) = this.upgrade() {
                    f(&inner);
                }
            }),
        )
    }

    /// Route an exception to the notification target from under the state
    /// lock.
    fn raise(
        &self,
        state: &mut StateGuard<'_>,
        status: Status,
        context: &str,
        file: &str,
        line: u32,
    ) {
        let notify = self.notify.clone();
        state.unlocked(|| notify.exception(status, context, file, line));
    }

    /// Largest payload accepted on a circuit
    fn payload_limit(&self) -> usize {
        self.config.max_array_bytes
    }
}

/// Run deferred user code with the state lock released, one callback at a
/// time. A callback whose channel was destroyed by an earlier one in the
/// batch is dropped.
fn run_callbacks(
    state: &mut StateGuard<'_>,
    callbacks: Vec<(ChannelId, Callback)>,
) {
    for (cid, callback) in callbacks {
        if !state.channels.contains(cid.0) {
            trace!(%cid, "callback for destroyed channel dropped");
            continue;
        }
        state.unlocked(callback);
    }
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        let Self {
            state,
            buffers,
            transport,
            ..
        } = self;
        let state = state.get_mut();
        for id in state.circuits.ids() {
            if let Some(circuit) = state.circuits.get_mut(id) {
                circuit.shutdown(buffers);
                transport.disconnect(CircuitId(id));
            }
        }
        debug!("client context released");
    }
}
