use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use bytes::BytesMut;
use parking_lot::Mutex;

use crate::take_message;
use crate::ChannelId;
use crate::CircuitId;
use crate::Message;
use crate::NameResolver;
use crate::ServerId;
use crate::TimerCallback;
use crate::TimerHandle;
use crate::TimerQueue;
use crate::Transport;
use crate::TransportError;

/// Transport that records every call and never touches the network.
#[derive(Debug, Default)]
pub struct FakeTransport {
    connects: Mutex<Vec<(CircuitId, ServerId)>>,
    sent: Mutex<Vec<(CircuitId, Bytes)>>,
    disconnects: Mutex<Vec<CircuitId>>,
    fail_connect: AtomicBool,
    fail_send: AtomicBool,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn connects(&self) -> Vec<(CircuitId, ServerId)> {
        self.connects.lock().clone()
    }

    pub fn disconnects(&self) -> Vec<CircuitId> {
        self.disconnects.lock().clone()
    }

    /// Most recent circuit opened to `address`
    pub fn circuit_for(
        &self,
        address: SocketAddr,
    ) -> Option<CircuitId> {
        self.connects
            .lock()
            .iter()
            .rev()
            .find(|(_, server)| server.address == address)
            .map(|(id, _)| *id)
    }

    /// Every message sent on `circuit` so far, decoded
    pub fn sent_messages(
        &self,
        circuit: CircuitId,
    ) -> Vec<Message> {
        let mut stream = BytesMut::new();
        for (id, bytes) in self.sent.lock().iter() {
            if *id == circuit {
                stream.extend_from_slice(bytes);
            }
        }
        let mut messages = Vec::new();
        while let Ok(Some(msg)) = take_message(&mut stream, usize::MAX) {
            messages.push(msg);
        }
        messages
    }

    /// Command codes sent on `circuit`, in order
    pub fn sent_commands(
        &self,
        circuit: CircuitId,
    ) -> Vec<u16> {
        self.sent_messages(circuit).iter().map(|m| m.header.command).collect()
    }

    /// Circuits in the order their sends arrived
    pub fn sent_circuits(&self) -> Vec<CircuitId> {
        self.sent.lock().iter().map(|(id, _)| *id).collect()
    }

    pub fn send_count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn set_fail_connect(
        &self,
        fail: bool,
    ) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_send(
        &self,
        fail: bool,
    ) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }
}

impl Transport for FakeTransport {
    fn connect(
        &self,
        circuit: CircuitId,
        server: ServerId,
    ) -> Result<(), TransportError> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectFailed {
                server: server.to_string(),
                reason: "refused".into(),
            });
        }
        self.connects.lock().push((circuit, server));
        Ok(())
    }

    fn send(
        &self,
        circuit: CircuitId,
        bytes: Bytes,
    ) -> Result<(), TransportError> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed {
                circuit: circuit.0,
                reason: "broken pipe".into(),
            });
        }
        self.sent.lock().push((circuit, bytes));
        Ok(())
    }

    fn disconnect(
        &self,
        circuit: CircuitId,
    ) {
        self.disconnects.lock().push(circuit);
    }
}

#[derive(Debug, Default)]
pub struct FakeResolver {
    searches: Mutex<Vec<(ChannelId, String)>>,
    cancels: Mutex<Vec<ChannelId>>,
    anomalies: Mutex<Vec<SocketAddr>>,
}

impl FakeResolver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn searches(&self) -> Vec<(ChannelId, String)> {
        self.searches.lock().clone()
    }

    pub fn searches_for(
        &self,
        channel: ChannelId,
    ) -> usize {
        self.searches.lock().iter().filter(|(id, _)| *id == channel).count()
    }

    pub fn cancels(&self) -> Vec<ChannelId> {
        self.cancels.lock().clone()
    }

    pub fn anomalies(&self) -> Vec<SocketAddr> {
        self.anomalies.lock().clone()
    }
}

impl NameResolver for FakeResolver {
    fn search(
        &self,
        channel: ChannelId,
        name: &str,
    ) {
        self.searches.lock().push((channel, name.to_string()));
    }

    fn cancel(
        &self,
        channel: ChannelId,
    ) {
        self.cancels.lock().push(channel);
    }

    fn beacon_anomaly(
        &self,
        address: SocketAddr,
    ) {
        self.anomalies.lock().push(address);
    }
}

struct PendingTimer {
    delay: Duration,
    handle: TimerHandle,
    callback: TimerCallback,
}

/// Timer queue that only fires when told to.
#[derive(Default)]
pub struct ManualTimerQueue {
    pending: Mutex<Vec<PendingTimer>>,
}

impl ManualTimerQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Timers scheduled and not cancelled
    pub fn pending(&self) -> usize {
        self.pending.lock().iter().filter(|t| !t.handle.is_cancelled()).count()
    }

    /// Delays of the live timers, in scheduling order
    pub fn delays(&self) -> Vec<Duration> {
        self.pending
            .lock()
            .iter()
            .filter(|t| !t.handle.is_cancelled())
            .map(|t| t.delay)
            .collect()
    }

    /// Fire every live timer scheduled so far. Timers scheduled by the
    /// callbacks wait for the next call. Returns how many fired.
    pub fn fire_all(&self) -> usize {
        let due = std::mem::take(&mut *self.pending.lock());
        let mut fired = 0;
        for timer in due {
            if !timer.handle.is_cancelled() {
                (timer.callback)();
                fired += 1;
            }
        }
        fired
    }
}

impl TimerQueue for ManualTimerQueue {
    fn schedule(
        &self,
        delay: Duration,
        callback: TimerCallback,
    ) -> TimerHandle {
        let handle = TimerHandle::default();
        self.pending.lock().push(PendingTimer {
            delay,
            handle: handle.clone(),
            callback,
        });
        handle
    }
}
