//! Server beacon bookkeeping.
//!
//! Every server periodically broadcasts a numbered beacon. Consecutive
//! numbers mean the server stayed up; a jump means beacons were lost or the
//! server restarted, which is the cue to retry outstanding searches. The
//! same beacon relayed over two network routes shows up as a repeat: it is
//! never counted, but the sequence continues from it.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use std::time::Instant;

use tracing::debug;
use tracing::trace;

use crate::constants::BEACON_DUPLICATE_WINDOW;
use crate::constants::BEACON_PERIOD_WEIGHT;


/// Classification of one observed beacon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeaconEvent {
    /// First beacon ever seen from the address
    First,
    /// Immediate successor of the previous beacon
    Normal,
    /// Repeat of, or slightly behind, the previous beacon
    Duplicate,
    /// Beacons were skipped or the sequence restarted
    Anomaly,
}

#[derive(Debug, Clone)]
pub struct BeaconRecord {
    last_number: u32,
    last_seen: Instant,
    period: Option<Duration>,
    anomalies: u32,
    protocol_revision: u16,
}

impl BeaconRecord {
    fn new(
        number: u32,
        time: Instant,
        protocol_revision: u16,
    ) -> Self {
        Self {
            last_number: number,
            last_seen: time,
            period: None,
            anomalies: 0,
            protocol_revision,
        }
    }

    pub fn last_number(&self) -> u32 {
        self.last_number
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    /// Moving estimate of the interval between beacons
    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    pub fn anomalies(&self) -> u32 {
        self.anomalies
    }

    pub fn protocol_revision(&self) -> u16 {
        self.protocol_revision
    }

    fn update_period(
        &mut self,
        time: Instant,
    ) {
        let sample = time.saturating_duration_since(self.last_seen).as_secs_f64();
        let estimate = match self.period {
            Some(avg) => BEACON_PERIOD_WEIGHT * sample + (1.0 - BEACON_PERIOD_WEIGHT) * avg.as_secs_f64(),
            None => sample,
        };
        self.period = Some(Duration::from_secs_f64(estimate));
    }
}

/// Beacon records keyed by server address. Records are never removed.
#[derive(Debug, Default)]
pub struct BeaconTracker {
    records: HashMap<SocketAddr, BeaconRecord>,
    anomalies: u64,
}

impl BeaconTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(
        &mut self,
        address: SocketAddr,
        time: Instant,
        number: u32,
        protocol_revision: u16,
    ) -> BeaconEvent {
        let Some(record) = self.records.get_mut(&address) else {
            self.records
                .insert(address, BeaconRecord::new(number, time, protocol_revision));
            debug!(%address, number, "first beacon from server");
            return BeaconEvent::First;
        };

        let advance = number.wrapping_sub(record.last_number);
        if advance == 0 || advance > u32::MAX - BEACON_DUPLICATE_WINDOW {
            trace!(%address, number, last = record.last_number, "duplicate beacon");
            // the sequence continues from the number just seen
            record.last_number = number;
            record.last_seen = time;
            return BeaconEvent::Duplicate;
        }

        let event = if advance == 1 {
            record.update_period(time);
            BeaconEvent::Normal
        } else {
            record.anomalies += 1;
            self.anomalies += 1;
            debug!(%address, number, last = record.last_number, "beacon anomaly");
            BeaconEvent::Anomaly
        };
        record.last_number = number;
        record.last_seen = time;
        record.protocol_revision = protocol_revision;
        event
    }

    pub fn record(
        &self,
        address: &SocketAddr,
    ) -> Option<&BeaconRecord> {
        self.records.get(address)
    }

    pub fn period(
        &self,
        address: &SocketAddr,
    ) -> Option<Duration> {
        self.records.get(address).and_then(BeaconRecord::period)
    }

    /// Anomalies across every server since the tracker was created
    pub fn anomalies(&self) -> u64 {
        self.anomalies
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
