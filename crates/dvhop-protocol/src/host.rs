//! Capabilities a DV-Hop node needs from its host.
//!
//! A node never touches sockets, timers or global state directly. The host
//! (a simulator, or a runtime bound to real interfaces) provides:
//!
//! - a [`Clock`] and a [`RandomSource`], injected once at construction;
//! - a [`Scheduler`], [`BroadcastChannel`] and [`StatsSink`], passed into
//!   every event handler as one [`Host`].
//!
//! Timers are plain values ([`NodeTimer`]). When one comes due the host
//! hands it back through [`DvHopNode::on_timer`](crate::DvHopNode::on_timer).

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use dvhop_table::Timestamp;
use rand::{Rng, RngCore};

use crate::interface::InterfaceIndex;
use crate::stats::StatsRecord;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time measured from when the clock was created.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    /// Start a clock at zero.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        let ms = u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX);
        Timestamp::from_millis(ms)
    }
}

/// Clock advanced explicitly by the host (simulated time).
///
/// Clones share the same underlying time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    millis: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the current time.
    pub fn set(&self, now: Timestamp) {
        self.millis.store(now.as_millis(), Ordering::SeqCst);
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let now = self.now() + by;
        self.set(now);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

/// Uniform integer draws, used for send jitter.
pub trait RandomSource {
    /// Uniform draw from `low..=high`. Returns `low` if the range is empty.
    fn uniform_inclusive(&mut self, low: u32, high: u32) -> u32;
}

impl<R: RngCore> RandomSource for R {
    fn uniform_inclusive(&mut self, low: u32, high: u32) -> u32 {
        if high <= low {
            return low;
        }
        self.gen_range(low..=high)
    }
}

/// Opaque handle to a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(pub u64);

/// A control packet ready for the broadcast channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Datagram {
    /// Interface to send on.
    pub interface: InterfaceIndex,
    /// Source address (the interface's local address).
    pub source: Ipv4Addr,
    /// Broadcast destination.
    pub destination: Ipv4Addr,
    /// Destination UDP port.
    pub port: u16,
    /// IP time-to-live.
    pub ttl: u8,
    /// Encoded flooding message.
    pub payload: Bytes,
}

/// Timers a node asks its host to run.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeTimer {
    /// The periodic hello (flooding) timer.
    Hello,
    /// A jittered, deferred send of one control packet.
    Send(Datagram),
}

/// Deferred execution of node timers.
pub trait Scheduler {
    /// Run `timer` after `delay`.
    fn schedule(&mut self, delay: Duration, timer: NodeTimer) -> TimerHandle;

    /// Cancel a pending timer. Cancelling a fired or unknown handle is a no-op.
    fn cancel(&mut self, handle: TimerHandle);
}

/// Best-effort local broadcast delivery.
pub trait BroadcastChannel {
    /// Fire-and-forget send.
    fn send(&mut self, datagram: Datagram);
}

/// Consumer of the observability stream.
pub trait StatsSink {
    /// Record one statistics line.
    fn emit(&mut self, record: StatsRecord);
}

impl StatsSink for Vec<StatsRecord> {
    fn emit(&mut self, record: StatsRecord) {
        self.push(record);
    }
}

/// Everything a node needs while handling one event.
pub trait Host: Scheduler + BroadcastChannel + StatsSink {}

impl<T: Scheduler + BroadcastChannel + StatsSink> Host for T {}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory host that records everything a node does.

    use super::*;

    #[derive(Debug, Default)]
    pub(crate) struct RecordingHost {
        next_handle: u64,
        pub scheduled: Vec<(TimerHandle, Duration, NodeTimer)>,
        pub cancelled: Vec<TimerHandle>,
        pub sent: Vec<Datagram>,
        pub stats: Vec<StatsRecord>,
    }

    impl RecordingHost {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// Remove and return every scheduled, not cancelled timer.
        pub(crate) fn drain_timers(&mut self) -> Vec<(TimerHandle, Duration, NodeTimer)> {
            let cancelled = std::mem::take(&mut self.cancelled);
            std::mem::take(&mut self.scheduled)
                .into_iter()
                .filter(|(h, _, _)| !cancelled.contains(h))
                .collect()
        }

        pub(crate) fn pending_sends(&self) -> usize {
            self.scheduled
                .iter()
                .filter(|(h, _, t)| matches!(t, NodeTimer::Send(_)) && !self.cancelled.contains(h))
                .count()
        }
    }

    impl Scheduler for RecordingHost {
        fn schedule(&mut self, delay: Duration, timer: NodeTimer) -> TimerHandle {
            let handle = TimerHandle(self.next_handle);
            self.next_handle += 1;
            self.scheduled.push((handle, delay, timer));
            handle
        }

        fn cancel(&mut self, handle: TimerHandle) {
            self.cancelled.push(handle);
        }
    }

    impl BroadcastChannel for RecordingHost {
        fn send(&mut self, datagram: Datagram) {
            self.sent.push(datagram);
        }
    }

    impl StatsSink for RecordingHost {
        fn emit(&mut self, record: StatsRecord) {
            self.stats.push(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn manual_clock_is_shared() {
        let clock = ManualClock::new();
        let view = clock.clone();

        clock.set(Timestamp::from_millis(250));
        clock.advance(Duration::from_millis(50));

        assert_eq!(view.now(), Timestamp::from_millis(300));
    }

    #[test]
    fn seeded_jitter_is_deterministic_and_bounded() {
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);

        for _ in 0..100 {
            let x = a.uniform_inclusive(0, 10);
            assert!(x <= 10);
            assert_eq!(x, b.uniform_inclusive(0, 10));
        }
    }

    #[test]
    fn empty_range_returns_low() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(rng.uniform_inclusive(0, 0), 0);
        assert_eq!(rng.uniform_inclusive(5, 3), 5);
    }

    #[test]
    fn monotonic_clock_starts_near_zero() {
        let clock = MonotonicClock::new();
        assert!(clock.now().as_millis() < 1_000);
    }
}
