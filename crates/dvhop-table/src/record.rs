//! Distance table entry types.

use std::net::Ipv4Addr;
use std::ops::Add;
use std::time::Duration;

use dvhop_geometry::Point2;

/// Network address of a beacon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BeaconId(pub Ipv4Addr);

impl BeaconId {
    /// Create from an IPv4 address.
    pub const fn new(addr: Ipv4Addr) -> Self {
        Self(addr)
    }

    /// The underlying address.
    pub const fn addr(&self) -> Ipv4Addr {
        self.0
    }

    /// Address as a host-order integer (wire representation).
    pub fn to_bits(&self) -> u32 {
        u32::from(self.0)
    }

    /// Build from a host-order integer.
    pub fn from_bits(bits: u32) -> Self {
        Self(Ipv4Addr::from(bits))
    }
}

impl From<Ipv4Addr> for BeaconId {
    fn from(addr: Ipv4Addr) -> Self {
        Self(addr)
    }
}

impl std::fmt::Display for BeaconId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Point in (simulated or wall-clock) time, millisecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timestamp(u64);

impl Timestamp {
    /// Start of time.
    pub const ZERO: Self = Self(0);

    /// Latest representable time; returned for entries that do not exist.
    pub const MAX: Self = Self(u64::MAX);

    /// Create from milliseconds.
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Milliseconds since the start of time.
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Time elapsed since `earlier`, zero if `earlier` is in the future.
    pub fn saturating_since(&self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Timestamp {
    type Output = Self;

    fn add(self, d: Duration) -> Self {
        let ms = u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(ms))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "+{}ms", self.0)
    }
}

/// What a node knows about one beacon.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BeaconRecord {
    /// Best known hop count to the beacon.
    pub hops: u16,
    /// Beacon position as first reported.
    pub position: Point2,
    /// When the entry was last refreshed.
    pub last_update: Timestamp,
}

impl BeaconRecord {
    /// Create a new record.
    pub const fn new(hops: u16, position: Point2, last_update: Timestamp) -> Self {
        Self {
            hops,
            position,
            last_update,
        }
    }

    /// Check whether the record is older than `threshold` at `now`.
    pub fn is_expired(&self, now: Timestamp, threshold: Duration) -> bool {
        now.saturating_since(self.last_update) > threshold
    }
}

impl std::fmt::Display for BeaconRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\t{}\t{}", self.hops, self.position, self.last_update)
    }
}
