//! Distance table state.

use std::collections::BTreeMap;
use std::time::Duration;

use dvhop_geometry::Point2;
use tracing::debug;

use crate::{BeaconId, BeaconRecord, Timestamp};

/// Entries older than this are evicted by [`DistanceTable::trim_expired`].
pub const DEFAULT_EXPIRY: Duration = Duration::from_millis(1_500);

/// An entry removed by the staleness sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Eviction {
    /// Beacon whose entry was removed.
    pub beacon: BeaconId,
    /// The record as it was at removal time.
    pub record: BeaconRecord,
}

/// Best known hop count and position per beacon.
///
/// Entries are keyed by beacon address and enumerate in ascending address
/// order. Hop counts only move down through [`add_or_refresh`]; the stored
/// position is the one carried by the first report and never changes while
/// the entry lives.
///
/// [`add_or_refresh`]: DistanceTable::add_or_refresh
#[derive(Debug, Clone)]
pub struct DistanceTable {
    entries: BTreeMap<BeaconId, BeaconRecord>,
    expiry: Duration,
}

impl Default for DistanceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DistanceTable {
    /// Sentinel hop count for unknown beacons.
    pub const UNKNOWN_HOPS: u16 = 0;

    /// Sentinel position for unknown beacons.
    pub const UNKNOWN_POSITION: Point2 = Point2::new(-1.0, -1.0);

    /// Create an empty table with the default 1500 ms expiry.
    pub fn new() -> Self {
        Self::with_expiry(DEFAULT_EXPIRY)
    }

    /// Create an empty table with a custom expiry threshold.
    pub fn with_expiry(expiry: Duration) -> Self {
        Self {
            entries: BTreeMap::new(),
            expiry,
        }
    }

    /// The staleness threshold.
    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    /// Get the record for a beacon, if tracked.
    pub fn get(&self, beacon: &BeaconId) -> Option<&BeaconRecord> {
        self.entries.get(beacon)
    }

    /// Check whether a beacon is tracked.
    pub fn contains(&self, beacon: &BeaconId) -> bool {
        self.entries.contains_key(beacon)
    }

    /// Stored hop count, or [`Self::UNKNOWN_HOPS`] if the beacon is unknown.
    ///
    /// A zero result is ambiguous; check [`contains`](Self::contains) first.
    pub fn hops_to(&self, beacon: &BeaconId) -> u16 {
        self.get(beacon).map_or(Self::UNKNOWN_HOPS, |r| r.hops)
    }

    /// Stored position, or [`Self::UNKNOWN_POSITION`] if the beacon is unknown.
    pub fn position_of(&self, beacon: &BeaconId) -> Point2 {
        self.get(beacon).map_or(Self::UNKNOWN_POSITION, |r| r.position)
    }

    /// Time of the last refresh, or [`Timestamp::MAX`] if the beacon is unknown.
    pub fn last_updated_at(&self, beacon: &BeaconId) -> Timestamp {
        self.get(beacon).map_or(Timestamp::MAX, |r| r.last_update)
    }

    /// Insert a new beacon, or overwrite hop count and timestamp of a known one.
    ///
    /// The position argument is only used on insertion; a known beacon
    /// keeps the position it was first reported with.
    pub fn add_or_refresh(&mut self, beacon: BeaconId, hops: u16, position: Point2, now: Timestamp) {
        match self.entries.get_mut(&beacon) {
            Some(existing) => {
                existing.hops = hops;
                existing.last_update = now;
            }
            None => {
                self.entries
                    .insert(beacon, BeaconRecord::new(hops, position, now));
            }
        }
    }

    /// Refresh the timestamp of a known beacon.
    /// Returns false if the beacon is not tracked.
    pub fn touch(&mut self, beacon: &BeaconId, now: Timestamp) -> bool {
        match self.entries.get_mut(beacon) {
            Some(existing) => {
                existing.last_update = now;
                true
            }
            None => false,
        }
    }

    /// Remove every entry older than the expiry threshold.
    /// Returns one [`Eviction`] per removed entry, in table order.
    pub fn trim_expired(&mut self, now: Timestamp) -> Vec<Eviction> {
        let expiry = self.expiry;
        let expired: Vec<BeaconId> = self
            .entries
            .iter()
            .filter(|(_, r)| r.is_expired(now, expiry))
            .map(|(b, _)| *b)
            .collect();

        let mut evicted = Vec::with_capacity(expired.len());
        for beacon in expired {
            if let Some(record) = self.entries.remove(&beacon) {
                debug!(
                    %beacon,
                    hops = record.hops,
                    last_update = record.last_update.as_millis(),
                    now = now.as_millis(),
                    "Expired distance table entry"
                );
                evicted.push(Eviction { beacon, record });
            }
        }
        evicted
    }

    /// Tracked beacons in enumeration order.
    pub fn known_beacons(&self) -> Vec<BeaconId> {
        self.entries.keys().copied().collect()
    }

    /// Iterate over entries in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = (&BeaconId, &BeaconRecord)> {
        self.entries.iter()
    }

    /// Number of tracked beacons.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl std::fmt::Display for DistanceTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} entries", self.entries.len())?;
        for (beacon, record) in &self.entries {
            writeln!(f, "{}\t{}", beacon, record)?;
        }
        Ok(())
    }
}
