//! DV-Hop Distance Table
//!
//! Each node keeps one table mapping beacon addresses to the best hop count
//! it has seen, the beacon's position, and when the entry was last
//! refreshed.
//!
//! # Update rules
//!
//! - A report for an unknown beacon inserts an entry.
//! - A report that improves the hop count overwrites hop count and
//!   timestamp but keeps the position from the first report: beacon
//!   positions are static and authoritative on first sight.
//! - Any other report only refreshes the timestamp ([`DistanceTable::touch`]).
//! - Entries older than the staleness window (1500 ms by default) are
//!   evicted by [`DistanceTable::trim_expired`].
//!
//! Queries for unknown beacons return sentinels (`0` hops, `(-1, -1)`,
//! [`Timestamp::MAX`]); [`DistanceTable::get`] gives an explicit `Option`.

mod record;
mod table;

pub use record::{BeaconId, BeaconRecord, Timestamp};
pub use table::{DistanceTable, Eviction, DEFAULT_EXPIRY};
