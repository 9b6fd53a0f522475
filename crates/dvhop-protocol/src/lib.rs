//! DV-Hop Protocol - Range-free localization by hop-count flooding
//!
//! This crate implements the per-node side of DV-Hop: nodes without a
//! position fix estimate one from hop-count distances to a few beacon
//! nodes whose coordinates are known.
//!
//! # Overview
//!
//! - **Flooding**: every node periodically re-broadcasts one report per
//!   beacon it knows; beacons also report themselves with hop count 0.
//! - **Distance table**: each report is stored as `hops + 1` if it is the
//!   first or a shorter path, otherwise it only keeps the entry fresh.
//!   Entries not refreshed for 1500 ms are evicted.
//! - **Estimation**: after every reception a non-beacon node picks its three
//!   closest beacons, derives an average hop size from their triangle and
//!   trilaterates.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dvhop_protocol::{DvHopConfig, DvHopNode, InterfaceAddress, ManualClock};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let clock = ManualClock::new();
//! let mut node = DvHopNode::new(DvHopConfig::default(), Arc::new(clock.clone()), StdRng::seed_from_u64(7));
//! node.notify_interface_up(1, InterfaceAddress::with_prefix("10.0.0.5".parse()?, 8));
//! node.start(&mut host);
//!
//! // Later, for every datagram the host receives on interface 1:
//! let reception = node.receive(1, &payload, &mut host)?;
//! ```
//!
//! The node never performs IO itself; see [`host`] for the capabilities a
//! host provides.

pub mod config;
pub mod error;
pub mod estimator;
pub mod host;
pub mod interface;
pub mod message;
pub mod node;
pub mod routing;
pub mod stats;

pub use config::{DvHopConfig, DVHOP_PORT};
pub use error::{DecodeError, Error, Result};
pub use estimator::{estimate, select_closest, Estimate, Estimation};
pub use host::{
    BroadcastChannel, Clock, Datagram, Host, ManualClock, MonotonicClock, NodeTimer, RandomSource,
    Scheduler, StatsSink, TimerHandle,
};
pub use interface::{InterfaceAddress, InterfaceIndex};
pub use message::FloodingMessage;
pub use node::{DvHopNode, FloodingState, Reception, TableUpdate};
pub use routing::{InputDecision, Ipv4Header, Route, RouteCapability, RouteError};
pub use stats::{EventCode, EventStats, ParseStatsError, ReceptionStats, StatsRecord};

// Re-export the lower layers so hosts need a single dependency.
pub use dvhop_geometry::{GeometryError, Point2};
pub use dvhop_table::{BeaconId, BeaconRecord, DistanceTable, Timestamp};
