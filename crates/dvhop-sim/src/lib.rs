//! DV-Hop Network Simulation
//!
//! Deterministic discrete-event host for [`dvhop_protocol`] nodes.
//!
//! # Architecture
//!
//! - **Topology**: Nodes on a row-first grid, every `size / beacons`-th one a beacon
//! - **Medium**: Unit-disk radio with optional loss and a fixed link delay
//! - **Events**: One time-ordered queue for timers, deliveries and node failures
//! - **Report**: `@STATS@` stream, CSV conversion and a run summary
//!
//! # Usage
//!
//! ```no_run
//! use dvhop_sim::{Simulation, SimulationConfig};
//!
//! let mut sim = Simulation::new(SimulationConfig::default())?;
//! let summary = sim.run()?;
//! sim.log().write_text(&mut std::io::stdout())?;
//! println!("{} nodes localized", summary.localized);
//! # Ok::<(), dvhop_sim::Error>(())
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod medium;
pub mod report;
pub mod simulation;
pub mod topology;

pub use config::{parse_flags, SimulationConfig};
pub use error::{Error, Result};
pub use events::{EventQueue, NodeIndex, SimEvent};
pub use medium::Medium;
pub use report::{stats_to_csv, CsvConversion, RunSummary, StatsLog};
pub use simulation::{SimNode, Simulation, LOOPBACK_INTERFACE, RADIO_INTERFACE};
pub use topology::{beacon_indices, node_address, Grid};
