//! DV-Hop Node - Flooding state machine with on-receipt position estimation.
//!
//! A [`DvHopNode`] owns one distance table and drives it from two kinds of
//! events delivered by its host:
//!
//! - **Hello timer**: every `hello_interval` the node re-advertises every
//!   beacon it knows (and itself, if it is a beacon) on each bound
//!   interface. Each report is its own jittered deferred send.
//! - **Reception**: an incoming report updates the table with the
//!   minimum-hop rule, sweeps stale entries and, on non-beacon nodes,
//!   re-estimates the node's position.
//!
//! The node is sans-IO. Time and randomness are injected at construction;
//! timers, broadcast and statistics go through the [`Host`] passed to each
//! handler.

use std::collections::{BTreeMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use dvhop_geometry::Point2;
use dvhop_table::{BeaconId, DistanceTable, Eviction};
use tracing::{debug, info, trace, warn};

use crate::config::DvHopConfig;
use crate::error::{Error, Result};
use crate::estimator::{self, Estimation};
use crate::host::{Clock, Datagram, Host, NodeTimer, RandomSource, Scheduler, TimerHandle};
use crate::interface::{InterfaceAddress, InterfaceIndex};
use crate::message::FloodingMessage;
use crate::stats::{EventCode, ReceptionStats, StatsRecord};

/// Lifecycle of the flooding timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloodingState {
    /// Created, [`DvHopNode::start`] not called yet.
    NotStarted,
    /// Hello timer armed.
    Active,
    /// No interface left or shut down. Terminal.
    Idle,
}

/// How an incoming report changed the distance table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableUpdate {
    /// The report was about one of our own addresses and was discarded.
    SelfReport,
    /// First report about this beacon.
    Inserted,
    /// A shorter path was found.
    Improved {
        /// Hop count before the update.
        previous: u16,
    },
    /// No improvement; only the timestamp was refreshed.
    Refreshed,
}

/// Result of processing one received report.
#[derive(Debug, Clone, PartialEq)]
pub struct Reception {
    /// The decoded report.
    pub message: FloodingMessage,
    /// Effect on the distance table.
    pub update: TableUpdate,
    /// Entries removed by the staleness sweep.
    pub evicted: Vec<Eviction>,
    /// Estimation outcome; `None` on beacons and for discarded reports.
    pub estimation: Option<Estimation>,
}

/// One DV-Hop participant.
pub struct DvHopNode {
    config: DvHopConfig,
    state: FloodingState,

    is_beacon: bool,
    position: Point2,
    ground_truth: Option<Point2>,

    table: DistanceTable,
    seq_no: u32,

    /// Every address the host reported, per up interface.
    interfaces: BTreeMap<InterfaceIndex, Vec<InterfaceAddress>>,
    /// The address each interface floods from. At most one per interface.
    bindings: BTreeMap<InterfaceIndex, InterfaceAddress>,

    hello_timer: Option<TimerHandle>,
    pending_sends: HashSet<TimerHandle>,
    shut_down: bool,

    clock: Arc<dyn Clock>,
    rng: Box<dyn RandomSource + Send>,
}

impl std::fmt::Debug for DvHopNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DvHopNode")
            .field("state", &self.state)
            .field("is_beacon", &self.is_beacon)
            .field("position", &self.position)
            .field("ground_truth", &self.ground_truth)
            .field("table_size", &self.table.len())
            .field("seq_no", &self.seq_no)
            .field("bindings", &self.bindings)
            .field("pending_sends", &self.pending_sends.len())
            .finish_non_exhaustive()
    }
}

impl DvHopNode {
    /// Create a regular (non-beacon) node with an unknown position.
    pub fn new(
        config: DvHopConfig,
        clock: Arc<dyn Clock>,
        rng: impl RandomSource + Send + 'static,
    ) -> Self {
        let table = DistanceTable::with_expiry(config.expiry);
        Self {
            config,
            state: FloodingState::NotStarted,
            is_beacon: false,
            position: DistanceTable::UNKNOWN_POSITION,
            ground_truth: None,
            table,
            seq_no: 0,
            interfaces: BTreeMap::new(),
            bindings: BTreeMap::new(),
            hello_timer: None,
            pending_sends: HashSet::new(),
            shut_down: false,
            clock,
            rng: Box::new(rng),
        }
    }

    /// Make this node a beacon at a fixed, known position.
    pub fn set_beacon(&mut self, position: Point2) {
        self.is_beacon = true;
        self.position = position;
    }

    /// Record the node's true position, used only to report estimation error.
    pub fn set_ground_truth(&mut self, position: Point2) {
        self.ground_truth = Some(position);
    }

    /// Whether this node is a beacon.
    pub fn is_beacon(&self) -> bool {
        self.is_beacon
    }

    /// Own position: fixed on beacons, latest estimate otherwise
    /// (`(-1,-1)` before the first fix).
    pub fn position(&self) -> Point2 {
        self.position
    }

    /// True position, if the host configured one.
    pub fn ground_truth(&self) -> Option<Point2> {
        self.ground_truth
    }

    /// Sequence number the next report will carry.
    pub fn seq_no(&self) -> u32 {
        self.seq_no
    }

    /// Current flooding state.
    pub fn state(&self) -> FloodingState {
        self.state
    }

    /// Beacons this node currently knows about.
    pub fn table(&self) -> &DistanceTable {
        &self.table
    }

    /// Protocol settings the node was built with.
    pub fn config(&self) -> &DvHopConfig {
        &self.config
    }

    /// Interface bindings in interface order.
    pub fn bindings(&self) -> impl Iterator<Item = (InterfaceIndex, &InterfaceAddress)> {
        self.bindings.iter().map(|(i, a)| (*i, a))
    }

    /// Binding of one interface.
    pub fn binding(&self, interface: InterfaceIndex) -> Option<&InterfaceAddress> {
        self.bindings.get(&interface)
    }

    /// First address reported for an up interface, bound or not.
    pub fn primary_address(&self, interface: InterfaceIndex) -> Option<&InterfaceAddress> {
        self.interfaces.get(&interface).and_then(|a| a.first())
    }

    /// Check whether `addr` is assigned to any of this node's interfaces.
    pub fn is_local_address(&self, addr: Ipv4Addr) -> bool {
        self.interfaces
            .values()
            .flatten()
            .any(|iface| iface.local == addr)
    }

    /// Number of jittered sends scheduled and not yet fired.
    pub fn pending_sends(&self) -> usize {
        self.pending_sends.len()
    }

    /// Arm the hello timer one interval from now.
    pub fn start(&mut self, host: &mut impl Scheduler) {
        if self.state != FloodingState::NotStarted {
            debug!(state = ?self.state, "Ignoring start on a node that already started");
            return;
        }
        self.state = FloodingState::Active;
        self.rearm_hello(host);
        info!(beacon = self.is_beacon, interfaces = self.bindings.len(), "DV-Hop node started");
    }

    /// Handle a timer the host scheduled for this node.
    pub fn on_timer(&mut self, handle: TimerHandle, timer: NodeTimer, host: &mut impl Host) {
        if self.shut_down {
            trace!(?handle, "Timer fired after shutdown, ignoring");
            return;
        }

        match timer {
            NodeTimer::Hello => {
                if self.hello_timer != Some(handle) || self.state != FloodingState::Active {
                    trace!(?handle, "Stale hello timer, ignoring");
                    return;
                }
                self.send_hello(host);
                self.rearm_hello(host);
            }
            NodeTimer::Send(datagram) => {
                if !self.pending_sends.remove(&handle) {
                    trace!(?handle, "Unknown send timer, ignoring");
                    return;
                }
                let bound = self
                    .bindings
                    .get(&datagram.interface)
                    .is_some_and(|b| b.local == datagram.source);
                if !bound {
                    debug!(
                        interface = datagram.interface,
                        source = %datagram.source,
                        "Dropping deferred send, interface binding is gone"
                    );
                    return;
                }
                host.send(datagram);
            }
        }
    }

    /// Process one received flooding message.
    pub fn receive(
        &mut self,
        interface: InterfaceIndex,
        bytes: &[u8],
        host: &mut impl Host,
    ) -> Result<Reception> {
        if self.shut_down {
            return Err(Error::ShutDown);
        }
        let receiver = self
            .bindings
            .get(&interface)
            .map(|b| b.local)
            .ok_or(Error::UnknownInterface(interface))?;

        let message = FloodingMessage::decode(bytes)?;
        let now = self.clock.now();

        if self.is_local_address(message.beacon.addr()) {
            trace!(beacon = %message.beacon, "Own address, not updating table");
            return Ok(Reception {
                message,
                update: TableUpdate::SelfReport,
                evicted: Vec::new(),
                estimation: None,
            });
        }

        let candidate = message.hop_count.saturating_add(1);
        let update = match self.table.get(&message.beacon).map(|r| r.hops) {
            None => {
                self.table
                    .add_or_refresh(message.beacon, candidate, message.position, now);
                TableUpdate::Inserted
            }
            Some(previous) if candidate < previous => {
                self.table
                    .add_or_refresh(message.beacon, candidate, message.position, now);
                TableUpdate::Improved { previous }
            }
            Some(_) => {
                self.table.touch(&message.beacon, now);
                TableUpdate::Refreshed
            }
        };
        trace!(%receiver, %message, ?update, "Processed report");

        let evicted = self.table.trim_expired(now);
        for _ in &evicted {
            host.emit(StatsRecord::event(now, EventCode::ExpiredEntry));
        }

        if self.is_beacon {
            return Ok(Reception {
                message,
                update,
                evicted,
                estimation: None,
            });
        }

        let estimation = self.localize(receiver, host);
        Ok(Reception {
            message,
            update,
            evicted,
            estimation: Some(estimation),
        })
    }

    fn localize(&mut self, receiver: Ipv4Addr, host: &mut impl Host) -> Estimation {
        let now = self.clock.now();
        let estimation = estimator::estimate(&self.table);

        let error = match &estimation {
            Estimation::InsufficientBeacons { .. } => Point2::ORIGIN,
            Estimation::Estimated(fix) => {
                debug!(
                    %receiver,
                    beacons = ?fix.beacons,
                    hops = ?fix.hops,
                    hop_size = fix.hop_size,
                    position = %fix.position,
                    "Trilaterated new position"
                );
                self.position = fix.position;
                self.ground_truth
                    .map_or(Point2::ORIGIN, |truth| fix.position.abs_diff(&truth))
            }
            Estimation::Rejected(e) => {
                warn!(%receiver, error = %e, position = %self.position, "Degenerate beacon geometry, keeping previous position");
                return estimation;
            }
        };

        host.emit(StatsRecord::Reception(ReceptionStats {
            time: now,
            node: receiver,
            table_size: self.table.len(),
            position: self.position,
            error,
        }));
        estimation
    }

    fn send_hello(&mut self, host: &mut impl Host) {
        let bindings: Vec<(InterfaceIndex, InterfaceAddress)> =
            self.bindings.iter().map(|(i, a)| (*i, *a)).collect();
        let known: Vec<(BeaconId, Point2, u16)> = self
            .table
            .iter()
            .map(|(b, r)| (*b, r.position, r.hops))
            .collect();

        for (interface, iface) in bindings {
            for (beacon, position, hops) in &known {
                let message = FloodingMessage::new(*beacon, *position, self.next_seq_no(), *hops);
                self.schedule_send(interface, iface, &message, host);
            }

            if self.is_beacon {
                let own = BeaconId::new(iface.local);
                let message = FloodingMessage::new(own, self.position, self.next_seq_no(), 0);
                self.schedule_send(interface, iface, &message, host);
            }
            trace!(%iface, reports = known.len() + usize::from(self.is_beacon), "Sending hello");
        }
    }

    fn schedule_send(
        &mut self,
        interface: InterfaceIndex,
        iface: InterfaceAddress,
        message: &FloodingMessage,
        host: &mut impl Host,
    ) {
        let datagram = Datagram {
            interface,
            source: iface.local,
            destination: iface.flood_destination(),
            port: self.config.port,
            ttl: self.config.ttl,
            payload: message.encode(),
        };
        let jitter = self.rng.uniform_inclusive(0, self.config.max_jitter_ms);
        let handle = host.schedule(
            Duration::from_millis(u64::from(jitter)),
            NodeTimer::Send(datagram),
        );
        self.pending_sends.insert(handle);
    }

    fn next_seq_no(&mut self) -> u32 {
        let seq = self.seq_no;
        self.seq_no = self.seq_no.wrapping_add(1);
        seq
    }

    fn rearm_hello(&mut self, host: &mut impl Scheduler) {
        if let Some(old) = self.hello_timer.take() {
            host.cancel(old);
        }
        self.hello_timer = Some(host.schedule(self.config.hello_interval, NodeTimer::Hello));
    }

    fn stop_hello(&mut self, host: &mut impl Scheduler) {
        if let Some(handle) = self.hello_timer.take() {
            host.cancel(handle);
        }
        self.state = FloodingState::Idle;
    }

    fn bind(&mut self, interface: InterfaceIndex, address: InterfaceAddress) {
        debug!(interface, %address, "Binding interface");
        self.bindings.insert(interface, address);
    }

    fn unbind(&mut self, interface: InterfaceIndex, host: &mut impl Scheduler) {
        if self.bindings.remove(&interface).is_some() {
            debug!(interface, "Unbound interface");
        }
        if self.bindings.is_empty() && self.state != FloodingState::Idle {
            info!("No DV-Hop interfaces left, stopping hello timer");
            self.stop_hello(host);
        }
    }

    /// An interface came up with its primary address.
    pub fn notify_interface_up(&mut self, interface: InterfaceIndex, address: InterfaceAddress) {
        let addresses = self.interfaces.entry(interface).or_default();
        if !addresses.contains(&address) {
            addresses.push(address);
        }
        if addresses.len() > 1 {
            warn!(interface, "DV-Hop does not work with more than one address per interface");
            return;
        }
        if address.is_loopback() || self.bindings.contains_key(&interface) {
            return;
        }
        self.bind(interface, address);
    }

    /// An interface went down; its binding and addresses are dropped.
    pub fn notify_interface_down(&mut self, interface: InterfaceIndex, host: &mut impl Scheduler) {
        self.interfaces.remove(&interface);
        self.unbind(interface, host);
    }

    /// An address was added to an interface that is already up.
    pub fn notify_add_address(&mut self, interface: InterfaceIndex, address: InterfaceAddress) {
        let Some(addresses) = self.interfaces.get_mut(&interface) else {
            debug!(interface, %address, "Address added to a down interface, ignoring");
            return;
        };
        if !addresses.contains(&address) {
            addresses.push(address);
        }
        if addresses.len() > 1 {
            warn!(interface, %address, "DV-Hop does not work with more than one address per interface, ignoring added address");
            return;
        }
        if address.is_loopback() || self.bindings.contains_key(&interface) {
            return;
        }
        self.bind(interface, address);
    }

    /// An address was removed from an interface. If it was the bound one,
    /// the interface rebinds to its remaining primary address, if any.
    pub fn notify_remove_address(
        &mut self,
        interface: InterfaceIndex,
        address: InterfaceAddress,
        host: &mut impl Scheduler,
    ) {
        if let Some(addresses) = self.interfaces.get_mut(&interface) {
            addresses.retain(|a| *a != address);
        }
        if self.bindings.get(&interface) != Some(&address) {
            debug!(interface, %address, "Removed address not participating in DV-Hop");
            return;
        }

        self.bindings.remove(&interface);
        let replacement = self
            .interfaces
            .get(&interface)
            .and_then(|addresses| addresses.first().copied())
            .filter(|a| !a.is_loopback());
        match replacement {
            Some(next) => self.bind(interface, next),
            None => self.unbind(interface, host),
        }
    }

    /// Stop for good: cancel the hello timer and every pending send, drop
    /// all bindings. Later timer callbacks are ignored and receptions fail.
    pub fn shutdown(&mut self, host: &mut impl Scheduler) {
        if self.shut_down {
            return;
        }
        self.stop_hello(host);
        for handle in self.pending_sends.drain() {
            host.cancel(handle);
        }
        self.bindings.clear();
        self.interfaces.clear();
        self.shut_down = true;
        info!("DV-Hop node shut down");
    }

    /// Human-readable dump of the distance table under a node header.
    pub fn distance_report(&self, label: impl std::fmt::Display) -> String {
        format!(
            "----------------- Node {} -----------------\n{}",
            label, self.table
        )
    }
}
