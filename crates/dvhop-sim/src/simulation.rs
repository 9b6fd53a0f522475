//! Discrete-event DV-Hop network simulation.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use dvhop_protocol::{
    BroadcastChannel, Clock, Datagram, DistanceTable, DvHopNode, EventCode, InterfaceAddress,
    ManualClock, NodeTimer, Point2, Scheduler, StatsRecord, StatsSink, TimerHandle, Timestamp,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::error::Result;
use crate::events::{EventQueue, NodeIndex, SimEvent};
use crate::medium::Medium;
use crate::report::{RunSummary, StatsLog};
use crate::topology::{beacon_indices, disabled_position, node_address, Grid};

/// Interface index of the loopback device on every node.
pub const LOOPBACK_INTERFACE: u32 = 0;

/// Interface index of the radio on every node.
pub const RADIO_INTERFACE: u32 = 1;

/// One simulated device.
#[derive(Debug)]
pub struct SimNode {
    /// The protocol instance.
    pub dvhop: DvHopNode,
    /// Radio address.
    pub address: InterfaceAddress,
    /// Where the radio physically is; decides who hears whom.
    pub physical: Point2,
    /// Whether the node has been taken out of the network.
    pub disabled: bool,
}

/// Host capabilities for one node while it handles one event.
struct NodeContext<'a> {
    node: NodeIndex,
    now: Timestamp,
    queue: &'a mut EventQueue,
    outbox: &'a mut Vec<Datagram>,
    log: &'a mut StatsLog,
}

impl Scheduler for NodeContext<'_> {
    fn schedule(&mut self, delay: Duration, timer: NodeTimer) -> TimerHandle {
        self.queue.push_timer(self.now + delay, self.node, timer)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.queue.cancel(handle);
    }
}

impl BroadcastChannel for NodeContext<'_> {
    fn send(&mut self, datagram: Datagram) {
        self.outbox.push(datagram);
    }
}

impl StatsSink for NodeContext<'_> {
    fn emit(&mut self, record: StatsRecord) {
        self.log.emit(record);
    }
}

/// A DV-Hop network on a grid, driven by one event queue in simulated time.
pub struct Simulation {
    config: SimulationConfig,
    clock: ManualClock,
    nodes: Vec<SimNode>,
    queue: EventQueue,
    medium: Medium,
    rng: StdRng,
    log: StatsLog,
    started: bool,
    finished: bool,
}

impl Simulation {
    /// Build the network: place nodes, pick beacons, schedule failures.
    pub fn new(mut config: SimulationConfig) -> Result<Self> {
        config.validate()?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let clock = ManualClock::new();
        let grid = Grid::for_size(config.size, config.step);
        let beacons = beacon_indices(config.size, config.beacons);
        info!(
            size = config.size,
            step = config.step,
            beacons = beacons.len(),
            "Creating nodes"
        );

        let mut nodes = Vec::with_capacity(config.size as usize);
        for index in 0..config.size {
            let physical = grid.position(index);
            let offset = config.position_offset;
            let reported = if offset > 0.0 {
                physical + Point2::new(rng.gen_range(0.0..offset), rng.gen_range(0.0..offset))
            } else {
                physical
            };

            let mut dvhop = DvHopNode::new(
                config.protocol_config(),
                Arc::new(clock.clone()),
                StdRng::seed_from_u64(config.seed.wrapping_add(u64::from(index) + 1)),
            );
            let address = node_address(index);
            dvhop.notify_interface_up(
                LOOPBACK_INTERFACE,
                InterfaceAddress::with_prefix(Ipv4Addr::LOCALHOST, 8),
            );
            dvhop.notify_interface_up(RADIO_INTERFACE, address);
            dvhop.set_ground_truth(reported);
            if beacons.contains(&index) {
                dvhop.set_beacon(reported);
            }
            debug!(index, %address, %physical, beacon = dvhop.is_beacon(), "Created node");

            nodes.push(SimNode {
                dvhop,
                address,
                physical,
                disabled: false,
            });
        }

        let mut queue = EventQueue::new();
        let total_ms = u64::try_from(config.duration().as_millis()).unwrap_or(u64::MAX);
        info!(extent = config.damage_extent, "Damaging network");
        for _ in 0..config.damage_extent {
            let node = rng.gen_range(0..config.size - 1) as NodeIndex;
            let at = rng.gen_range(0..total_ms.max(1));
            debug!(node, at, "Scheduled damage");
            queue.push(Timestamp::from_millis(at), SimEvent::Disable { node });
        }

        let medium = Medium::new(config.range, config.loss_rate, config.link_delay_ms);
        Ok(Self {
            config,
            clock,
            nodes,
            queue,
            medium,
            rng,
            log: StatsLog::new(),
            started: false,
            finished: false,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn nodes(&self) -> &[SimNode] {
        &self.nodes
    }

    pub fn node(&self, index: NodeIndex) -> Option<&SimNode> {
        self.nodes.get(index)
    }

    /// Statistics emitted so far.
    pub fn log(&self) -> &StatsLog {
        &self.log
    }

    /// Current simulated time.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Arm every node's hello timer at time zero.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        let now = self.now();
        let mut outbox = Vec::new();
        for index in 0..self.nodes.len() {
            let mut ctx = NodeContext {
                node: index,
                now,
                queue: &mut self.queue,
                outbox: &mut outbox,
                log: &mut self.log,
            };
            self.nodes[index].dvhop.start(&mut ctx);
        }
        info!(nodes = self.nodes.len(), seconds = self.config.time, "Starting simulation");
    }

    /// Process every event due before `end`. Does nothing once the network
    /// has been shut down.
    pub fn run_until(&mut self, end: Timestamp) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.start();
        while let Some(at) = self.queue.peek_time() {
            if at >= end {
                break;
            }
            let Some((at, event)) = self.queue.pop() else {
                break;
            };
            self.clock.set(at);
            self.dispatch(at, event)?;
        }
        self.clock.set(end);
        Ok(())
    }

    /// Run for the configured time, shut every node down and summarize.
    pub fn run(&mut self) -> Result<RunSummary> {
        let end = Timestamp::ZERO + self.config.duration();
        self.run_until(end)?;
        self.shutdown();
        Ok(self.summary())
    }

    /// Stop every node. Pending timers are cancelled.
    pub fn shutdown(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        let now = self.now();
        let mut outbox = Vec::new();
        for index in 0..self.nodes.len() {
            let mut ctx = NodeContext {
                node: index,
                now,
                queue: &mut self.queue,
                outbox: &mut outbox,
                log: &mut self.log,
            };
            self.nodes[index].dvhop.shutdown(&mut ctx);
        }
    }

    fn dispatch(&mut self, now: Timestamp, event: SimEvent) -> Result<()> {
        match event {
            SimEvent::Timer {
                node,
                handle,
                timer,
            } => {
                let mut outbox = Vec::new();
                let mut ctx = NodeContext {
                    node,
                    now,
                    queue: &mut self.queue,
                    outbox: &mut outbox,
                    log: &mut self.log,
                };
                self.nodes[node].dvhop.on_timer(handle, timer, &mut ctx);
                for datagram in outbox {
                    self.broadcast(node, now, datagram);
                }
            }
            SimEvent::Deliver { node, payload } => {
                let mut outbox = Vec::new();
                let mut ctx = NodeContext {
                    node,
                    now,
                    queue: &mut self.queue,
                    outbox: &mut outbox,
                    log: &mut self.log,
                };
                self.nodes[node]
                    .dvhop
                    .receive(RADIO_INTERFACE, &payload, &mut ctx)?;
            }
            SimEvent::Disable { node } => {
                let sim_node = &mut self.nodes[node];
                sim_node.physical = disabled_position(node as u32);
                sim_node.disabled = true;
                info!(node, address = %sim_node.address, "Disabled node");
                self.log
                    .emit(StatsRecord::event(now, EventCode::DisabledNode));
            }
        }
        Ok(())
    }

    fn broadcast(&mut self, sender: NodeIndex, now: Timestamp, datagram: Datagram) {
        let positions: Vec<Point2> = self.nodes.iter().map(|n| n.physical).collect();
        let at = now + Duration::from_millis(self.medium.delay_ms);
        for receiver in self.medium.receivers(sender, &positions, &mut self.rng) {
            self.queue.push(
                at,
                SimEvent::Deliver {
                    node: receiver,
                    payload: datagram.payload.clone(),
                },
            );
        }
    }

    /// Outcome so far.
    pub fn summary(&self) -> RunSummary {
        let errors: Vec<f64> = self
            .nodes
            .iter()
            .filter(|n| !n.dvhop.is_beacon() && !n.disabled)
            .filter(|n| n.dvhop.position() != DistanceTable::UNKNOWN_POSITION)
            .filter_map(|n| {
                n.dvhop
                    .ground_truth()
                    .map(|truth| n.dvhop.position().distance(&truth))
            })
            .collect();

        let receptions = self
            .log
            .records()
            .iter()
            .filter(|r| matches!(r, StatsRecord::Reception(_)))
            .count();

        RunSummary {
            seed: self.config.seed,
            duration_ms: self.now().as_millis(),
            nodes: self.nodes.len(),
            beacons: self.nodes.iter().filter(|n| n.dvhop.is_beacon()).count(),
            localized: 0,
            mean_error: None,
            max_error: None,
            receptions,
            expired_entries: self.log.count_events(EventCode::ExpiredEntry),
            disabled_nodes: self.log.count_events(EventCode::DisabledNode),
        }
        .with_errors(&errors)
    }

    /// Distance tables of every node, one section per node.
    pub fn distance_report(&self) -> String {
        self.nodes
            .iter()
            .map(|n| n.dvhop.distance_report(n.address.local))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dvhop_protocol::FloodingState;

    fn small() -> SimulationConfig {
        SimulationConfig {
            size: 30,
            beacons: 7,
            time: 5.0,
            ..Default::default()
        }
    }

    #[test]
    fn builds_grid_with_beacons() {
        let sim = Simulation::new(SimulationConfig::default()).unwrap();
        assert_eq!(sim.nodes().len(), 50);

        let beacons: Vec<usize> = sim
            .nodes()
            .iter()
            .enumerate()
            .filter(|(_, n)| n.dvhop.is_beacon())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(beacons, vec![0, 4, 8, 12, 16, 20, 24, 28, 32, 36, 40, 44]);

        let first = sim.node(0).unwrap();
        assert_eq!(first.address.local, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(first.physical, Point2::new(50.0, 50.0));

        // Reported positions are offset from the grid slot by less than 10 m.
        let truth = first.dvhop.ground_truth().unwrap();
        assert!((50.0..60.0).contains(&truth.x));
        assert!((50.0..60.0).contains(&truth.y));
        assert_eq!(first.dvhop.position(), truth);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SimulationConfig {
            size: 1,
            ..Default::default()
        };
        assert!(Simulation::new(config).is_err());

        let config = SimulationConfig {
            time: 1e20,
            ..Default::default()
        };
        assert!(matches!(
            Simulation::new(config),
            Err(crate::Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn interior_nodes_localize() {
        let mut sim = Simulation::new(small()).unwrap();
        let summary = sim.run().unwrap();

        assert_eq!(summary.nodes, 30);
        assert_eq!(summary.beacons, 7);
        assert_eq!(summary.localized, 23);
        assert!(summary.mean_error.is_some_and(f64::is_finite));
        assert!(summary.receptions > 0);

        // Beacons never list themselves.
        for node in sim.nodes() {
            let expected = if node.dvhop.is_beacon() { 6 } else { 7 };
            assert_eq!(node.dvhop.table().len(), expected, "{:?}", node.dvhop);
            assert_eq!(node.dvhop.state(), FloodingState::Idle);
        }
    }

    #[test]
    fn runs_are_deterministic() {
        let mut a = Simulation::new(small()).unwrap();
        let mut b = Simulation::new(small()).unwrap();
        a.run().unwrap();
        b.run().unwrap();

        assert_eq!(a.log().records(), b.log().records());
        assert_eq!(a.distance_report(), b.distance_report());
    }

    #[test]
    fn damage_disables_nodes() {
        let config = SimulationConfig {
            damage_extent: 2,
            ..small()
        };
        let mut sim = Simulation::new(config).unwrap();
        let summary = sim.run().unwrap();

        assert_eq!(summary.disabled_nodes, 2);
        assert!(sim.nodes().iter().any(|n| n.disabled));
        for node in sim.nodes().iter().filter(|n| n.disabled) {
            assert!(node.physical.x >= 100_000.0);
        }
    }

    #[test]
    fn total_loss_isolates_everyone() {
        let config = SimulationConfig {
            loss_rate: 1.0,
            ..small()
        };
        let mut sim = Simulation::new(config).unwrap();
        let summary = sim.run().unwrap();

        assert_eq!(summary.receptions, 0);
        assert_eq!(summary.localized, 0);
        assert!(sim.nodes().iter().all(|n| n.dvhop.table().is_empty()));
    }

    #[test]
    fn run_until_stops_early() {
        let mut sim = Simulation::new(small()).unwrap();
        sim.run_until(Timestamp::from_millis(400)).unwrap();

        // Nothing fires before the first hello at 500 ms.
        assert!(sim.log().is_empty());
        assert_eq!(sim.now(), Timestamp::from_millis(400));
    }

    #[test]
    fn distance_report_has_every_node() {
        let mut sim = Simulation::new(small()).unwrap();
        sim.run_until(Timestamp::from_millis(1_200)).unwrap();

        let report = sim.distance_report();
        assert_eq!(report.matches("----------------- Node ").count(), 30);
        assert!(report.contains("----------------- Node 10.0.0.30 -----------------"));
    }
}
