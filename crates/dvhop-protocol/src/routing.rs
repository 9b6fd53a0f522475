//! Integration with an IP routing layer.
//!
//! DV-Hop does not forward data. A node only needs to hand its own
//! broadcast control traffic down to the link and accept broadcasts and
//! packets addressed to itself on the way up.

use std::net::Ipv4Addr;

use thiserror::Error;
use tracing::{debug, info, trace};

use crate::interface::InterfaceIndex;
use crate::node::DvHopNode;

/// The parts of an IPv4 header routing decisions look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub ttl: u8,
}

/// Route for an outgoing packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    /// Final destination.
    pub destination: Ipv4Addr,
    /// Next hop; always the output interface's broadcast address.
    pub gateway: Ipv4Addr,
    /// Source address to stamp on the packet.
    pub source: Ipv4Addr,
    /// Interface to send on.
    pub output_interface: InterfaceIndex,
}

/// Reasons no output route exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The node has no DV-Hop interface bound.
    #[error("no route to host: no DV-Hop interfaces")]
    NoInterfaces,

    /// No output interface was given, or it has no address.
    #[error("no route to host: no address on interface {0:?}")]
    UnknownInterface(Option<InterfaceIndex>),
}

/// What to do with an incoming packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputDecision {
    /// Hand to the local stack.
    DeliverLocally {
        /// Interface the packet arrived on.
        interface: InterfaceIndex,
    },
    /// Not for us; DV-Hop never forwards.
    NotForwarded,
    /// No DV-Hop interface is bound.
    NoInterfaces,
}

/// Routing hooks a host IP stack calls.
pub trait RouteCapability {
    /// Route a locally generated packet out of `output_interface`.
    fn route_output(
        &self,
        header: &Ipv4Header,
        output_interface: Option<InterfaceIndex>,
    ) -> Result<Route, RouteError>;

    /// Decide what happens to a packet received on `input_interface`.
    fn route_input(&self, header: &Ipv4Header, input_interface: InterfaceIndex) -> InputDecision;
}

impl RouteCapability for DvHopNode {
    fn route_output(
        &self,
        header: &Ipv4Header,
        output_interface: Option<InterfaceIndex>,
    ) -> Result<Route, RouteError> {
        if self.bindings().next().is_none() {
            debug!("No DV-Hop interfaces");
            return Err(RouteError::NoInterfaces);
        }

        let (interface, iface) = output_interface
            .and_then(|i| self.primary_address(i).map(|a| (i, a)))
            .ok_or(RouteError::UnknownInterface(output_interface))?;

        trace!(destination = %header.destination, source = %iface.local, "Routing outgoing packet");
        Ok(Route {
            destination: header.destination,
            gateway: iface.broadcast(),
            source: iface.local,
            output_interface: interface,
        })
    }

    fn route_input(&self, header: &Ipv4Header, input_interface: InterfaceIndex) -> InputDecision {
        if self.bindings().next().is_none() {
            debug!("No DV-Hop interfaces");
            return InputDecision::NoInterfaces;
        }

        let destination = header.destination;
        if destination.is_multicast() {
            info!(%destination, "Multicast destination");
        }

        if let Some(iface) = self.binding(input_interface) {
            if destination == iface.broadcast() || destination.is_broadcast() {
                if header.ttl > 1 {
                    trace!(%destination, ttl = header.ttl, "Broadcast not re-forwarded");
                }
                return InputDecision::DeliverLocally {
                    interface: input_interface,
                };
            }
        }

        if self.is_local_address(destination) {
            trace!(%destination, "Unicast local delivery");
            return InputDecision::DeliverLocally {
                interface: input_interface,
            };
        }

        InputDecision::NotForwarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DvHopConfig;
    use crate::host::testing::RecordingHost;
    use crate::host::ManualClock;
    use crate::interface::InterfaceAddress;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn node() -> DvHopNode {
        let mut node = DvHopNode::new(
            DvHopConfig::default(),
            Arc::new(ManualClock::new()),
            StdRng::seed_from_u64(0),
        );
        node.notify_interface_up(1, InterfaceAddress::with_prefix(Ipv4Addr::new(10, 0, 0, 5), 8));
        node
    }

    fn header(destination: Ipv4Addr, ttl: u8) -> Ipv4Header {
        Ipv4Header {
            source: Ipv4Addr::new(10, 0, 0, 9),
            destination,
            ttl,
        }
    }

    #[test]
    fn output_route_uses_broadcast_gateway() {
        let route = node()
            .route_output(&header(Ipv4Addr::new(10, 0, 0, 7), 1), Some(1))
            .unwrap();

        assert_eq!(route.destination, Ipv4Addr::new(10, 0, 0, 7));
        assert_eq!(route.gateway, Ipv4Addr::new(10, 255, 255, 255));
        assert_eq!(route.source, Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(route.output_interface, 1);
    }

    #[test]
    fn output_route_errors() {
        let mut dvhop = node();
        let h = header(Ipv4Addr::new(10, 0, 0, 7), 1);
        assert_eq!(dvhop.route_output(&h, None), Err(RouteError::UnknownInterface(None)));
        assert_eq!(dvhop.route_output(&h, Some(4)), Err(RouteError::UnknownInterface(Some(4))));

        dvhop.notify_interface_down(1, &mut RecordingHost::new());
        assert_eq!(dvhop.route_output(&h, Some(1)), Err(RouteError::NoInterfaces));
    }

    #[test]
    fn broadcasts_and_own_address_are_delivered() {
        let node = node();
        let local = InputDecision::DeliverLocally { interface: 1 };

        assert_eq!(node.route_input(&header(Ipv4Addr::new(10, 255, 255, 255), 1), 1), local);
        assert_eq!(node.route_input(&header(Ipv4Addr::BROADCAST, 3), 1), local);
        assert_eq!(node.route_input(&header(Ipv4Addr::new(10, 0, 0, 5), 1), 1), local);
    }

    #[test]
    fn other_destinations_are_not_forwarded() {
        let node = node();
        assert_eq!(
            node.route_input(&header(Ipv4Addr::new(10, 0, 0, 8), 64), 1),
            InputDecision::NotForwarded
        );
        assert_eq!(
            node.route_input(&header(Ipv4Addr::new(224, 0, 0, 1), 1), 1),
            InputDecision::NotForwarded
        );
        // Subnet broadcast arriving on an interface without a binding.
        assert_eq!(
            node.route_input(&header(Ipv4Addr::new(10, 255, 255, 255), 1), 2),
            InputDecision::NotForwarded
        );
    }

    #[test]
    fn nothing_bound() {
        let mut node = node();
        node.notify_interface_down(1, &mut RecordingHost::new());
        assert_eq!(
            node.route_input(&header(Ipv4Addr::BROADCAST, 1), 1),
            InputDecision::NoInterfaces
        );
    }
}
