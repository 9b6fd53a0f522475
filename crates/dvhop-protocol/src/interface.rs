//! Interface addressing.

use std::net::Ipv4Addr;

/// Index of a network interface on a node.
pub type InterfaceIndex = u32;

/// An IPv4 address assigned to an interface, with its network mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterfaceAddress {
    /// Local address.
    pub local: Ipv4Addr,
    /// Network mask.
    pub mask: Ipv4Addr,
}

impl InterfaceAddress {
    /// Create a new interface address.
    pub const fn new(local: Ipv4Addr, mask: Ipv4Addr) -> Self {
        Self { local, mask }
    }

    /// Create from a prefix length, e.g. `/8`.
    pub fn with_prefix(local: Ipv4Addr, prefix: u8) -> Self {
        let bits = match prefix {
            0 => 0,
            p if p >= 32 => u32::MAX,
            p => u32::MAX << (32 - u32::from(p)),
        };
        Self {
            local,
            mask: Ipv4Addr::from(bits),
        }
    }

    /// Subnet-directed broadcast address.
    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.local) | !u32::from(self.mask))
    }

    /// Whether this is the loopback address.
    pub fn is_loopback(&self) -> bool {
        self.local == Ipv4Addr::LOCALHOST
    }

    /// Destination for flooding: the all-hosts broadcast on a /32,
    /// the subnet-directed broadcast otherwise.
    pub fn flood_destination(&self) -> Ipv4Addr {
        if self.mask == Ipv4Addr::BROADCAST {
            Ipv4Addr::BROADCAST
        } else {
            self.broadcast()
        }
    }
}

impl std::fmt::Display for InterfaceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.local, u32::from(self.mask).count_ones())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subnet_broadcast() {
        let iface = InterfaceAddress::with_prefix(Ipv4Addr::new(10, 0, 0, 5), 8);
        assert_eq!(iface.mask, Ipv4Addr::new(255, 0, 0, 0));
        assert_eq!(iface.broadcast(), Ipv4Addr::new(10, 255, 255, 255));
        assert_eq!(iface.flood_destination(), Ipv4Addr::new(10, 255, 255, 255));
    }

    #[test]
    fn host_route_floods_all_hosts() {
        let iface = InterfaceAddress::with_prefix(Ipv4Addr::new(192, 168, 1, 9), 32);
        assert_eq!(iface.flood_destination(), Ipv4Addr::BROADCAST);
    }

    #[test]
    fn loopback_detection() {
        assert!(InterfaceAddress::with_prefix(Ipv4Addr::LOCALHOST, 8).is_loopback());
        assert!(!InterfaceAddress::with_prefix(Ipv4Addr::new(10, 0, 0, 1), 8).is_loopback());
    }

    #[test]
    fn display_uses_prefix() {
        let iface = InterfaceAddress::with_prefix(Ipv4Addr::new(10, 1, 2, 3), 16);
        assert_eq!(iface.to_string(), "10.1.2.3/16");
    }
}
