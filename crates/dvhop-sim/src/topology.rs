//! Node placement and role assignment.

use std::net::Ipv4Addr;

use dvhop_protocol::{InterfaceAddress, Point2};

/// Network all simulated nodes live in.
pub const NETWORK: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 0);

/// Prefix length of [`NETWORK`].
pub const PREFIX: u8 = 8;

/// Row-first grid: `floor(sqrt(size))` nodes per row, first node at
/// `(step, step)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    /// Nodes per row.
    pub width: u32,
    /// Spacing between neighbors, also the offset of the first slot.
    pub step: f64,
}

impl Grid {
    /// Grid sized for `size` nodes.
    pub fn for_size(size: u32, step: f64) -> Self {
        let width = (f64::from(size).sqrt().floor() as u32).max(1);
        Self { width, step }
    }

    /// Position of slot `index`.
    pub fn position(&self, index: u32) -> Point2 {
        let column = index % self.width;
        let row = index / self.width;
        Point2::new(
            self.step + f64::from(column) * self.step,
            self.step + f64::from(row) * self.step,
        )
    }
}

/// Indices of the beacon nodes: every `size / beacons`-th node from 0.
///
/// `beacons` must already be clamped into `[1, size - 1]`.
pub fn beacon_indices(size: u32, beacons: u32) -> Vec<u32> {
    let stride = size / beacons.max(1);
    (0..beacons).map(|i| i * stride).collect()
}

/// Address of node `index` on the simulated network.
pub fn node_address(index: u32) -> InterfaceAddress {
    let local = Ipv4Addr::from(u32::from(NETWORK) + index + 1);
    InterfaceAddress::with_prefix(local, PREFIX)
}

/// Where a disabled node is moved so that nobody hears it any more.
pub fn disabled_position(index: u32) -> Point2 {
    let far = 100_000.0 * f64::from(index + 1);
    Point2::new(far, far)
}
