//! DV-Hop Geometry Engine
//!
//! Pure planar geometry used by DV-Hop position estimation.
//!
//! # Estimation pipeline
//!
//! A node that knows hop counts `h1..h3` to three beacons at `b1..b3`:
//!
//! 1. averages the hop counts ([`mean_hops`]),
//! 2. turns the beacon triangle's perimeter into a per-hop distance
//!    ([`average_hop_size`]),
//! 3. converts each hop count into a range `r_k = h_k * hop_size`,
//! 4. solves for its position in closed form ([`trilaterate`]).
//!
//! Degenerate inputs (coincident or colinear beacons, zero hop counts)
//! produce a [`GeometryError`] rather than NaN or infinite coordinates.

mod error;
mod point;
mod trilateration;

pub use error::{GeometryError, Result};
pub use point::{norm, Point2};
pub use trilateration::{average_hop_size, mean_hops, trilaterate, RangedAnchor, DEGENERACY_EPSILON};

/// Estimate a position from three beacons and their hop counts.
///
/// Chains [`mean_hops`], [`average_hop_size`] and [`trilaterate`]; returns
/// the estimate together with the hop size that was used.
pub fn estimate_from_hops(beacons: [(Point2, u16); 3]) -> Result<(Point2, f64)> {
    let positions = beacons.map(|(p, _)| p);
    let hops = beacons.map(|(_, h)| h);

    let hop_size = average_hop_size(positions, mean_hops(hops))?;
    let anchors = beacons.map(|(p, h)| RangedAnchor::new(p, f64::from(h) * hop_size));
    let position = trilaterate(anchors)?;
    Ok((position, hop_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_on_regular_grid() {
        // Node one hop from each corner of a right triangle.
        let beacons = [
            (Point2::new(0.0, 0.0), 1),
            (Point2::new(20.0, 0.0), 1),
            (Point2::new(0.0, 20.0), 1),
        ];
        let (position, hop_size) = estimate_from_hops(beacons).unwrap();

        let perimeter = 20.0 + 20.0 + 800.0f64.sqrt();
        assert!((hop_size - perimeter / 3.0).abs() < 1e-12);
        assert!(position.is_finite());
        // Equal ranges put the estimate on the circumcenter.
        assert!((position.x - 10.0).abs() < 1e-9);
        assert!((position.y - 10.0).abs() < 1e-9);
    }

    #[test]
    fn estimate_propagates_zero_hops() {
        let beacons = [
            (Point2::new(0.0, 0.0), 0),
            (Point2::new(20.0, 0.0), 0),
            (Point2::new(0.0, 20.0), 0),
        ];
        assert_eq!(
            estimate_from_hops(beacons),
            Err(GeometryError::NonPositiveHops(0.0))
        );
    }
}
