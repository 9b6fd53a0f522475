//! Position estimation from the distance table.

use dvhop_geometry::{estimate_from_hops, GeometryError, Point2};
use dvhop_table::{BeaconId, DistanceTable};

/// Number of beacons a position fix needs.
pub const REQUIRED_BEACONS: usize = 3;

/// Pick the three closest beacons from `candidates` (in table order).
///
/// Runs three rounds. Each round scans every candidate not yet picked and
/// takes it whenever its hop count is `<=` the best seen so far in that
/// round, so among equal hop counts the last one scanned wins.
///
/// Returns indices into `candidates`, or `None` with fewer than three.
pub fn select_closest(candidates: &[(BeaconId, u16)]) -> Option<[usize; REQUIRED_BEACONS]> {
    if candidates.len() < REQUIRED_BEACONS {
        return None;
    }

    let mut picked = [usize::MAX; REQUIRED_BEACONS];
    for round in 0..REQUIRED_BEACONS {
        let mut best = u32::MAX;
        let mut choice = None;
        for (i, (_, hops)) in candidates.iter().enumerate() {
            if picked[..round].contains(&i) {
                continue;
            }
            if u32::from(*hops) <= best {
                best = u32::from(*hops);
                choice = Some(i);
            }
        }
        picked[round] = choice?;
    }
    Some(picked)
}

/// A successful position fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    /// Beacons used, in selection order.
    pub beacons: [BeaconId; REQUIRED_BEACONS],
    /// Their hop counts.
    pub hops: [u16; REQUIRED_BEACONS],
    /// Average distance per hop derived from the beacon triangle.
    pub hop_size: f64,
    /// Estimated position.
    pub position: Point2,
}

/// Outcome of one estimation cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Estimation {
    /// Not enough beacons known yet.
    InsufficientBeacons {
        /// Beacons currently in the table.
        known: usize,
    },
    /// A new position was computed.
    Estimated(Estimate),
    /// The selected beacons form degenerate geometry.
    Rejected(GeometryError),
}

/// Run closest-beacon selection and trilateration over a table.
pub fn estimate(table: &DistanceTable) -> Estimation {
    let candidates: Vec<(BeaconId, u16)> = table.iter().map(|(b, r)| (*b, r.hops)).collect();

    let Some(picked) = select_closest(&candidates) else {
        return Estimation::InsufficientBeacons {
            known: candidates.len(),
        };
    };

    let beacons = picked.map(|i| candidates[i].0);
    let hops = picked.map(|i| candidates[i].1);
    let anchors = picked.map(|i| (table.position_of(&candidates[i].0), candidates[i].1));

    match estimate_from_hops(anchors) {
        Ok((position, hop_size)) => Estimation::Estimated(Estimate {
            beacons,
            hops,
            hop_size,
            position,
        }),
        Err(e) => Estimation::Rejected(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dvhop_table::Timestamp;
    use std::net::Ipv4Addr;

    fn beacon(last: u8) -> BeaconId {
        BeaconId::new(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn fewer_than_three_candidates() {
        assert_eq!(select_closest(&[]), None);
        assert_eq!(select_closest(&[(beacon(1), 1), (beacon(2), 2)]), None);
    }

    #[test]
    fn picks_smallest_hop_counts() {
        let candidates = [
            (beacon(1), 4),
            (beacon(2), 1),
            (beacon(3), 6),
            (beacon(4), 2),
            (beacon(5), 3),
        ];
        assert_eq!(select_closest(&candidates), Some([1, 3, 4]));
    }

    #[test]
    fn last_scanned_tie_wins() {
        let candidates = [(beacon(1), 2), (beacon(2), 2), (beacon(3), 2), (beacon(4), 2)];
        // Round 1 ends on index 3, round 2 on index 2, round 3 on index 1.
        assert_eq!(select_closest(&candidates), Some([3, 2, 1]));
    }

    #[test]
    fn max_hop_counts_still_selected() {
        let candidates = [(beacon(1), u16::MAX), (beacon(2), u16::MAX), (beacon(3), u16::MAX)];
        assert_eq!(select_closest(&candidates), Some([2, 1, 0]));
    }

    #[test]
    fn estimate_needs_three_beacons() {
        let mut table = DistanceTable::new();
        table.add_or_refresh(beacon(1), 1, Point2::new(0.0, 0.0), Timestamp::ZERO);
        table.add_or_refresh(beacon(2), 1, Point2::new(20.0, 0.0), Timestamp::ZERO);

        assert_eq!(estimate(&table), Estimation::InsufficientBeacons { known: 2 });
    }

    #[test]
    fn estimate_from_table() {
        let mut table = DistanceTable::new();
        table.add_or_refresh(beacon(1), 1, Point2::new(0.0, 0.0), Timestamp::ZERO);
        table.add_or_refresh(beacon(2), 1, Point2::new(20.0, 0.0), Timestamp::ZERO);
        table.add_or_refresh(beacon(3), 1, Point2::new(0.0, 20.0), Timestamp::ZERO);
        // Far beacon is never selected.
        table.add_or_refresh(beacon(9), 8, Point2::new(500.0, 500.0), Timestamp::ZERO);

        let Estimation::Estimated(fix) = estimate(&table) else {
            panic!("expected a position fix");
        };
        assert!(!fix.beacons.contains(&beacon(9)));
        assert_eq!(fix.hops, [1, 1, 1]);
        assert!((fix.position.x - 10.0).abs() < 1e-9);
        assert!((fix.position.y - 10.0).abs() < 1e-9);
    }

    #[test]
    fn colinear_beacons_rejected() {
        let mut table = DistanceTable::new();
        table.add_or_refresh(beacon(1), 1, Point2::new(0.0, 0.0), Timestamp::ZERO);
        table.add_or_refresh(beacon(2), 2, Point2::new(10.0, 0.0), Timestamp::ZERO);
        table.add_or_refresh(beacon(3), 3, Point2::new(20.0, 0.0), Timestamp::ZERO);

        assert!(matches!(estimate(&table), Estimation::Rejected(_)));
    }
}
