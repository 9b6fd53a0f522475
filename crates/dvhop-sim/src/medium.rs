//! Range-limited, lossy broadcast medium.

use dvhop_protocol::Point2;
use rand::Rng;

/// Unit-disk radio: every node within `range` of the sender hears a
/// broadcast after `delay_ms`, unless the delivery is lost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Medium {
    pub range: f64,
    pub loss_rate: f64,
    pub delay_ms: u64,
}

impl Medium {
    pub fn new(range: f64, loss_rate: f64, delay_ms: u64) -> Self {
        Self {
            range,
            loss_rate,
            delay_ms,
        }
    }

    /// Whether two nodes hear each other.
    pub fn in_range(&self, a: Point2, b: Point2) -> bool {
        a.distance(&b) <= self.range
    }

    /// Draw whether one delivery survives.
    pub fn delivers(&self, rng: &mut impl Rng) -> bool {
        if self.loss_rate <= 0.0 {
            return true;
        }
        if self.loss_rate >= 1.0 {
            return false;
        }
        !rng.gen_bool(self.loss_rate)
    }

    /// Indices of the nodes that receive a broadcast from `sender`.
    pub fn receivers(
        &self,
        sender: usize,
        positions: &[Point2],
        rng: &mut impl Rng,
    ) -> Vec<usize> {
        let origin = positions[sender];
        positions
            .iter()
            .enumerate()
            .filter(|&(i, p)| i != sender && self.in_range(origin, *p))
            .map(|(i, _)| i)
            .filter(|_| self.delivers(rng))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn line() -> Vec<Point2> {
        (0..5).map(|i| Point2::new(50.0 * f64::from(i), 0.0)).collect()
    }

    #[test]
    fn neighbors_within_range() {
        let medium = Medium::new(75.0, 0.0, 1);
        let mut rng = StdRng::seed_from_u64(0);

        assert_eq!(medium.receivers(0, &line(), &mut rng), vec![1]);
        assert_eq!(medium.receivers(2, &line(), &mut rng), vec![1, 3]);
    }

    #[test]
    fn range_boundary_is_inclusive() {
        let medium = Medium::new(50.0, 0.0, 1);
        assert!(medium.in_range(Point2::ORIGIN, Point2::new(30.0, 40.0)));
        assert!(!medium.in_range(Point2::ORIGIN, Point2::new(30.0, 40.1)));
    }

    #[test]
    fn total_loss_delivers_nothing() {
        let medium = Medium::new(1_000.0, 1.0, 1);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(medium.receivers(0, &line(), &mut rng).is_empty());
    }

    #[test]
    fn partial_loss_is_seeded() {
        let medium = Medium::new(1_000.0, 0.5, 1);
        let a = medium.receivers(0, &line(), &mut StdRng::seed_from_u64(3));
        let b = medium.receivers(0, &line(), &mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
        assert!(a.len() <= 4);
    }
}
