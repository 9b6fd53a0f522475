//! Hop-size estimation and closed-form 2D trilateration.
//!
//! The solver places the first reference at the origin of a local frame
//! whose x axis points at the second reference. The third reference fixes
//! the y axis. With ranges `r1..r3` the position in that frame is
//!
//! ```text
//! x = (r1² - r2² + d12²) / (2·d12)
//! y = (r1² - r3² + i² + j²) / (2·j) - i·x / j
//! ```
//!
//! where `d12` is the distance between the first two references and
//! `(i, j)` are the third reference's coordinates in the local frame.

use crate::error::{GeometryError, Result};
use crate::point::Point2;

/// Separations below this are treated as zero.
pub const DEGENERACY_EPSILON: f64 = 1e-9;

/// A reference point with an estimated range to the unknown position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangedAnchor {
    /// Known position of the reference.
    pub position: Point2,
    /// Estimated distance from the reference to the unknown position.
    pub range: f64,
}

impl RangedAnchor {
    /// Create a ranged anchor.
    pub const fn new(position: Point2, range: f64) -> Self {
        Self { position, range }
    }
}

/// Mean of three hop counts.
pub fn mean_hops(hops: [u16; 3]) -> f64 {
    (f64::from(hops[0]) + f64::from(hops[1]) + f64::from(hops[2])) / 3.0
}

/// Average distance covered by one hop.
///
/// The perimeter of the triangle spanned by the three references is split
/// over three times the mean hop count.
pub fn average_hop_size(references: [Point2; 3], avg_hops: f64) -> Result<f64> {
    if !avg_hops.is_finite() {
        return Err(GeometryError::NonFinite("average hop count"));
    }
    if avg_hops <= 0.0 {
        return Err(GeometryError::NonPositiveHops(avg_hops));
    }
    let [b1, b2, b3] = references;
    let perimeter = b1.distance(&b2) + b2.distance(&b3) + b3.distance(&b1);
    let size = perimeter / (3.0 * avg_hops);
    if !size.is_finite() {
        return Err(GeometryError::NonFinite("average hop size"));
    }
    Ok(size)
}

/// Solve for the position at the given ranges from three references.
///
/// Coincident or colinear references leave the system underdetermined and
/// are rejected instead of producing NaN or infinite coordinates.
pub fn trilaterate(anchors: [RangedAnchor; 3]) -> Result<Point2> {
    let [a1, a2, a3] = anchors;
    if anchors.iter().any(|a| !a.position.is_finite() || !a.range.is_finite()) {
        return Err(GeometryError::NonFinite("trilateration input"));
    }

    let p1 = a1.position;
    let d12 = a2.position.distance(&p1);
    if d12 <= DEGENERACY_EPSILON {
        return Err(GeometryError::CoincidentReferences { separation: d12 });
    }
    let ex = (a2.position - p1) / d12;

    let a = a3.position - p1;
    let i = ex.dot(&a);

    let perp = a - ex * i;
    let perp_norm = perp.norm();
    if perp_norm <= DEGENERACY_EPSILON {
        return Err(GeometryError::CollinearReferences { offset: perp_norm });
    }
    let ey = perp / perp_norm;
    let j = ey.dot(&a);
    if j.abs() <= DEGENERACY_EPSILON {
        return Err(GeometryError::CollinearReferences { offset: j });
    }

    let (r1, r2, r3) = (a1.range, a2.range, a3.range);
    let x = (r1.powi(2) - r2.powi(2) + d12.powi(2)) / (2.0 * d12);
    let y = (r1.powi(2) - r3.powi(2) + i.powi(2) + j.powi(2)) / (2.0 * j) - i * x / j;

    let position = p1 + ex * x + ey * y;
    if !position.is_finite() {
        return Err(GeometryError::NonFinite("trilateration result"));
    }
    Ok(position)
}
