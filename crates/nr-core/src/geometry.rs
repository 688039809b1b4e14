//! 3D geometry helpers over `nalgebra` points.

use serde::{Deserialize, Serialize};

use crate::{CoreError, Real, ensure_finite, ensure_non_negative};

/// Position in model space (length units are whatever the model uses).
pub type Point3 = nalgebra::Point3<Real>;

#[inline]
pub fn point(x: Real, y: Real, z: Real) -> Point3 {
    Point3::new(x, y, z)
}

/// Euclidean distance in 3D.
#[inline]
pub fn distance(a: &Point3, b: &Point3) -> Real {
    nalgebra::distance(a, b)
}

/// True when `a` and `b` lie within `eps` of each other (inclusive).
#[inline]
pub fn coincident(a: &Point3, b: &Point3, eps: Real) -> bool {
    distance(a, b) <= eps
}

pub fn ensure_finite_point(p: &Point3, what: &'static str) -> Result<(), CoreError> {
    ensure_finite(p.x, what)?;
    ensure_finite(p.y, what)?;
    ensure_finite(p.z, what)?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    #[inline]
    pub fn component(self, p: &Point3) -> Real {
        match self {
            Axis::X => p.x,
            Axis::Y => p.y,
            Axis::Z => p.z,
        }
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        };
        f.write_str(s)
    }
}

/// Per-axis absolute tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisTolerance {
    pub x: Real,
    pub y: Real,
    pub z: Real,
}

impl AxisTolerance {
    pub fn uniform(v: Real) -> Self {
        Self { x: v, y: v, z: v }
    }

    pub fn get(&self, axis: Axis) -> Real {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        ensure_non_negative(self.x, "axis_tolerance.x")?;
        ensure_non_negative(self.y, "axis_tolerance.y")?;
        ensure_non_negative(self.z, "axis_tolerance.z")?;
        Ok(())
    }
}

impl Default for AxisTolerance {
    fn default() -> Self {
        Self::uniform(0.01)
    }
}

/// Absolute deviation of `actual` from `reference` along each axis.
pub fn axis_deviations(actual: &Point3, reference: &Point3) -> [(Axis, Real); 3] {
    Axis::ALL.map(|axis| {
        (
            axis,
            (axis.component(actual) - axis.component(reference)).abs(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        let a = point(0.0, 0.0, 0.0);
        let b = point(3.0, 4.0, 12.0);
        assert_eq!(distance(&a, &b), 13.0);
    }

    #[test]
    fn coincident_is_inclusive() {
        let a = point(0.0, 0.0, 0.0);
        let b = point(0.5, 0.0, 0.0);
        assert!(coincident(&a, &b, 0.5));
        assert!(!coincident(&a, &b, 0.25));
    }

    #[test]
    fn axis_deviation_per_component() {
        let devs = axis_deviations(&point(1.0, 2.0, 3.0), &point(1.5, 2.0, 2.0));
        assert_eq!(devs[0], (Axis::X, 0.5));
        assert_eq!(devs[1], (Axis::Y, 0.0));
        assert_eq!(devs[2], (Axis::Z, 1.0));
    }

    #[test]
    fn non_finite_point_rejected() {
        assert!(ensure_finite_point(&point(0.0, Real::NAN, 0.0), "pos").is_err());
    }
}
