use crate::CoreError;

/// Floating point type used throughout the engine.
pub type Real = f64;

/// Absolute/relative tolerance pair for comparing computed magnitudes.
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// Finite and `>= 0`. Used for tolerances and thresholds.
pub fn ensure_non_negative(v: Real, what: &'static str) -> Result<Real, CoreError> {
    let v = ensure_finite(v, what)?;
    if v < 0.0 {
        return Err(CoreError::Negative { what, value: v });
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearly_equal_basic() {
        let tol = Tolerances::default();
        assert!(nearly_equal(0.08, 0.1 - 0.02, tol));
        assert!(nearly_equal(0.0, 1e-13, tol));
        assert!(!nearly_equal(1.0, 1.0 + 1e-6, tol));
    }

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(Real::NAN, "slope").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("Non-finite"));
    }

    #[test]
    fn ensure_non_negative_rejects_negative() {
        assert!(ensure_non_negative(0.0, "eps").is_ok());
        assert!(matches!(
            ensure_non_negative(-0.01, "eps"),
            Err(CoreError::Negative { .. })
        ));
        assert!(ensure_non_negative(Real::INFINITY, "eps").is_err());
    }
}
