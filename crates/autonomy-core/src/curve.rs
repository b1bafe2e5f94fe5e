//! Tuned Response Curves
//!
//! Piecewise-linear curves used for attention cost, desire bonus and group size.

use serde::{Deserialize, Serialize};

/// Piecewise-linear curve over sorted `(x, y)` points, clamped at both ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Curve {
    points: Vec<(f32, f32)>,
}

impl Curve {
    /// Builds a curve, sorting points by x.
    pub fn new(mut points: Vec<(f32, f32)>) -> Self {
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { points }
    }

    /// A curve returning `value` everywhere.
    pub fn constant(value: f32) -> Self {
        Self {
            points: vec![(0.0, value)],
        }
    }

    pub fn points(&self) -> &[(f32, f32)] {
        &self.points
    }

    /// Samples the curve at `x`.
    ///
    /// Returns `None` for an empty curve or a non-finite input, so callers can
    /// treat the term as not applicable instead of propagating NaN.
    pub fn sample(&self, x: f32) -> Option<f32> {
        if !x.is_finite() {
            return None;
        }
        let first = self.points.first()?;
        if x <= first.0 {
            return Some(first.1);
        }

        for window in self.points.windows(2) {
            let (x0, y0) = window[0];
            let (x1, y1) = window[1];
            if x > x1 {
                continue;
            }
            let width = x1 - x0;
            if width <= 0.0 {
                return Some(y1);
            }
            let t = (x - x0) / width;
            return Some(y0 + (y1 - y0) * t);
        }

        self.points.last().map(|p| p.1)
    }

    /// Samples the curve, falling back to `default` when not applicable.
    pub fn sample_or(&self, x: f32, default: f32) -> f32 {
        self.sample(x).unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolates_between_points() {
        let curve = Curve::new(vec![(0.0, 1.0), (2.0, 0.0)]);
        assert_eq!(curve.sample(1.0), Some(0.5));
    }

    #[test]
    fn test_clamps_outside_range() {
        let curve = Curve::new(vec![(1.0, 0.25), (3.0, 0.75)]);
        assert_eq!(curve.sample(-5.0), Some(0.25));
        assert_eq!(curve.sample(10.0), Some(0.75));
    }

    #[test]
    fn test_zero_width_interval_does_not_divide() {
        let curve = Curve::new(vec![(0.0, 0.0), (1.0, 0.2), (1.0, 0.8)]);
        let value = curve.sample(1.0).unwrap();
        assert!(value.is_finite());
    }

    #[test]
    fn test_empty_curve_and_nan_input() {
        let empty = Curve::new(Vec::new());
        assert_eq!(empty.sample(1.0), None);
        assert_eq!(empty.sample_or(1.0, 3.0), 3.0);

        let curve = Curve::constant(1.0);
        assert_eq!(curve.sample(f32::NAN), None);
    }

    #[test]
    fn test_unsorted_points_are_sorted() {
        let curve = Curve::new(vec![(2.0, 4.0), (0.0, 0.0)]);
        assert_eq!(curve.sample(1.0), Some(2.0));
    }
}
