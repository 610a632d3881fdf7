//! Rational B-spline evaluation.

use glam::DVec3;

/// Degree of every NURBS curve the editor creates.
pub const NURBS_DEGREE: usize = 3;

/// Knot vector of `count + degree + 1` values running uniformly from 0 to 1,
/// with a single knot at each end.
#[must_use]
pub fn open_uniform_knots(count: usize, degree: usize) -> Vec<f64> {
    const EQUAL_KNOTS: usize = 1;

    let len = count + degree + 1;
    let divisor = len.saturating_sub(EQUAL_KNOTS * 2 + 1).max(1) as f64;
    (0..len)
        .map(|i| {
            if i < EQUAL_KNOTS {
                0.0
            } else if i >= len - EQUAL_KNOTS {
                1.0
            } else {
                (i - EQUAL_KNOTS) as f64 / divisor
            }
        })
        .collect()
}

/// Cox-de Boor recursion for the basis function `i` of the given degree.
#[must_use]
pub fn basis(knots: &[f64], i: usize, degree: usize, t: f64) -> f64 {
    if degree == 0 {
        return if knots[i] <= t && t < knots[i + 1] && knots[i] < knots[i + 1] {
            1.0
        } else {
            0.0
        };
    }

    let left_denom = knots[i + degree] - knots[i];
    let left = if left_denom == 0.0 {
        0.0
    } else {
        (t - knots[i]) / left_denom * basis(knots, i, degree - 1, t)
    };

    let right_denom = knots[i + degree + 1] - knots[i + 1];
    let right = if right_denom == 0.0 {
        0.0
    } else {
        (knots[i + degree + 1] - t) / right_denom * basis(knots, i + 1, degree - 1, t)
    };

    left + right
}

/// Evaluates the curve at `t` in `[0, 1)`.
///
/// `weights` must hold one entry per point and `knots` must come from
/// [`open_uniform_knots`] for the same point count and degree.
#[must_use]
pub fn evaluate(points: &[DVec3], weights: &[f64], knots: &[f64], degree: usize, t: f64) -> DVec3 {
    let mut numerator = DVec3::ZERO;
    let mut denominator = 0.0;
    for (i, (point, weight)) in points.iter().zip(weights).enumerate() {
        let factor = basis(knots, i, degree, t) * weight;
        numerator += *point * factor;
        denominator += factor;
    }
    if denominator == 0.0 {
        return points.first().copied().unwrap_or_default();
    }
    numerator / denominator
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn knot_vector_shape() {
        let knots = open_uniform_knots(4, 3);
        assert_eq!(knots.len(), 8);
        assert_eq!(knots[0], 0.0);
        assert_eq!(knots[7], 1.0);
        assert!(knots.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn collinear_points_stay_on_the_line() {
        let points: Vec<DVec3> = (0..5).map(|i| DVec3::new(f64::from(i) * 10.0, 0.0, 0.0)).collect();
        let weights = vec![1.0; points.len()];
        let knots = open_uniform_knots(points.len(), NURBS_DEGREE);
        for step in 1..10 {
            let point = evaluate(&points, &weights, &knots, NURBS_DEGREE, f64::from(step) / 10.0);
            assert!(point.y.abs() < 1e-9 && point.z.abs() < 1e-9);
            assert!((0.0..=40.0).contains(&point.x));
        }
    }
}
