use glam::DVec3;

/// Evaluates a uniform Catmull-Rom spline through `points` at `t` in
/// `[0, 1]`. The first and last segments reuse their end point as the
/// missing outer neighbour.
#[must_use]
pub fn evaluate(points: &[DVec3], t: f64) -> DVec3 {
    match points {
        [] => DVec3::ZERO,
        [only] => *only,
        _ => {
            let last = points.len() - 1;
            let scaled = t.clamp(0.0, 1.0) * last as f64;
            let segment = (scaled.floor() as usize).min(last - 1);
            let local = scaled - segment as f64;

            let p0 = points[segment.saturating_sub(1)];
            let p1 = points[segment];
            let p2 = points[segment + 1];
            let p3 = points[(segment + 2).min(last)];
            blend(p0, p1, p2, p3, local)
        }
    }
}

fn blend(p0: DVec3, p1: DVec3, p2: DVec3, p3: DVec3, t: f64) -> DVec3 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * (p1 * 2.0
        + (p2 - p0) * t
        + (p0 * 2.0 - p1 * 5.0 + p2 * 4.0 - p3) * t2
        + (p1 * 3.0 - p0 - p2 * 3.0 + p3) * t3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_interior_points() {
        let points = [
            DVec3::ZERO,
            DVec3::new(10.0, 5.0, 0.0),
            DVec3::new(20.0, 0.0, 0.0),
            DVec3::new(30.0, 5.0, 0.0),
        ];
        assert!(evaluate(&points, 1.0 / 3.0).abs_diff_eq(points[1], 1e-9));
        assert!(evaluate(&points, 2.0 / 3.0).abs_diff_eq(points[2], 1e-9));
        assert!(evaluate(&points, 1.0).abs_diff_eq(points[3], 1e-9));
    }
}
