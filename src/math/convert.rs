//! Conversions between spawnarg text and numbers.
//!
//! Parsing is strict about arity but never fails loudly: callers decide on
//! the fallback. Formatting uses the shortest representation that parses
//! back to the identical `f64`, so values survive any number of
//! write/read cycles. Very large and very small magnitudes are written in
//! exponent form.

use glam::DVec3;

/// Magnitudes outside `[EXPONENT_BELOW, EXPONENT_FROM)` use exponent form.
const EXPONENT_BELOW: f64 = 1e-5;
const EXPONENT_FROM: f64 = 1e16;

/// Distance from an integer that [`clean_float`] treats as rounding noise.
const NOISE_EPSILON: f64 = 1e-9;

/// Parses a single finite float, ignoring surrounding whitespace.
#[must_use]
pub fn parse_float(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses exactly three whitespace separated floats.
#[must_use]
pub fn parse_vec3(value: &str) -> Option<DVec3> {
    let mut tokens = value.split_whitespace();
    let x = parse_float(tokens.next()?)?;
    let y = parse_float(tokens.next()?)?;
    let z = parse_float(tokens.next()?)?;
    if tokens.next().is_some() {
        return None;
    }
    Some(DVec3::new(x, y, z))
}

/// Parses exactly `N` whitespace separated floats.
#[must_use]
pub fn parse_floats<const N: usize>(value: &str) -> Option<[f64; N]> {
    let mut result = [0.0; N];
    let mut tokens = value.split_whitespace();
    for slot in &mut result {
        *slot = parse_float(tokens.next()?)?;
    }
    if tokens.next().is_some() {
        return None;
    }
    Some(result)
}

/// Lossless float formatting, `-0` is written as `0`.
#[must_use]
pub fn format_float(value: f64) -> String {
    // -0.0 + 0.0 == +0.0
    let value = value + 0.0;
    let magnitude = value.abs();
    if value == 0.0 || (EXPONENT_BELOW..EXPONENT_FROM).contains(&magnitude) {
        format!("{value}")
    } else {
        format!("{value:e}")
    }
}

/// Snaps `value` to the nearest integer when it is only rounding noise away
/// from it, as left behind by rotations and other matrix products.
#[must_use]
pub fn clean_float(value: f64) -> f64 {
    let rounded = value.round();
    if (value - rounded).abs() < NOISE_EPSILON {
        rounded + 0.0
    } else {
        value
    }
}

#[must_use]
pub fn format_vec3(value: DVec3) -> String {
    format!(
        "{} {} {}",
        format_float(value.x),
        format_float(value.y),
        format_float(value.z)
    )
}

/// Rounds `value` to the nearest multiple of `grid`. A non-positive grid
/// leaves the value unchanged.
#[must_use]
pub fn snap_float(value: f64, grid: f64) -> f64 {
    if grid <= 0.0 {
        return value;
    }
    (value / grid + 0.5).floor() * grid
}

#[must_use]
pub fn snap_vec3(value: DVec3, grid: f64) -> DVec3 {
    DVec3::new(
        snap_float(value.x, grid),
        snap_float(value.y, grid),
        snap_float(value.z, grid),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec3_requires_three_components() {
        assert_eq!(parse_vec3("1 2 3"), Some(DVec3::new(1.0, 2.0, 3.0)));
        assert_eq!(parse_vec3("  -1.5\t0 4e2 "), Some(DVec3::new(-1.5, 0.0, 400.0)));
        assert_eq!(parse_vec3("1 2"), None);
        assert_eq!(parse_vec3("1 2 3 4"), None);
        assert_eq!(parse_vec3("1 two 3"), None);
        assert_eq!(parse_vec3("nan 0 0"), None);
    }

    #[test]
    fn formatting_is_lossless() {
        for value in [0.1, 1.0 / 3.0, -1234.5678, 1e-7, 65536.0] {
            assert_eq!(parse_float(&format_float(value)), Some(value));
        }
        assert_eq!(format_float(-0.0), "0");
        assert_eq!(format_float(10.0), "10");
        assert_eq!(format_vec3(DVec3::new(10.0, 0.0, -0.5)), "10 0 -0.5");
    }

    #[test]
    fn extreme_magnitudes_use_exponent_form() {
        assert_eq!(format_float(1e300), "1e300");
        assert_eq!(format_float(-2.5e-300), "-2.5e-300");
        assert_eq!(format_float(f64::EPSILON), "2.220446049250313e-16");
        assert_eq!(format_float(0.00001), "0.00001");
        assert_eq!(format_float(123_456_789.25), "123456789.25");
        for value in [1e300, -2.5e-300, f64::EPSILON, f64::MAX, f64::MIN_POSITIVE, 1e16] {
            assert_eq!(parse_float(&format_float(value)), Some(value));
        }
    }

    #[test]
    fn cleaning_drops_rotation_noise() {
        let rotated = glam::DQuat::from_rotation_z(std::f64::consts::FRAC_PI_2) * DVec3::new(10.0, 0.0, 0.0);
        assert_eq!(clean_float(rotated.x), 0.0);
        assert_eq!(clean_float(rotated.y), 10.0);
        assert_eq!(clean_float(-1e-12), 0.0);
        assert_eq!(format_float(clean_float(-1e-12)), "0");
        assert_eq!(clean_float(63.999_999_999_999_99), 64.0);
        assert_eq!(clean_float(0.5), 0.5);
        assert_eq!(clean_float(1e-7), 1e-7);
    }

    #[test]
    fn fixed_float_lists_require_exact_arity() {
        assert_eq!(
            parse_floats::<9>("1 0 0 0 1 0 0 0 1"),
            Some([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
        );
        assert_eq!(parse_floats::<2>(" 0.5\t-3 "), Some([0.5, -3.0]));
        assert_eq!(parse_floats::<9>("1 0 0 0 1 0 0 0"), None);
        assert_eq!(parse_floats::<2>("1 2 3"), None);
        assert_eq!(parse_floats::<2>("1 inf"), None);
    }

    #[test]
    fn snapping_rounds_to_nearest() {
        assert_eq!(snap_float(3.9, 8.0), 0.0);
        assert_eq!(snap_float(4.0, 8.0), 8.0);
        assert_eq!(snap_float(-5.0, 8.0), -8.0);
        assert_eq!(snap_float(7.3, 0.0), 7.3);
    }
}
