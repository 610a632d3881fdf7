//! Control point lists in spawnarg form.
//!
//! Two layouts are read:
//! - `3 ( 0 0 0 64 0 0 64 64 0 )`, the form the game and the editor write
//! - `3 0 0 0 64 0 0 64 64 0`, optionally with the degree after the count
//!
//! Only the parenthesised form is written.

use glam::DVec3;

use crate::math::{format_float, parse_float};

/// Minimum number of control points of a valid curve.
pub const MIN_CONTROL_POINTS: usize = 3;

/// Parses a control point list. Fewer than [`MIN_CONTROL_POINTS`] points or
/// any malformed coordinate rejects the whole value.
#[must_use]
pub fn parse_control_points(value: &str) -> Option<Vec<DVec3>> {
    let tokens: Vec<&str> = value.split_whitespace().collect();
    let (count, rest) = tokens.split_first()?;
    let count: usize = count.parse().ok()?;
    if count < MIN_CONTROL_POINTS {
        return None;
    }

    let coordinates = match rest {
        ["(", inner @ .., ")"] => inner,
        ["(", ..] => return None,
        flat if flat.len() == count * 3 => flat,
        [degree, flat @ ..] if flat.len() == count * 3 && degree.parse::<usize>().is_ok() => flat,
        _ => return None,
    };
    if coordinates.len() != count * 3 {
        return None;
    }

    coordinates
        .chunks_exact(3)
        .map(|xyz| Some(DVec3::new(parse_float(xyz[0])?, parse_float(xyz[1])?, parse_float(xyz[2])?)))
        .collect()
}

/// Writes `points` as `N ( x y z ... )`; an empty list writes nothing.
#[must_use]
pub fn write_control_points(points: &[DVec3]) -> String {
    if points.is_empty() {
        return String::new();
    }
    let mut value = format!("{} (", points.len());
    for point in points {
        value.push(' ');
        value.push_str(&format_float(point.x));
        value.push(' ');
        value.push_str(&format_float(point.y));
        value.push(' ');
        value.push_str(&format_float(point.z));
    }
    value.push_str(" )");
    value
}
