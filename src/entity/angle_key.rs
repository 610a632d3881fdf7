use glam::{DMat3, DQuat};

use super::spawn_args::SpawnArgs;
use crate::math::{format_float, parse_float};

/// The `angle` spawnarg: a rotation about Z in degrees, kept in `[0, 360)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AngleKey {
    angle: f64,
}

impl AngleKey {
    pub const KEY: &'static str = "angle";

    #[must_use]
    pub fn new(angle: f64) -> Self {
        Self {
            angle: normalise_angle(angle),
        }
    }

    /// Malformed values read as 0.
    pub fn on_key_value_changed(&mut self, value: &str) {
        self.angle = normalise_angle(parse_float(value).unwrap_or(0.0));
    }

    #[inline]
    #[must_use]
    pub fn get(&self) -> f64 {
        self.angle
    }

    pub fn set(&mut self, angle: f64) {
        self.angle = normalise_angle(angle);
    }

    /// Writes the angle, erasing the key for 0.
    pub fn write(&self, spawn_args: &SpawnArgs) {
        spawn_args.set_key_value(Self::KEY, &format_angle(self.angle));
    }

    /// The Z angle left after applying `rotation` on top of a Z rotation by
    /// `angle` degrees. Tilt out of the XY plane is dropped.
    #[must_use]
    pub fn rotated_value(angle: f64, rotation: DQuat) -> f64 {
        let matrix = DMat3::from_quat(rotation) * DMat3::from_rotation_z(angle.to_radians());
        let x_axis = matrix.x_axis;
        let z = if x_axis.x.abs() < 1e-12 && x_axis.y.abs() < 1e-12 {
            // x axis points straight up or down, read the heading off y
            (-matrix.y_axis.x).atan2(matrix.y_axis.y)
        } else {
            x_axis.y.atan2(x_axis.x)
        };
        normalise_angle(z.to_degrees())
    }
}

/// Wraps `angle` into `[0, 360)`.
#[must_use]
pub fn normalise_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Spawnarg text of an angle rounded to six decimals; empty for 0.
#[must_use]
pub fn format_angle(angle: f64) -> String {
    let rounded = (angle * 1e6).round() / 1e6;
    let rounded = normalise_angle(rounded);
    if rounded == 0.0 {
        String::new()
    } else {
        format_float(rounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalises_into_range() {
        let mut key = AngleKey::default();
        key.on_key_value_changed("-90");
        assert_eq!(key.get(), 270.0);
        key.on_key_value_changed("720");
        assert_eq!(key.get(), 0.0);
        key.on_key_value_changed("north");
        assert_eq!(key.get(), 0.0);
        assert_eq!(normalise_angle(-1e-20), 0.0);
    }

    #[test]
    fn rotated_value_composes_z_rotations() {
        let rotated = AngleKey::rotated_value(45.0, DQuat::from_rotation_z(90f64.to_radians()));
        assert!((rotated - 135.0).abs() < 1e-9);
        let wrapped = AngleKey::rotated_value(300.0, DQuat::from_rotation_z(90f64.to_radians()));
        assert!((wrapped - 30.0).abs() < 1e-9);
    }

    #[test]
    fn zero_angle_formats_empty() {
        assert_eq!(format_angle(0.0), "");
        assert_eq!(format_angle(359.999_999_9), "");
        assert_eq!(format_angle(90.000_000_01), "90");
    }
}
