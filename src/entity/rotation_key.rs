//! Entity orientation.
//!
//! Doom 3 stores orientation either as a heading (`angle`, degrees about Z)
//! or as a full matrix (`rotation`, nine floats). The matrix text lists the
//! images of the X, Y and Z axes in that order, which is the column order of
//! [`DMat3`].

use glam::{DMat3, DQuat, DVec3};

use super::angle_key::{AngleKey, format_angle};
use super::spawn_args::SpawnArgs;
use crate::math::{clean_float, format_float, parse_floats};

const PURE_Z_EPSILON: f64 = 1e-6;

/// A rotation as persisted in the `rotation` spawnarg.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationMatrix(pub DMat3);

impl Default for RotationMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl RotationMatrix {
    pub const IDENTITY: Self = Self(DMat3::IDENTITY);

    /// Parses nine floats; anything else is the identity.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        parse_floats::<9>(value).map_or(Self::IDENTITY, |floats| Self(DMat3::from_cols_array(&floats)))
    }

    #[must_use]
    pub fn from_angle(degrees: f64) -> Self {
        Self(DMat3::from_rotation_z(degrees.to_radians()))
    }

    pub fn set_from_angle(&mut self, degrees: f64) {
        *self = Self::from_angle(degrees);
    }

    /// Applies `rotation` after the current rotation.
    pub fn rotate(&mut self, rotation: DQuat) {
        self.0 = DMat3::from_quat(rotation) * self.0;
    }

    #[inline]
    #[must_use]
    pub fn matrix(&self) -> DMat3 {
        self.0
    }

    #[must_use]
    pub fn to_quat(&self) -> DQuat {
        DQuat::from_mat3(&self.0)
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.0.abs_diff_eq(DMat3::IDENTITY, PURE_Z_EPSILON)
    }

    /// The heading in degrees if this is a rotation about Z only.
    #[must_use]
    pub fn z_angle(&self) -> Option<f64> {
        let m = self.0;
        let flat = m.x_axis.z.abs() < PURE_Z_EPSILON
            && m.y_axis.z.abs() < PURE_Z_EPSILON
            && m.z_axis.abs_diff_eq(DVec3::Z, PURE_Z_EPSILON);
        flat.then(|| super::angle_key::normalise_angle(m.x_axis.y.atan2(m.x_axis.x).to_degrees()))
    }

    /// Nine floats, column by column.
    #[must_use]
    pub fn to_key_value(&self) -> String {
        self.0
            .to_cols_array()
            .iter()
            .map(|value| format_float(clean_float(*value)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// The heading as `angle` text, for rotations about Z only.
    #[must_use]
    pub fn to_angle_string(&self) -> Option<String> {
        self.z_angle().map(format_angle)
    }

    /// Writes the matrix to `key`, erasing it for the identity.
    pub fn write_to(&self, spawn_args: &SpawnArgs, key: &str) {
        if self.is_identity() {
            spawn_args.set_key_value(key, "");
        } else {
            spawn_args.set_key_value(key, &self.to_key_value());
        }
    }
}

/// Tracks `angle` and `rotation` together. A set `rotation` wins over
/// `angle`; with neither set the orientation is the identity.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RotationKey {
    angle: Option<f64>,
    rotation: Option<RotationMatrix>,
    current: RotationMatrix,
}

impl RotationKey {
    pub const KEY: &'static str = "rotation";

    pub fn on_angle_changed(&mut self, value: &str) {
        self.angle = (!value.is_empty()).then(|| {
            let mut angle = AngleKey::default();
            angle.on_key_value_changed(value);
            angle.get()
        });
        self.update();
    }

    pub fn on_rotation_changed(&mut self, value: &str) {
        self.rotation = (!value.is_empty()).then(|| RotationMatrix::parse(value));
        self.update();
    }

    #[inline]
    #[must_use]
    pub fn get(&self) -> RotationMatrix {
        self.current
    }

    /// Overrides the orientation until the next key change.
    pub fn set(&mut self, rotation: RotationMatrix) {
        self.current = rotation;
    }

    /// Writes `rotation` in the most compact form. Models always get the
    /// full matrix so their orientation reloads exactly.
    pub fn write(rotation: &RotationMatrix, spawn_args: &SpawnArgs, is_model: bool) {
        match rotation.z_angle() {
            Some(angle) if !is_model => {
                spawn_args.set_key_value(Self::KEY, "");
                spawn_args.set_key_value(AngleKey::KEY, &format_angle(angle));
            }
            _ => {
                spawn_args.set_key_value(AngleKey::KEY, "");
                rotation.write_to(spawn_args, Self::KEY);
            }
        }
    }

    fn update(&mut self) {
        self.current = match (self.rotation, self.angle) {
            (Some(rotation), _) => rotation,
            (None, Some(angle)) => RotationMatrix::from_angle(angle),
            (None, None) => RotationMatrix::IDENTITY,
        };
    }
}
