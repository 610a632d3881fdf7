use glam::DVec3;

use super::spawn_args::SpawnArgs;
use crate::math::{clean_float, format_vec3, parse_vec3, snap_vec3};

/// Parsed form of the `origin` spawnarg. Malformed values read as the
/// world origin.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OriginKey {
    origin: DVec3,
}

impl OriginKey {
    pub const KEY: &'static str = "origin";

    #[must_use]
    pub fn new(origin: DVec3) -> Self {
        Self { origin }
    }

    pub fn on_key_value_changed(&mut self, value: &str) {
        self.origin = parse_vec3(value).unwrap_or(DVec3::ZERO);
    }

    #[inline]
    #[must_use]
    pub fn get(&self) -> DVec3 {
        self.origin
    }

    #[inline]
    pub fn set(&mut self, origin: DVec3) {
        self.origin = origin;
    }

    pub fn snap(&mut self, grid: f64) {
        self.origin = snap_vec3(self.origin, grid);
    }

    pub fn write(&self, spawn_args: &SpawnArgs) {
        let origin = DVec3::from_array(self.origin.to_array().map(clean_float));
        spawn_args.set_key_value(Self::KEY, &format_vec3(origin));
    }
}
