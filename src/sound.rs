//! Sound shader defaults for speakers.
//!
//! Speakers store their falloff radii in metres while the editor works in
//! map units. The radii a speaker falls back to come from its sound shader;
//! the map core only reads them through [`SoundManager`].

use rustc_hash::FxHashMap;

pub const METRES_TO_UNITS: f64 = 39.37;

/// Falloff radii in map units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SoundRadii {
    pub min: f64,
    pub max: f64,
}

impl SoundRadii {
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn from_metres(min: f64, max: f64) -> Self {
        Self {
            min: min * METRES_TO_UNITS,
            max: max * METRES_TO_UNITS,
        }
    }

    #[must_use]
    pub fn min_metres(&self) -> f64 {
        self.min / METRES_TO_UNITS
    }

    #[must_use]
    pub fn max_metres(&self) -> f64 {
        self.max / METRES_TO_UNITS
    }
}

/// Read-only access to the sound shaders of the running editor.
pub trait SoundManager {
    /// Default radii of `shader`, `None` for unknown shaders.
    fn shader_radii(&self, shader: &str) -> Option<SoundRadii>;
}

/// An in-memory shader table.
#[derive(Debug, Clone, Default)]
pub struct SoundShaderTable {
    shaders: FxHashMap<String, SoundRadii>,
}

impl SoundShaderTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `shader` with radii in metres.
    #[must_use]
    pub fn with_shader(mut self, shader: &str, min_metres: f64, max_metres: f64) -> Self {
        self.insert(shader, SoundRadii::from_metres(min_metres, max_metres));
        self
    }

    pub fn insert(&mut self, shader: &str, radii: SoundRadii) {
        self.shaders.insert(shader.to_ascii_lowercase(), radii);
    }
}

impl SoundManager for SoundShaderTable {
    fn shader_radii(&self, shader: &str) -> Option<SoundRadii> {
        self.shaders.get(&shader.to_ascii_lowercase()).copied()
    }
}
