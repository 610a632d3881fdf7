//! Render submission
//!
//! The map core never talks to a GPU. Nodes describe what they look like as
//! [`RenderGeometry`] (world space vertices plus primitive type) and hand it
//! to a [`RenderableCollector`] together with a [`ShaderHandle`]; the
//! backend behind the collector owns buffers and draw calls.
//!
//! [`VolumeTest`] lets the backend cull whole nodes by their world bounds
//! before any geometry is built.

pub mod buffer;
pub mod geometry;

use glam::DVec3;

pub use buffer::RenderBuffer;

use crate::math::Aabb;

/// How the vertices of a [`RenderGeometry`] are connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    /// Four vertices per quad.
    Quads,
}

/// A batch of world space vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderGeometry {
    pub primitive: PrimitiveType,
    pub vertices: Vec<DVec3>,
    pub colour: DVec3,
}

impl RenderGeometry {
    #[must_use]
    pub fn new(primitive: PrimitiveType, vertices: Vec<DVec3>, colour: DVec3) -> Self {
        Self {
            primitive,
            vertices,
            colour,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

/// Name of the backend shader a geometry is drawn with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub String);

impl ShaderHandle {
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self(name.to_owned())
    }

    /// The flat colour shader used for entity wireframes, e.g. `<0 1 0>`.
    #[must_use]
    pub fn colour(colour: DVec3) -> Self {
        Self(format!("<{} {} {}>", colour.x, colour.y, colour.z))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Well-known shader names.
pub mod shaders {
    pub const SELECTED_VERTEX: &str = "$SELPOINT";
    pub const DESELECTED_VERTEX: &str = "$POINT";
    pub const TARGET_LINE: &str = "$TARGETLINE";
    pub const CURVE: &str = "$CURVE";
    pub const LIGHT_VOLUME: &str = "$LIGHTVOLUME";
    pub const SPEAKER_RADIUS: &str = "$SPEAKERRADIUS";
}

/// Receives the geometry of the visible nodes.
pub trait RenderableCollector {
    fn add_geometry(&mut self, shader: &ShaderHandle, geometry: RenderGeometry);

    /// True for lit views that draw real materials; entity helpers are
    /// only submitted to views without them.
    fn supports_full_materials(&self) -> bool {
        false
    }
}

/// View volume used for culling.
pub trait VolumeTest {
    /// `aabb` is world space.
    fn test_aabb(&self, aabb: &Aabb) -> bool;
}

/// Accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct InfiniteVolume;

impl VolumeTest for InfiniteVolume {
    fn test_aabb(&self, _aabb: &Aabb) -> bool {
        true
    }
}

/// Accepts boxes that touch a fixed world space box.
#[derive(Debug, Clone, Copy)]
pub struct BoxVolume(pub Aabb);

impl VolumeTest for BoxVolume {
    fn test_aabb(&self, aabb: &Aabb) -> bool {
        self.0.intersects(aabb)
    }
}
