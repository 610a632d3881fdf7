//! Editor Settings
//!
//! [`EntitySettings`] holds the user preferences that influence how entities
//! react to manipulation. A map root owns one instance and hands it to nodes
//! while they evaluate transforms, so several documents can run with
//! different preferences side by side.
//!
//! ```rust,ignore
//! use mapcore::{EntitySettings, MapRoot};
//!
//! let settings = EntitySettings {
//!     drag_resize_symmetrically: false,
//!     ..Default::default()
//! };
//! let map = MapRoot::with_settings(EntityClassRegistry::with_builtin_classes(), settings);
//! ```

/// Default number of undo operations kept per map.
pub const DEFAULT_UNDO_LEVELS: usize = 64;

/// Default tessellation density of curves (segments per control point span).
pub const DEFAULT_CURVE_SUBDIVISIONS: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct EntitySettings {
    /// Drag-resizing a light or speaker grows both opposite faces at once,
    /// keeping the origin in place.
    pub drag_resize_symmetrically: bool,

    /// Segments generated per control point span when tessellating curves.
    pub curve_subdivisions: usize,

    /// Maximum number of operations on the undo stack.
    pub undo_levels: usize,

    /// Grid used to re-snap a projected light's start vertex after it was
    /// pushed back behind the light origin.
    pub light_vertex_snap_grid: f64,
}

impl Default for EntitySettings {
    fn default() -> Self {
        Self {
            drag_resize_symmetrically: true,
            curve_subdivisions: DEFAULT_CURVE_SUBDIVISIONS,
            undo_levels: DEFAULT_UNDO_LEVELS,
            light_vertex_snap_grid: 1.0,
        }
    }
}
