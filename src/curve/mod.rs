//! Curves
//!
//! Entities can carry a NURBS curve (`curve_Nurbs`) and a Catmull-Rom spline
//! (`curve_CatmullRomSpline`) as spawnargs. A [`Curve`] mirrors the
//! committed/working split of entity transforms:
//!
//! - `control_points`: the points parsed from the spawnarg
//! - `transformed`: the working copy mutated while a manipulation runs
//!
//! The tessellated polyline is computed from the working copy on first use
//! and dropped whenever the points change.

pub mod catmull_rom;
pub mod control_points;
pub mod edit_instance;
pub mod nurbs;

use std::cell::{OnceCell, RefCell};

use glam::{DAffine3, DVec3};

pub use control_points::{MIN_CONTROL_POINTS, parse_control_points, write_control_points};
pub use edit_instance::CurveEditInstance;

use crate::entity::SpawnArgs;
use crate::math::Aabb;
use crate::selection::{SelectionChangedFn, SelectionTest, Selector};

pub const CURVE_NURBS_KEY: &str = "curve_Nurbs";
pub const CURVE_CATMULL_ROM_KEY: &str = "curve_CatmullRomSpline";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurveKind {
    Nurbs,
    CatmullRom,
}

impl CurveKind {
    /// The spawnarg holding curves of this kind.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Nurbs => CURVE_NURBS_KEY,
            Self::CatmullRom => CURVE_CATMULL_ROM_KEY,
        }
    }

    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Nurbs => Self::CatmullRom,
            Self::CatmullRom => Self::Nurbs,
        }
    }
}

#[derive(Debug)]
pub struct Curve {
    kind: CurveKind,
    control_points: Vec<DVec3>,
    transformed: Vec<DVec3>,
    weights: Vec<f64>,
    knots: Vec<f64>,
    subdivisions: usize,
    edit: CurveEditInstance,
    tessellation: OnceCell<Vec<DVec3>>,
}

impl Curve {
    #[must_use]
    pub fn new(kind: CurveKind, subdivisions: usize, on_selection_changed: SelectionChangedFn) -> Self {
        Self {
            kind,
            control_points: Vec::new(),
            transformed: Vec::new(),
            weights: Vec::new(),
            knots: Vec::new(),
            subdivisions: subdivisions.max(1),
            edit: CurveEditInstance::new(on_selection_changed),
            tessellation: OnceCell::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> CurveKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.control_points.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.control_points.len()
    }

    #[must_use]
    pub fn control_points(&self) -> &[DVec3] {
        &self.control_points
    }

    #[must_use]
    pub fn transformed_points(&self) -> &[DVec3] {
        &self.transformed
    }

    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    #[must_use]
    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    #[must_use]
    pub fn edit_instance(&self) -> &CurveEditInstance {
        &self.edit
    }

    /// Reloads the curve from its spawnarg value. Empty or malformed values
    /// clear the curve.
    pub fn on_key_value_changed(&mut self, value: &str) {
        match (!value.is_empty()).then(|| parse_control_points(value)).flatten() {
            Some(points) => self.control_points = points,
            None => {
                if !value.is_empty() {
                    log::warn!("Curve: ignoring malformed {} value '{value}'", self.kind.key());
                }
                self.control_points.clear();
            }
        }
        self.update_weighting();
        self.transformed.clone_from(&self.control_points);
        self.curve_changed();
    }

    /// Discards the working copy.
    pub fn revert_transform(&mut self) {
        self.transformed.clone_from(&self.control_points);
        self.invalidate();
    }

    /// Commits the working copy.
    pub fn freeze_transform(&mut self) {
        self.control_points.clone_from(&self.transformed);
        self.update_weighting();
        self.invalidate();
    }

    /// Working points become `matrix` applied to the committed ones.
    pub fn transform(&mut self, matrix: &DAffine3, selected_only: bool) {
        self.edit
            .transform(&self.control_points, &mut self.transformed, matrix, selected_only);
        self.invalidate();
    }

    pub fn snap_selected(&mut self, grid: f64) {
        self.edit.snap_to(&mut self.transformed, grid);
        self.invalidate();
    }

    /// Appends `count` copies of the last point.
    pub fn append_control_points(&mut self, count: usize) {
        let Some(last) = self.control_points.last().copied() else {
            return;
        };
        self.control_points
            .extend(std::iter::repeat_n(last, count));
        self.update_weighting();
        self.transformed.clone_from(&self.control_points);
        self.curve_changed();
    }

    /// Removes the selected points. Refused when fewer than three points
    /// would remain; returns whether anything changed.
    pub fn remove_selected_control_points(&mut self) -> bool {
        let selected = self.edit.selected_indices();
        if selected.is_empty() {
            return false;
        }
        if self.control_points.len() - selected.len() < MIN_CONTROL_POINTS {
            log::error!(
                "Can't remove this many vertices from the {} curve, at least {MIN_CONTROL_POINTS} must remain",
                self.kind.key()
            );
            return false;
        }

        for &index in selected.iter().rev() {
            self.control_points.remove(index);
        }
        self.edit.remove(&selected);
        self.update_weighting();
        self.transformed.clone_from(&self.control_points);
        self.curve_changed();
        true
    }

    /// Inserts a point halfway to its predecessor in front of every
    /// selected point. The first point is skipped; returns whether anything
    /// changed.
    pub fn insert_control_points_at_selected(&mut self) -> bool {
        let targets: Vec<usize> = self
            .edit
            .selected_indices()
            .into_iter()
            .filter(|&index| index > 0)
            .collect();
        if targets.is_empty() {
            return false;
        }

        for &index in targets.iter().rev() {
            let midpoint = (self.control_points[index] + self.control_points[index - 1]) * 0.5;
            self.control_points.insert(index, midpoint);
        }
        self.edit.insert_before(&targets);
        self.update_weighting();
        self.transformed.clone_from(&self.control_points);
        self.curve_changed();
        true
    }

    /// Replaces the point list, e.g. when converting between curve kinds.
    pub fn set_control_points(&mut self, points: Vec<DVec3>) {
        self.control_points = points;
        self.update_weighting();
        self.transformed.clone_from(&self.control_points);
        self.curve_changed();
    }

    /// Polyline through the working points with `subdivisions` segments
    /// per span. End points are copied, not evaluated.
    pub fn tessellation(&self) -> &[DVec3] {
        self.tessellation.get_or_init(|| self.tessellate())
    }

    /// Bounds of the working points.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.transformed.iter().copied())
    }

    #[must_use]
    pub fn selected_bounds(&self) -> Aabb {
        self.edit.selected_bounds(&self.transformed)
    }

    pub fn test_select(&self, selector: &mut dyn Selector, test: &dyn SelectionTest, local_to_world: &DAffine3) {
        self.edit
            .test_select(&self.transformed, selector, test, local_to_world);
    }

    /// Spawnarg value of the working points, empty for an empty curve.
    #[must_use]
    pub fn write_value(&self) -> String {
        write_control_points(&self.transformed)
    }

    /// Writes the working points of `curve` to its spawnarg.
    ///
    /// The curve borrow ends before the spawnarg changes, since observers
    /// of the key reload the same curve.
    pub fn write(curve: &RefCell<Self>, spawn_args: &SpawnArgs) {
        let (key, value) = {
            let curve = curve.borrow();
            (curve.kind.key(), curve.write_value())
        };
        spawn_args.set_key_value(key, &value);
    }

    fn update_weighting(&mut self) {
        if self.kind == CurveKind::Nurbs {
            self.weights = vec![1.0; self.control_points.len()];
            self.knots = if self.control_points.is_empty() {
                Vec::new()
            } else {
                nurbs::open_uniform_knots(self.control_points.len(), nurbs::NURBS_DEGREE)
            };
        }
    }

    fn curve_changed(&mut self) {
        self.edit.resize(self.control_points.len());
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.tessellation.take();
    }

    fn tessellate(&self) -> Vec<DVec3> {
        let points = &self.transformed;
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            return Vec::new();
        };
        let segments = (points.len() - 1) * self.subdivisions;
        if segments == 0 {
            return vec![*first];
        }

        let mut vertices = Vec::with_capacity(segments + 1);
        vertices.push(*first);
        for i in 1..segments {
            let t = i as f64 / segments as f64;
            vertices.push(match self.kind {
                CurveKind::Nurbs => nurbs::evaluate(points, &self.weights, &self.knots, nurbs::NURBS_DEGREE, t),
                CurveKind::CatmullRom => catmull_rom::evaluate(points, t),
            });
        }
        vertices.push(*last);
        vertices
    }
}

/// Capability of entities that own editable curves.
pub trait CurveNode {
    /// True if no curve of either kind has points.
    fn has_empty_curve(&self) -> bool;

    fn append_control_points(&self, count: usize);

    fn remove_selected_control_points(&self);

    fn insert_control_points_at_selected(&self);

    /// Moves the points of the present curve to the other kind.
    fn convert_curve_type(&self);
}
