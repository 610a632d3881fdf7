//! Builders for the helper shapes entities draw.

use glam::{DAffine3, DVec3};

use super::{PrimitiveType, RenderGeometry};
use crate::math::Aabb;

/// Corner pairs of the twelve box edges, in [`Aabb::corners`] order.
const BOX_EDGES: [(usize, usize); 12] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 0),
    (4, 5),
    (5, 6),
    (6, 7),
    (7, 4),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

/// Corner quads of the six box faces, in [`Aabb::planes`] order.
const BOX_FACES: [[usize; 4]; 6] = [
    [1, 2, 6, 5],
    [0, 4, 7, 3],
    [0, 1, 5, 4],
    [2, 3, 7, 6],
    [0, 3, 2, 1],
    [4, 5, 6, 7],
];

fn world_corners(aabb: &Aabb, local_to_world: &DAffine3) -> [DVec3; 8] {
    aabb.corners().map(|corner| local_to_world.transform_point3(corner))
}

/// The twelve edges of `aabb` as a line list.
#[must_use]
pub fn aabb_wireframe(aabb: &Aabb, local_to_world: &DAffine3, colour: DVec3) -> RenderGeometry {
    let corners = world_corners(aabb, local_to_world);
    let vertices = BOX_EDGES
        .iter()
        .flat_map(|&(a, b)| [corners[a], corners[b]])
        .collect();
    RenderGeometry::new(PrimitiveType::Lines, vertices, colour)
}

/// The six faces of `aabb` as quads.
#[must_use]
pub fn aabb_solid(aabb: &Aabb, local_to_world: &DAffine3, colour: DVec3) -> RenderGeometry {
    let corners = world_corners(aabb, local_to_world);
    let vertices = BOX_FACES.iter().flatten().map(|&index| corners[index]).collect();
    RenderGeometry::new(PrimitiveType::Quads, vertices, colour)
}

/// The diamond drawn for point lights, inscribed in `aabb`.
#[must_use]
pub fn octahedron(aabb: &Aabb, local_to_world: &DAffine3, colour: DVec3) -> RenderGeometry {
    let o = aabb.origin;
    let e = aabb.extents;
    let tips = [
        o + DVec3::new(0.0, 0.0, e.z),
        o - DVec3::new(0.0, 0.0, e.z),
    ];
    let ring = [
        o + DVec3::new(e.x, 0.0, 0.0),
        o + DVec3::new(0.0, e.y, 0.0),
        o - DVec3::new(e.x, 0.0, 0.0),
        o - DVec3::new(0.0, e.y, 0.0),
    ];

    let mut vertices = Vec::with_capacity(24);
    for i in 0..ring.len() {
        let next = ring[(i + 1) % ring.len()];
        vertices.extend([ring[i], next]);
        for tip in tips {
            vertices.extend([ring[i], tip]);
        }
    }
    let vertices = vertices
        .into_iter()
        .map(|vertex| local_to_world.transform_point3(vertex))
        .collect();
    RenderGeometry::new(PrimitiveType::Lines, vertices, colour)
}

/// A line from `start` along `direction` with a small head.
#[must_use]
pub fn arrow(start: DVec3, direction: DVec3, length: f64, colour: DVec3) -> RenderGeometry {
    let direction = direction.normalize_or_zero();
    if direction == DVec3::ZERO {
        return RenderGeometry::new(PrimitiveType::Lines, Vec::new(), colour);
    }
    let end = start + direction * length;
    let side = direction.any_orthonormal_vector() * (length * 0.125);
    let back = end - direction * (length * 0.25);
    RenderGeometry::new(
        PrimitiveType::Lines,
        vec![start, end, end, back + side, end, back - side],
        colour,
    )
}

/// Three axis circles of radius `radius` around `centre`, as a line list.
#[must_use]
pub fn sphere_wireframe(centre: DVec3, radius: f64, colour: DVec3) -> RenderGeometry {
    const SEGMENTS: usize = 32;
    let planes = [(DVec3::X, DVec3::Y), (DVec3::X, DVec3::Z), (DVec3::Y, DVec3::Z)];

    let mut vertices = Vec::with_capacity(planes.len() * SEGMENTS * 2);
    for (u, v) in planes {
        let point = |i: usize| {
            let angle = std::f64::consts::TAU * i as f64 / SEGMENTS as f64;
            centre + (u * angle.cos() + v * angle.sin()) * radius
        };
        for i in 0..SEGMENTS {
            vertices.extend([point(i), point(i + 1)]);
        }
    }
    RenderGeometry::new(PrimitiveType::Lines, vertices, colour)
}

#[must_use]
pub fn points(points: impl IntoIterator<Item = DVec3>, colour: DVec3) -> RenderGeometry {
    RenderGeometry::new(PrimitiveType::Points, points.into_iter().collect(), colour)
}

#[must_use]
pub fn line_strip(points: impl IntoIterator<Item = DVec3>, colour: DVec3) -> RenderGeometry {
    RenderGeometry::new(PrimitiveType::LineStrip, points.into_iter().collect(), colour)
}

/// The frustum of a projected light: lines from the origin through the
/// four corners of the far plane, plus the far rectangle.
#[must_use]
pub fn light_frustum(
    target: DVec3,
    up: DVec3,
    right: DVec3,
    local_to_world: &DAffine3,
    colour: DVec3,
) -> RenderGeometry {
    let far = [
        target + up + right,
        target + up - right,
        target - up - right,
        target - up + right,
    ];
    let mut vertices = Vec::with_capacity(16);
    for i in 0..far.len() {
        vertices.extend([DVec3::ZERO, far[i]]);
        vertices.extend([far[i], far[(i + 1) % far.len()]]);
    }
    let vertices = vertices
        .into_iter()
        .map(|vertex| local_to_world.transform_point3(vertex))
        .collect();
    RenderGeometry::new(PrimitiveType::Lines, vertices, colour)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wireframe_box_has_twelve_edges() {
        let aabb = Aabb::new(DVec3::ZERO, DVec3::splat(8.0));
        let translate = DAffine3::from_translation(DVec3::new(100.0, 0.0, 0.0));
        let geometry = aabb_wireframe(&aabb, &translate, DVec3::ONE);
        assert_eq!(geometry.vertices.len(), 24);
        assert!(geometry.vertices.iter().all(|vertex| (vertex.x - 100.0).abs() == 8.0));
    }

    #[test]
    fn solid_faces_lie_on_their_planes() {
        let aabb = Aabb::new(DVec3::ZERO, DVec3::splat(4.0));
        let geometry = aabb_solid(&aabb, &DAffine3::IDENTITY, DVec3::ONE);
        for (quad, plane) in geometry.vertices.chunks(4).zip(aabb.planes()) {
            for vertex in quad {
                assert!(plane.distance_to_point(*vertex).abs() < 1e-12);
            }
        }
    }
}
