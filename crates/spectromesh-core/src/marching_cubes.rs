//! Marching Cubes isosurface extraction over a [`ScalarField`].
//!
//! Every voxel is classified against the iso-level, the crossing point on each
//! cut edge is found by linear interpolation, and the resulting triangles are
//! emitted with flat face normals. There is no vertex sharing between
//! triangles: each face carries its own three vertices.

#![allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]

use glam::{UVec3, Vec3};

use crate::field::{GridPoint, ScalarField};
use crate::mesh::VertexBuffer;
use crate::tables::{self, CORNER_OFFSETS, EDGE_CORNERS};

/// Tolerance used when snapping interpolated points to corners.
pub const EPSILON: f32 = f32::EPSILON;

/// The eight corners of one voxel, in bit order.
pub type Cube<'a> = [&'a GridPoint; 8];

/// Builds the 8-bit configuration mask of a voxel.
///
/// Bit `i` is set when corner `i` is strictly denser than `iso_level`.
#[inline]
pub fn cube_index(densities: &[f32; 8], iso_level: f32) -> u8 {
    densities
        .iter()
        .enumerate()
        .fold(0u8, |mask, (i, &d)| mask | (u8::from(d > iso_level) << i))
}

/// Finds where the surface crosses the edge between `p1` and `p2`.
///
/// A corner that sits on the iso-level is returned as is. Edges whose
/// densities are indistinguishable resolve to `p1`, which keeps the result
/// finite even when both densities are zero.
#[inline]
pub fn vertex_interp(p1: &GridPoint, p2: &GridPoint, iso_level: f32) -> Vec3 {
    if (iso_level - p1.density).abs() < EPSILON {
        return p1.position;
    }
    if (iso_level - p2.density).abs() < EPSILON {
        return p2.position;
    }
    if (p2.density - p1.density).abs() < EPSILON || (p1.density == 0.0 && p2.density == 0.0) {
        return p1.position;
    }
    let mu = (iso_level - p1.density) / (p2.density - p1.density);
    p1.position + mu * (p2.position - p1.position)
}

/// Unit normal of the triangle `(p1, p2, p3)`: `normalize(cross(p1 - p2, p1 - p3))`.
///
/// Zero-area triangles get a zero normal.
#[inline]
pub fn face_normal(p1: Vec3, p2: Vec3, p3: Vec3) -> Vec3 {
    (p1 - p2).cross(p1 - p3).normalize_or_zero()
}

/// Gathers the 8 corners of the voxel whose lowest corner is `(x, y, z)`.
#[inline]
pub fn gather_cube(field: &ScalarField, x: u32, y: u32, z: u32) -> Cube<'_> {
    std::array::from_fn(|i| {
        let [dx, dy, dz] = CORNER_OFFSETS[i];
        field.point(x + dx, y + dy, z + dz)
    })
}

/// Appends the triangles of one voxel to `out`. Returns how many were added.
pub fn triangulate_cube(cube: &Cube<'_>, iso_level: f32, out: &mut VertexBuffer) -> usize {
    let densities = cube.map(|p| p.density);
    let edges = tables::edges_for(cube_index(&densities, iso_level));

    for tri in edges.chunks_exact(3) {
        let [p1, p2, p3] = [tri[0], tri[1], tri[2]].map(|edge| {
            let [a, b] = EDGE_CORNERS[edge as usize];
            vertex_interp(cube[a], cube[b], iso_level)
        });
        out.push_triangle(p1, p2, p3, face_normal(p1, p2, p3));
    }

    edges.len() / 3
}

/// Triangulates the whole field into a fresh buffer.
#[must_use]
pub fn triangulate(field: &ScalarField) -> VertexBuffer {
    let mut out = VertexBuffer::new();
    triangulate_into(field, &mut out);
    out
}

/// Triangulates the whole field into `out`, replacing its previous contents.
///
/// The result depends only on the field's densities at call time.
pub fn triangulate_into(field: &ScalarField, out: &mut VertexBuffer) {
    out.clear();

    let iso_level = field.options().iso_level;
    let UVec3 { x: nx, y: ny, z: nz } = field.dimensions();

    for z in 0..nz - 1 {
        for y in 0..ny - 1 {
            for x in 0..nx - 1 {
                let cube = gather_cube(field, x, y, z);
                triangulate_cube(&cube, iso_level, out);
            }
        }
    }
}
