//! Flat-shaded triangle buffers produced by the triangulator.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpectroError};

/// Byte stride between consecutive vertices.
pub const VERTEX_STRIDE: usize = std::mem::size_of::<Vertex>();
/// Byte offset of the position attribute.
pub const POSITION_OFFSET: usize = 0;
/// Byte offset of the normal attribute.
pub const NORMAL_OFFSET: usize = 12;
/// Floats in one triangle (3 vertices of 6 floats).
pub const FLOATS_PER_TRIANGLE: usize = 18;

/// One interleaved vertex.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
        }
    }
}

/// Axis-aligned extent of a mesh in the XZ plane.
///
/// The renderer uses it to frame the camera over the surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshBounds {
    pub min_x: f32,
    pub max_x: f32,
    pub min_z: f32,
    pub max_z: f32,
}

impl Default for MeshBounds {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl MeshBounds {
    /// Bounds of a mesh with no vertices.
    pub const EMPTY: Self = Self {
        min_x: f32::INFINITY,
        max_x: f32::NEG_INFINITY,
        min_z: f32::INFINITY,
        max_z: f32::NEG_INFINITY,
    };

    /// Returns true if no point has been included.
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x
    }

    /// Grows the bounds to contain `p`.
    pub fn include(&mut self, p: Vec3) {
        self.min_x = self.min_x.min(p.x);
        self.max_x = self.max_x.max(p.x);
        self.min_z = self.min_z.min(p.z);
        self.max_z = self.max_z.max(p.z);
    }
}

/// Triangle soup with one face normal per triangle, duplicated on its vertices.
///
/// The buffer is rebuilt from scratch on every triangulation pass; `clear`
/// keeps the allocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexBuffer {
    vertices: Vec<Vertex>,
    bounds: MeshBounds,
}

impl VertexBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty buffer with room for `triangles` triangles.
    pub fn with_capacity(triangles: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(triangles * 3),
            bounds: MeshBounds::EMPTY,
        }
    }

    /// Removes all triangles, keeping the allocation.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.bounds = MeshBounds::EMPTY;
    }

    /// Appends a triangle whose three vertices share `normal`.
    pub fn push_triangle(&mut self, p1: Vec3, p2: Vec3, p3: Vec3, normal: Vec3) {
        for p in [p1, p2, p3] {
            self.bounds.include(p);
            self.vertices.push(Vertex::new(p, normal));
        }
    }

    /// Returns the number of triangles.
    #[must_use]
    pub fn num_triangles(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Returns true if the buffer has no triangles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Returns the vertices.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Returns the XZ extent of all vertices.
    pub fn bounds(&self) -> MeshBounds {
        self.bounds
    }

    /// Flat float view: `x, y, z, nx, ny, nz` per vertex.
    pub fn as_floats(&self) -> &[f32] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Raw bytes, ready to upload as a vertex attribute buffer.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Serializes the buffer into an owned byte payload for the worker wire.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

/// Decodes a serialized float payload.
///
/// Payloads that arrive over a channel carry no alignment guarantee, so the
/// floats are copied out rather than reinterpreted in place.
pub fn floats_from_bytes(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % std::mem::size_of::<f32>() != 0 {
        return Err(SpectroError::MisalignedBuffer(bytes.len()));
    }
    Ok(bytemuck::pod_collect_to_vec(bytes))
}
