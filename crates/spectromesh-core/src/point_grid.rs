//! Point-grid encoding: one sample per lattice point instead of triangles.
//!
//! Renderers that draw the field as a cloud of points size or tint each point
//! by its density, so the buffer carries the raw field rather than a surface.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::field::ScalarField;
use crate::mesh::MeshBounds;

/// Byte stride between consecutive samples.
pub const POINT_STRIDE: usize = std::mem::size_of::<GridSample>();
/// Byte offset of the density channel.
pub const DENSITY_OFFSET: usize = 12;
/// Floats per sample: position then density.
pub const FLOATS_PER_POINT: usize = 4;

/// Position and density of one lattice point.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GridSample {
    pub position: [f32; 3],
    pub density: f32,
}

/// Every lattice point of a field, in index order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointGridBuffer {
    samples: Vec<GridSample>,
}

impl PointGridBuffer {
    /// Snapshots a field.
    pub fn from_field(field: &ScalarField) -> Self {
        let mut buffer = Self::default();
        buffer.fill_from(field);
        buffer
    }

    /// Replaces the contents with a snapshot of `field`, reusing the allocation.
    pub fn fill_from(&mut self, field: &ScalarField) {
        self.samples.clear();
        self.samples.extend(field.points().iter().map(|p| GridSample {
            position: p.position.to_array(),
            density: p.density,
        }));
    }

    /// Returns the samples.
    pub fn samples(&self) -> &[GridSample] {
        &self.samples
    }

    /// Returns the number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the XZ extent of the lattice.
    pub fn bounds(&self) -> MeshBounds {
        self.samples.iter().fold(MeshBounds::EMPTY, |mut bounds, s| {
            bounds.include(Vec3::from_array(s.position));
            bounds
        })
    }

    /// Flat float view: `x, y, z, density` per point.
    pub fn as_floats(&self) -> &[f32] {
        bytemuck::cast_slice(&self.samples)
    }

    /// Raw bytes, ready to upload as a vertex attribute buffer.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.samples)
    }

    /// Serializes the buffer into an owned byte payload for the worker wire.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}
