//! Configuration options for the scalar field and its consumers.

use glam::UVec3;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpectroError};

/// Grid configuration, fixed at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldOptions {
    /// Number of lattice points along X (frequency bins), Y (height), and Z (history).
    pub dimensions: UVec3,

    /// Distance between adjacent lattice points.
    pub voxel_size: f32,

    /// Density threshold of the extracted surface.
    pub iso_level: f32,
}

impl Default for FieldOptions {
    fn default() -> Self {
        Self::mesh()
    }
}

impl FieldOptions {
    /// Creates options with the given dimensions and voxel size and an iso-level of 0.
    pub fn new(dimensions: UVec3, voxel_size: f32) -> Self {
        Self {
            dimensions,
            voxel_size,
            iso_level: 0.0,
        }
    }

    /// Layout used for the triangle-mesh surface.
    pub fn mesh() -> Self {
        Self::new(UVec3::new(512, 24, 65), 1.0)
    }

    /// Layout used for the point-grid rendering, with a coarser voxel.
    pub fn point_grid() -> Self {
        Self::new(UVec3::new(512, 24, 65), 2.0)
    }

    /// Sets the iso-level.
    #[must_use]
    pub fn with_iso_level(mut self, iso_level: f32) -> Self {
        self.iso_level = iso_level;
        self
    }

    /// Rejects layouts that cannot hold a voxel or have no usable spacing.
    pub fn validate(&self) -> Result<()> {
        let UVec3 { x, y, z } = self.dimensions;
        if x < 2 || y < 2 || z < 2 || self.checked_num_points().is_none() {
            return Err(SpectroError::InvalidDimensions { x, y, z });
        }
        if !self.voxel_size.is_finite() || self.voxel_size <= 0.0 {
            return Err(SpectroError::InvalidVoxelSize(self.voxel_size));
        }
        if !self.iso_level.is_finite() {
            return Err(SpectroError::InvalidIsoLevel(self.iso_level));
        }
        Ok(())
    }

    /// Total number of lattice points, saturating for layouts that
    /// [`FieldOptions::validate`] rejects.
    pub fn num_points(&self) -> usize {
        self.checked_num_points().unwrap_or(usize::MAX)
    }

    fn checked_num_points(&self) -> Option<usize> {
        let UVec3 { x, y, z } = self.dimensions;
        (x as usize)
            .checked_mul(y as usize)?
            .checked_mul(z as usize)
    }

    /// Height that the loudest bin of a frame maps to.
    #[allow(clippy::cast_precision_loss)]
    pub fn max_height(&self) -> f32 {
        self.voxel_size * self.dimensions.y as f32
    }

    /// Parses options from JSON and validates them.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Serializes options to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Where field updates and triangulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ExecutionMode {
    /// On the calling thread, once per tick.
    Synchronous,
    /// On a background worker, double buffered.
    #[default]
    Offloaded,
}

/// What the pipeline emits for the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Encoding {
    /// Flat-shaded triangles: `x, y, z, nx, ny, nz` per vertex.
    #[default]
    Mesh,
    /// One sample per lattice point: `x, y, z, density`.
    PointGrid,
}

impl Encoding {
    /// Floats in one complete record: a triangle for meshes, a point for grids.
    pub fn floats_per_record(self) -> usize {
        match self {
            Self::Mesh => crate::mesh::FLOATS_PER_TRIANGLE,
            Self::PointGrid => crate::point_grid::FLOATS_PER_POINT,
        }
    }

    /// Byte stride between consecutive vertices as bound by the renderer.
    pub fn vertex_stride(self) -> usize {
        match self {
            Self::Mesh => crate::mesh::VERTEX_STRIDE,
            Self::PointGrid => crate::point_grid::POINT_STRIDE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        assert!(FieldOptions::mesh().validate().is_ok());
        assert!(FieldOptions::point_grid().validate().is_ok());
        assert_eq!(FieldOptions::default(), FieldOptions::mesh());
    }

    #[test]
    fn test_max_height() {
        let options = FieldOptions::new(UVec3::new(4, 24, 3), 0.5);
        assert!((options.max_height() - 12.0).abs() < f32::EPSILON);
        assert_eq!(options.num_points(), 4 * 24 * 3);
    }

    #[test]
    fn test_rejects_degenerate_dimensions() {
        let options = FieldOptions::new(UVec3::new(0, 24, 65), 1.0);
        assert!(matches!(
            options.validate(),
            Err(SpectroError::InvalidDimensions { x: 0, y: 24, z: 65 })
        ));
        let options = FieldOptions::new(UVec3::new(8, 1, 8), 1.0);
        assert!(options.validate().is_err());

        let options = FieldOptions::new(UVec3::new(u32::MAX, u32::MAX, 2), 1.0);
        assert!(options.validate().is_err());
        assert_eq!(options.num_points(), usize::MAX);
    }

    #[test]
    fn test_rejects_bad_voxel_size() {
        for voxel in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let options = FieldOptions::new(UVec3::splat(4), voxel);
            assert!(matches!(
                options.validate(),
                Err(SpectroError::InvalidVoxelSize(_))
            ));
        }
    }

    #[test]
    fn test_json_round_trip_and_validation() {
        let options = FieldOptions::point_grid().with_iso_level(0.25);
        let json = options.to_json().unwrap();
        assert_eq!(FieldOptions::from_json(&json).unwrap(), options);

        let bad = r#"{"dimensions":[1,24,65],"voxel_size":1.0,"iso_level":0.0}"#;
        assert!(matches!(
            FieldOptions::from_json(bad),
            Err(SpectroError::InvalidDimensions { .. })
        ));
        let huge = r#"{"dimensions":[4294967295,4294967295,2],"voxel_size":1.0,"iso_level":0.0}"#;
        assert!(matches!(
            FieldOptions::from_json(huge),
            Err(SpectroError::InvalidDimensions { x: 4_294_967_295, .. })
        ));
        assert!(matches!(
            FieldOptions::from_json("{"),
            Err(SpectroError::JsonError(_))
        ));
    }

    #[test]
    fn test_encoding_layout() {
        assert_eq!(Encoding::Mesh.floats_per_record(), 18);
        assert_eq!(Encoding::Mesh.vertex_stride(), 24);
        assert_eq!(Encoding::PointGrid.floats_per_record(), 4);
        assert_eq!(Encoding::PointGrid.vertex_stride(), 16);
        assert_eq!(
            Encoding::Mesh.floats_per_record() * 4,
            3 * crate::mesh::VERTEX_STRIDE
        );
        assert_eq!(
            Encoding::PointGrid.floats_per_record() * 4,
            crate::point_grid::POINT_STRIDE
        );
    }
}
