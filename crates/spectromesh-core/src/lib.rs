//! Core of spectromesh.
//!
//! This crate turns a stream of frequency-magnitude frames into geometry:
//! - [`ScalarField`] accumulates frames into a 3D density grid
//! - [`marching_cubes`] extracts the iso-surface as flat-shaded triangles
//! - [`PointGridBuffer`] exposes the raw field for point rendering
//! - [`FieldOptions`] fixes the grid layout at construction time

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Lattice coordinates are u32 and are widened to usize/f32 throughout
#![allow(clippy::cast_precision_loss)]

pub mod error;
pub mod field;
pub mod marching_cubes;
pub mod mesh;
pub mod options;
pub mod point_grid;
pub mod tables;

pub use error::{ProtocolError, Result, SpectroError};
pub use field::{FrameHistory, GridPoint, ScalarField};
pub use marching_cubes::{triangulate, triangulate_into};
pub use mesh::{floats_from_bytes, MeshBounds, Vertex, VertexBuffer};
pub use options::{Encoding, ExecutionMode, FieldOptions};
pub use point_grid::{GridSample, PointGridBuffer};

// Re-export glam types for convenience
pub use glam::{UVec3, Vec3};
