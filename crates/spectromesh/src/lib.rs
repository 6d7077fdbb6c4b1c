//! spectromesh: an audio-reactive isosurface that scrolls through time.
//!
//! Each animation tick supplies one frame of frequency magnitudes. Frames are
//! stacked along Z into a scalar field, and Marching Cubes turns the field into
//! a flat-shaded triangle mesh (or, alternatively, a point grid).
//!
//! # Quick Start
//!
//! ```no_run
//! use spectromesh::*;
//!
//! fn main() -> Result<()> {
//!     init_logging();
//!
//!     let mut vis = Visualizer::new(VisualizerOptions::default())?;
//!     vis.init()?;
//!
//!     let frame = vec![128u8; 512];
//!     for _ in 0..60 {
//!         vis.tick(&frame)?;
//!         // upload with a stride of 24 bytes
//!         let floats = vis.floats();
//!         assert_eq!(floats.len() % 18, 0);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Execution models
//!
//! - [`ExecutionMode::Synchronous`] rebuilds the surface on the calling thread
//!   every tick.
//! - [`ExecutionMode::Offloaded`] runs a [`TriangulationWorker`] on its own
//!   thread. The [`OffloadPipeline`] keeps one request in flight and swaps
//!   finished results into a [`DoubleBuffer`], so the render loop never waits.

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod double_buffer;
mod init;
pub mod message;
pub mod pipeline;
pub mod visualizer;
pub mod worker;

pub use spectromesh_core::{
    error::{ProtocolError, Result, SpectroError},
    triangulate, triangulate_into, Encoding, ExecutionMode, FieldOptions, FrameHistory,
    GridPoint, MeshBounds, PointGridBuffer, ScalarField, UVec3, Vec3, Vertex, VertexBuffer,
};

pub use double_buffer::{DoubleBuffer, SlotInUse};
pub use init::init_logging;
pub use message::{Envelope, Message, MessageKind, SlotId};
pub use pipeline::{OffloadPipeline, PipelineStats};
pub use visualizer::{Visualizer, VisualizerOptions};
pub use worker::{LoopbackWorker, ThreadWorker, TriangulationWorker, WorkerChannel};
