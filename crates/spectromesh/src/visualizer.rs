//! The component a render loop talks to.
//!
//! A [`Visualizer`] hides which execution model is in use: `tick` hands it the
//! newest magnitude frame, `floats` returns what should be drawn.

use serde::{Deserialize, Serialize};
use spectromesh_core::{Encoding, ExecutionMode, FieldOptions, MeshBounds, Result, SpectroError};

use crate::pipeline::OffloadPipeline;
use crate::worker::{ThreadWorker, TriangulationWorker};

/// Everything needed to build a [`Visualizer`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerOptions {
    pub field: FieldOptions,
    pub mode: ExecutionMode,
    pub encoding: Encoding,
}

impl Default for VisualizerOptions {
    fn default() -> Self {
        Self {
            field: FieldOptions::mesh(),
            mode: ExecutionMode::default(),
            encoding: Encoding::default(),
        }
    }
}

impl VisualizerOptions {
    /// Options for a point-grid renderer, with the matching field preset.
    pub fn point_grid() -> Self {
        Self {
            field: FieldOptions::point_grid(),
            encoding: Encoding::PointGrid,
            ..Self::default()
        }
    }

    /// Sets the execution model.
    #[must_use]
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the field layout.
    #[must_use]
    pub fn with_field(mut self, field: FieldOptions) -> Self {
        self.field = field;
        self
    }

    /// Parses options from JSON and validates the field layout.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.field.validate()?;
        Ok(options)
    }

    /// Serializes the options to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

enum Backend {
    Synchronous(TriangulationWorker),
    Offloaded(OffloadPipeline<ThreadWorker>),
}

/// Turns magnitude frames into renderable float buffers.
pub struct Visualizer {
    options: VisualizerOptions,
    backend: Option<Backend>,
    // synchronous field kept across clear/init so the lattice is laid out once
    spare: Option<TriangulationWorker>,
}

impl Visualizer {
    /// Validates `options`. Call [`Visualizer::init`] before ticking.
    pub fn new(options: VisualizerOptions) -> Result<Self> {
        options.field.validate()?;
        Ok(Self {
            options,
            backend: None,
            spare: None,
        })
    }

    /// Builds the field and, when offloaded, starts the worker.
    ///
    /// Calling `init` on an initialized visualizer does nothing.
    pub fn init(&mut self) -> Result<()> {
        if self.backend.is_some() {
            log::warn!("visualizer already initialized");
            return Ok(());
        }

        let VisualizerOptions {
            field,
            mode,
            encoding,
        } = self.options;
        let backend = match mode {
            ExecutionMode::Synchronous => match self.spare.take() {
                Some(worker) => Backend::Synchronous(worker),
                None => Backend::Synchronous(TriangulationWorker::new(field, encoding)?),
            },
            ExecutionMode::Offloaded => Backend::Offloaded(OffloadPipeline::new(
                ThreadWorker::spawn(field, encoding)?,
                encoding,
            )),
        };
        self.backend = Some(backend);

        let d = field.dimensions;
        log::info!(
            "visualizer initialized: {}x{}x{} grid, {mode:?}, {encoding:?}",
            d.x,
            d.y,
            d.z
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.backend.is_some()
    }

    /// Advances one animation tick with the newest frame.
    ///
    /// Synchronously this rebuilds the surface before returning. Offloaded it
    /// never blocks: the frame is handed to the pipeline and any finished
    /// result is swapped in. Empty frames never enter the history in either
    /// model.
    pub fn tick(&mut self, frame: &[u8]) -> Result<()> {
        match self.backend.as_mut().ok_or(SpectroError::NotInitialized)? {
            Backend::Synchronous(worker) => {
                if !frame.is_empty() {
                    worker.process(frame);
                }
                Ok(())
            }
            Backend::Offloaded(pipeline) => {
                pipeline.submit_frame(frame)?;
                pipeline.poll()?;
                Ok(())
            }
        }
    }

    /// The buffer to draw. Empty before the first result.
    pub fn floats(&self) -> &[f32] {
        match &self.backend {
            Some(Backend::Synchronous(worker)) => worker.floats(),
            Some(Backend::Offloaded(pipeline)) => pipeline.active_floats(),
            None => &[],
        }
    }

    /// Number of vertices in [`Visualizer::floats`].
    pub fn vertex_count(&self) -> usize {
        let floats_per_vertex = self.options.encoding.vertex_stride() / std::mem::size_of::<f32>();
        self.floats().len() / floats_per_vertex
    }

    /// XZ extent of the buffer being drawn.
    pub fn bounds(&self) -> MeshBounds {
        match &self.backend {
            Some(Backend::Synchronous(worker)) => worker.bounds(),
            Some(Backend::Offloaded(pipeline)) => pipeline.bounds(),
            None => MeshBounds::EMPTY,
        }
    }

    /// The offload pipeline, when running offloaded.
    pub fn pipeline(&self) -> Option<&OffloadPipeline<ThreadWorker>> {
        match &self.backend {
            Some(Backend::Offloaded(pipeline)) => Some(pipeline),
            _ => None,
        }
    }

    pub fn options(&self) -> &VisualizerOptions {
        &self.options
    }

    /// Stops the worker and clears the history and buffers.
    ///
    /// A later [`Visualizer::init`] starts from an empty history and restarts
    /// the worker handshake.
    ///
    /// Offloaded, this joins the worker thread and so blocks until the request
    /// in progress finishes, which can take one full triangulation.
    pub fn clear(&mut self) {
        match self.backend.take() {
            Some(Backend::Offloaded(mut pipeline)) => pipeline.teardown(),
            Some(Backend::Synchronous(mut worker)) => {
                worker.reset();
                self.spare = Some(worker);
            }
            None => return,
        }
        log::info!("visualizer cleared");
    }
}

impl Drop for Visualizer {
    fn drop(&mut self) {
        self.clear();
    }
}
