//! Error types for spectromesh.

use thiserror::Error;

/// The main error type for spectromesh operations.
#[derive(Error, Debug)]
pub enum SpectroError {
    /// A grid dimension is too small to hold a single voxel.
    #[error("invalid grid dimensions {x}x{y}x{z}: every axis needs at least 2 points")]
    InvalidDimensions { x: u32, y: u32, z: u32 },

    /// The voxel size is zero, negative, or not finite.
    #[error("invalid voxel size {0}: must be finite and positive")]
    InvalidVoxelSize(f32),

    /// The iso-level is not a finite number.
    #[error("invalid iso-level {0}")]
    InvalidIsoLevel(f32),

    /// A triangulation table entry is missing its terminator or is malformed.
    #[error("triangulation table entry {0} is malformed")]
    MissingTableEntry(usize),

    /// A float buffer was decoded from a byte length that is not a multiple of 4.
    #[error("byte length {0} is not a whole number of f32 values")]
    MisalignedBuffer(usize),

    /// A worker message violated the wire protocol.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The background worker thread could not be started.
    #[error("failed to spawn worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// The background worker hung up.
    #[error("worker disconnected")]
    WorkerDisconnected,

    /// The visualizer was used before `init` or after `clear`.
    #[error("visualizer not initialized")]
    NotInitialized,

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Structural defects in a worker message.
///
/// These indicate a bug on the sending side, so receivers treat them as fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The message has no type tag.
    #[error("message is missing its type")]
    MissingKind,

    /// The message has no payload.
    #[error("message is missing its payload")]
    MissingPayload,

    /// The message has no buffer slot id.
    #[error("message is missing its buffer index")]
    MissingBufferIndex,

    /// The buffer slot id is not 1 or 2.
    #[error("buffer index {0} is not a valid slot")]
    InvalidBufferIndex(u8),

    /// The message type is not one this context accepts.
    #[error("unexpected message type {0}")]
    UnexpectedKind(&'static str),

    /// A result arrived for a slot that has no outstanding request.
    #[error("result for slot {0} was never requested")]
    UnrequestedSlot(u8),

    /// A result payload is not a whole number of records.
    #[error("result payload of {bytes} bytes is not a multiple of {record_bytes}-byte records")]
    MisalignedPayload { bytes: usize, record_bytes: usize },
}

/// A specialized Result type for spectromesh operations.
pub type Result<T> = std::result::Result<T, SpectroError>;
