//! The main-context half of the offload protocol.
//!
//! The pipeline keeps exactly one request in flight. The first frame starts a
//! ping-pong: every RESULT immediately triggers the next SOURCE, so the worker
//! always triangulates the freshest frame while the renderer draws the last
//! completed one.
//!
//! A request is tagged with the slot that is active while it is outstanding.
//! Its result is written into the other slot, which then becomes active, and
//! the next request carries that slot as its tag. Results tagged `1, 2, 1`
//! therefore leave slots `2, 1, 2` active.

use spectromesh_core::{
    floats_from_bytes, Encoding, MeshBounds, ProtocolError, Result, SpectroError,
};

use crate::double_buffer::DoubleBuffer;
use crate::message::{Envelope, Message, SlotId};
use crate::worker::WorkerChannel;

/// Message counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub requests_sent: u64,
    pub results_received: u64,
}

/// Drives a worker and double-buffers its results.
pub struct OffloadPipeline<W: WorkerChannel> {
    worker: W,
    encoding: Encoding,
    buffers: DoubleBuffer<Vec<f32>>,
    bounds: MeshBounds,
    scratch: Vec<u8>,
    started: bool,
    in_flight: Option<SlotId>,
    stats: PipelineStats,
}

impl<W: WorkerChannel> OffloadPipeline<W> {
    /// Wraps a worker. Nothing is sent until the first non-empty frame.
    pub fn new(worker: W, encoding: Encoding) -> Self {
        Self {
            worker,
            encoding,
            buffers: DoubleBuffer::default(),
            bounds: MeshBounds::EMPTY,
            scratch: Vec::new(),
            started: false,
            in_flight: None,
            stats: PipelineStats::default(),
        }
    }

    /// Records `frame` as the latest frame.
    ///
    /// The first non-empty frame also issues the initial request; after that,
    /// requests are only issued in response to results.
    pub fn submit_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.scratch.clear();
        self.scratch.extend_from_slice(frame);

        if !self.started && !self.scratch.is_empty() {
            let slot = self.buffers.active_slot();
            self.request(slot)?;
            self.started = true;
            log::debug!("offload handshake started on slot {slot}");
        }
        Ok(())
    }

    /// Handles the worker's reply, if one is ready. Returns how many were handled.
    ///
    /// Only one request is ever outstanding, so at most one reply is taken per
    /// call. Anything else the worker sent stays queued for the next poll.
    pub fn poll(&mut self) -> Result<usize> {
        match self.worker.try_receive()? {
            Some(envelope) => {
                self.handle_result(envelope)?;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    /// Handles one message from the worker.
    ///
    /// The next request goes out before the result is installed so the worker
    /// is never idle while the main context copies.
    ///
    /// # Errors
    ///
    /// A malformed message, a SOURCE, a result for a slot with no outstanding
    /// request, or a payload that is not a whole number of records is a
    /// protocol error. Nothing is installed in that case.
    pub fn handle_result(&mut self, envelope: Envelope) -> Result<()> {
        let (slot, payload, bounds) = match envelope.decode() {
            Ok(Message::Result {
                slot,
                payload,
                bounds,
            }) => (slot, payload, bounds),
            Ok(Message::Source { .. }) => {
                return Err(Self::protocol_failure(ProtocolError::UnexpectedKind("source")))
            }
            Err(err) => return Err(Self::protocol_failure(err)),
        };

        if self.in_flight != Some(slot) {
            return Err(Self::protocol_failure(ProtocolError::UnrequestedSlot(
                slot.into(),
            )));
        }
        let record_bytes = self.encoding.floats_per_record() * std::mem::size_of::<f32>();
        if payload.len() % record_bytes != 0 {
            return Err(Self::protocol_failure(ProtocolError::MisalignedPayload {
                bytes: payload.len(),
                record_bytes,
            }));
        }
        let floats = floats_from_bytes(&payload)?;

        self.in_flight = None;
        self.stats.results_received += 1;

        let target = slot.other();
        let next = if self.scratch.is_empty() {
            // nothing to send; the next non-empty frame restarts the exchange
            self.started = false;
            Ok(())
        } else {
            self.request(target)
        };

        let records = floats.len() / self.encoding.floats_per_record();
        self.buffers
            .install(target, floats)
            .map_err(|err| Self::protocol_failure(ProtocolError::UnrequestedSlot(err.0.into())))?;
        self.bounds = bounds;
        log::debug!("installed {records} records in slot {target}");

        next
    }

    /// The floats the renderer should draw.
    pub fn active_floats(&self) -> &[f32] {
        self.buffers.active()
    }

    /// The slot the renderer reads.
    pub fn active_slot(&self) -> SlotId {
        self.buffers.active_slot()
    }

    /// XZ extent of the active result.
    pub fn bounds(&self) -> MeshBounds {
        self.bounds
    }

    /// The slot tag of the outstanding request, if any.
    pub fn in_flight(&self) -> Option<SlotId> {
        self.in_flight
    }

    /// Returns true once the initial request has been issued.
    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn worker(&self) -> &W {
        &self.worker
    }

    /// Stops the worker and forgets all state.
    ///
    /// With a [`ThreadWorker`](crate::worker::ThreadWorker) this waits for the
    /// worker thread to finish the request it is working on.
    pub fn teardown(&mut self) {
        self.worker.terminate();
        self.started = false;
        self.in_flight = None;
        self.buffers.clear();
        self.scratch.clear();
        self.bounds = MeshBounds::EMPTY;
        self.stats = PipelineStats::default();
        log::info!("offload pipeline torn down");
    }

    /// Tears down and continues with a fresh worker.
    pub fn restart(&mut self, worker: W) {
        self.teardown();
        self.worker = worker;
    }

    fn request(&mut self, slot: SlotId) -> Result<()> {
        self.worker.post(Envelope::source(slot, self.scratch.clone()))?;
        self.in_flight = Some(slot);
        self.stats.requests_sent += 1;
        Ok(())
    }

    fn protocol_failure(err: ProtocolError) -> SpectroError {
        log::error!("rejected worker message: {err}");
        err.into()
    }
}
