//! The background context that keeps its own field replica and triangulates.
//!
//! [`TriangulationWorker`] is the computation; [`WorkerChannel`] is how the
//! main context talks to it. Two channels are provided: [`ThreadWorker`] runs
//! the computation on a dedicated OS thread, [`LoopbackWorker`] runs it inline
//! when a message is posted.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use spectromesh_core::{
    triangulate_into, Encoding, FieldOptions, MeshBounds, PointGridBuffer, ProtocolError, Result,
    ScalarField, SpectroError, VertexBuffer,
};

use crate::message::{Envelope, Message};

/// Owns a field replica and the reusable output buffers of one encoding.
///
/// The replica only ever sees the frames it is sent, so it must receive every
/// frame the main context wants reflected in the surface.
pub struct TriangulationWorker {
    field: ScalarField,
    encoding: Encoding,
    mesh: VertexBuffer,
    points: PointGridBuffer,
}

impl TriangulationWorker {
    /// Creates a worker with an empty field.
    pub fn new(options: FieldOptions, encoding: Encoding) -> Result<Self> {
        Ok(Self {
            field: ScalarField::new(options)?,
            encoding,
            mesh: VertexBuffer::new(),
            points: PointGridBuffer::default(),
        })
    }

    /// Returns the field replica.
    pub fn field(&self) -> &ScalarField {
        &self.field
    }

    /// Returns the output encoding.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Ingests `frame` and rebuilds the output buffer.
    pub fn process(&mut self, frame: &[u8]) {
        self.field.ingest(frame);
        self.field.recompute();
        match self.encoding {
            Encoding::Mesh => triangulate_into(&self.field, &mut self.mesh),
            Encoding::PointGrid => self.points.fill_from(&self.field),
        }
    }

    /// The most recent output as flat floats.
    pub fn floats(&self) -> &[f32] {
        match self.encoding {
            Encoding::Mesh => self.mesh.as_floats(),
            Encoding::PointGrid => self.points.as_floats(),
        }
    }

    /// The most recent output as bytes.
    pub fn bytes(&self) -> &[u8] {
        match self.encoding {
            Encoding::Mesh => self.mesh.as_bytes(),
            Encoding::PointGrid => self.points.as_bytes(),
        }
    }

    /// XZ extent of the most recent output.
    pub fn bounds(&self) -> MeshBounds {
        match self.encoding {
            Encoding::Mesh => self.mesh.bounds(),
            Encoding::PointGrid => self.points.bounds(),
        }
    }

    /// Answers a SOURCE message with a RESULT tagged with the same slot.
    ///
    /// # Errors
    ///
    /// Any malformed envelope, and any RESULT, is a protocol error.
    pub fn handle(&mut self, envelope: Envelope) -> std::result::Result<Envelope, ProtocolError> {
        match envelope.decode()? {
            Message::Source { slot, frame } => {
                self.process(&frame);
                Ok(Envelope::result(slot, self.bytes().to_vec(), self.bounds()))
            }
            Message::Result { .. } => Err(ProtocolError::UnexpectedKind("result")),
        }
    }

    /// Drops the history and zeroes the field.
    pub fn reset(&mut self) {
        self.field.reset();
        self.mesh.clear();
        self.points = PointGridBuffer::default();
    }
}

/// A bidirectional message channel to a worker.
pub trait WorkerChannel {
    /// Sends a message to the worker. The envelope is moved.
    fn post(&mut self, envelope: Envelope) -> Result<()>;

    /// Returns the next reply, if one is ready. Never blocks.
    fn try_receive(&mut self) -> Result<Option<Envelope>>;

    /// Stops the worker. Further posts fail.
    fn terminate(&mut self);
}

/// A worker running on its own thread.
pub struct ThreadWorker {
    tx: Option<Sender<Envelope>>,
    rx: Receiver<Envelope>,
    thread: Option<JoinHandle<()>>,
}

impl ThreadWorker {
    /// Starts the worker thread.
    ///
    /// The options are validated here so that a bad configuration fails the
    /// caller instead of the thread.
    pub fn spawn(options: FieldOptions, encoding: Encoding) -> Result<Self> {
        options.validate()?;

        let (tx_cmd, rx_cmd) = mpsc::channel::<Envelope>();
        let (tx_evt, rx_evt) = mpsc::channel::<Envelope>();

        let thread = thread::Builder::new()
            .name("spectromesh-worker".to_string())
            .spawn(move || worker_loop(options, encoding, &rx_cmd, &tx_evt))
            .map_err(SpectroError::WorkerSpawn)?;

        Ok(Self {
            tx: Some(tx_cmd),
            rx: rx_evt,
            thread: Some(thread),
        })
    }

    /// Waits up to `timeout` for the next reply.
    pub fn receive_timeout(&mut self, timeout: Duration) -> Result<Option<Envelope>> {
        match self.rx.recv_timeout(timeout) {
            Ok(envelope) => Ok(Some(envelope)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(SpectroError::WorkerDisconnected),
        }
    }

    /// Returns true while the worker thread has not been joined.
    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }
}

impl WorkerChannel for ThreadWorker {
    fn post(&mut self, envelope: Envelope) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(SpectroError::WorkerDisconnected)?;
        tx.send(envelope).map_err(|_| SpectroError::WorkerDisconnected)
    }

    fn try_receive(&mut self) -> Result<Option<Envelope>> {
        match self.rx.try_recv() {
            Ok(envelope) => Ok(Some(envelope)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(SpectroError::WorkerDisconnected),
        }
    }

    /// Closes the command channel and joins the thread.
    ///
    /// Blocks until the worker finishes the request in progress, which can
    /// take one full triangulation.
    fn terminate(&mut self) {
        // closing the command channel ends the loop
        self.tx = None;
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("spectromesh worker thread panicked");
            }
        }
    }
}

impl Drop for ThreadWorker {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn worker_loop(
    options: FieldOptions,
    encoding: Encoding,
    rx_cmd: &Receiver<Envelope>,
    tx_evt: &Sender<Envelope>,
) {
    let mut worker = match TriangulationWorker::new(options, encoding) {
        Ok(worker) => worker,
        Err(err) => {
            log::error!("worker failed to build its field: {err}");
            return;
        }
    };
    log::debug!("worker started ({encoding:?})");

    while let Ok(envelope) = rx_cmd.recv() {
        match worker.handle(envelope) {
            Ok(reply) => {
                if tx_evt.send(reply).is_err() {
                    break;
                }
            }
            Err(err) => {
                log::error!("worker received a malformed message: {err}");
                break;
            }
        }
    }

    log::debug!("worker stopped");
}

/// A worker that answers synchronously inside [`WorkerChannel::post`].
///
/// Replies are queued and handed out by `try_receive` in order, which makes
/// the protocol fully deterministic.
pub struct LoopbackWorker {
    worker: Option<TriangulationWorker>,
    outbox: VecDeque<Envelope>,
}

impl LoopbackWorker {
    pub fn new(options: FieldOptions, encoding: Encoding) -> Result<Self> {
        Ok(Self {
            worker: Some(TriangulationWorker::new(options, encoding)?),
            outbox: VecDeque::new(),
        })
    }

    /// Number of replies waiting to be received.
    pub fn pending(&self) -> usize {
        self.outbox.len()
    }
}

impl WorkerChannel for LoopbackWorker {
    fn post(&mut self, envelope: Envelope) -> Result<()> {
        let worker = self.worker.as_mut().ok_or(SpectroError::WorkerDisconnected)?;
        match worker.handle(envelope) {
            Ok(reply) => {
                self.outbox.push_back(reply);
                Ok(())
            }
            Err(err) => {
                log::error!("worker received a malformed message: {err}");
                self.worker = None;
                Err(err.into())
            }
        }
    }

    fn try_receive(&mut self) -> Result<Option<Envelope>> {
        match self.outbox.pop_front() {
            Some(envelope) => Ok(Some(envelope)),
            None if self.worker.is_none() => Err(SpectroError::WorkerDisconnected),
            None => Ok(None),
        }
    }

    fn terminate(&mut self) {
        self.worker = None;
        self.outbox.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageKind, SlotId};
    use spectromesh_core::{floats_from_bytes, UVec3};

    fn options() -> FieldOptions {
        FieldOptions::new(UVec3::new(8, 6, 4), 1.0)
    }

    fn frame() -> Vec<u8> {
        vec![0, 40, 200, 255, 90, 10, 0, 30]
    }

    #[test]
    fn test_handle_source_replies_with_same_slot() {
        let mut worker = TriangulationWorker::new(options(), Encoding::Mesh).unwrap();
        let reply = worker.handle(Envelope::source(SlotId::Two, frame())).unwrap();
        let Message::Result {
            slot,
            payload,
            bounds,
        } = reply.decode().unwrap()
        else {
            panic!("expected a result");
        };
        assert_eq!(slot, SlotId::Two);
        assert!(!payload.is_empty());
        assert_eq!(payload.len() % (18 * 4), 0);
        assert_eq!(floats_from_bytes(&payload).unwrap(), worker.floats());
        assert_eq!(bounds, worker.bounds());
        assert!(!bounds.is_empty());
    }

    #[test]
    fn test_point_grid_encoding() {
        let mut worker = TriangulationWorker::new(options(), Encoding::PointGrid).unwrap();
        worker.process(&frame());
        assert_eq!(worker.floats().len(), 8 * 6 * 4 * 4);
        assert_eq!(worker.bounds().max_x, 7.0);
    }

    #[test]
    fn test_handle_rejects_results_and_malformed() {
        let mut worker = TriangulationWorker::new(options(), Encoding::Mesh).unwrap();
        let result = Envelope::result(SlotId::One, vec![], MeshBounds::EMPTY);
        assert_eq!(
            worker.handle(result),
            Err(ProtocolError::UnexpectedKind("result"))
        );

        let untyped = Envelope {
            kind: None,
            ..Envelope::source(SlotId::One, frame())
        };
        assert_eq!(worker.handle(untyped), Err(ProtocolError::MissingKind));
        assert!(worker.field().history().is_empty());
    }

    #[test]
    fn test_reset() {
        let mut worker = TriangulationWorker::new(options(), Encoding::Mesh).unwrap();
        worker.process(&frame());
        assert!(!worker.floats().is_empty());
        worker.reset();
        assert!(worker.floats().is_empty());
        assert!(worker.field().history().is_empty());
    }

    #[test]
    fn test_loopback_round_trip() {
        let mut channel = LoopbackWorker::new(options(), Encoding::Mesh).unwrap();
        assert!(channel.try_receive().unwrap().is_none());

        channel.post(Envelope::source(SlotId::One, frame())).unwrap();
        assert_eq!(channel.pending(), 1);
        let reply = channel.try_receive().unwrap().unwrap();
        assert_eq!(reply.kind, Some(MessageKind::Result));
        assert_eq!(reply.buffer_index, Some(1));

        channel.terminate();
        assert!(matches!(
            channel.post(Envelope::source(SlotId::One, frame())),
            Err(SpectroError::WorkerDisconnected)
        ));
    }

    #[test]
    fn test_loopback_protocol_error_is_fatal() {
        let mut channel = LoopbackWorker::new(options(), Encoding::Mesh).unwrap();
        let err = channel
            .post(Envelope::result(SlotId::One, vec![], MeshBounds::EMPTY))
            .unwrap_err();
        assert!(matches!(
            err,
            SpectroError::Protocol(ProtocolError::UnexpectedKind(_))
        ));
        assert!(matches!(
            channel.try_receive(),
            Err(SpectroError::WorkerDisconnected)
        ));
    }

    #[test]
    fn test_thread_worker_round_trip() {
        let mut channel = ThreadWorker::spawn(options(), Encoding::Mesh).unwrap();
        assert!(channel.is_running());
        channel.post(Envelope::source(SlotId::Two, frame())).unwrap();
        let reply = channel
            .receive_timeout(Duration::from_secs(10))
            .unwrap()
            .expect("worker did not reply");
        assert_eq!(reply.buffer_index, Some(2));

        channel.terminate();
        assert!(!channel.is_running());
        assert!(channel.post(Envelope::source(SlotId::One, frame())).is_err());
    }

    #[test]
    fn test_thread_worker_stops_on_malformed_message() {
        let mut channel = ThreadWorker::spawn(options(), Encoding::Mesh).unwrap();
        channel.post(Envelope::default()).unwrap();
        assert!(matches!(
            channel.receive_timeout(Duration::from_secs(10)),
            Err(SpectroError::WorkerDisconnected)
        ));
    }

    #[test]
    fn test_spawn_validates_options() {
        let bad = FieldOptions::new(UVec3::new(1, 6, 4), 1.0);
        assert!(matches!(
            ThreadWorker::spawn(bad, Encoding::Mesh),
            Err(SpectroError::InvalidDimensions { .. })
        ));
    }
}
