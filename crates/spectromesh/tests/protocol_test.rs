//! Offload protocol tests against a scripted worker.
//!
//! The scripted worker records every SOURCE it is sent and never answers on
//! its own; tests deliver results by hand so every interleaving is explicit.

use proptest::prelude::*;
use spectromesh::*;

#[derive(Default)]
struct ScriptedWorker {
    posted: Vec<Envelope>,
    terminated: bool,
}

impl ScriptedWorker {
    fn tags(&self) -> Vec<u8> {
        self.posted.iter().filter_map(|e| e.buffer_index).collect()
    }
}

impl WorkerChannel for ScriptedWorker {
    fn post(&mut self, envelope: Envelope) -> Result<()> {
        if self.terminated {
            return Err(SpectroError::WorkerDisconnected);
        }
        self.posted.push(envelope);
        Ok(())
    }

    fn try_receive(&mut self) -> Result<Option<Envelope>> {
        Ok(None)
    }

    fn terminate(&mut self) {
        self.terminated = true;
    }
}

/// One triangle whose x coordinate identifies the payload.
fn marked_triangle(mark: f32) -> VertexBuffer {
    let mut mesh = VertexBuffer::new();
    mesh.push_triangle(
        Vec3::new(mark, 0.0, 0.0),
        Vec3::new(mark, 1.0, 0.0),
        Vec3::new(mark, 0.0, 1.0),
        Vec3::X,
    );
    mesh
}

fn result_for(slot: SlotId, mark: f32) -> Envelope {
    let mesh = marked_triangle(mark);
    Envelope::result(slot, mesh.to_bytes(), mesh.bounds())
}

#[test]
fn test_ping_pong_tags() {
    let mut pipeline = OffloadPipeline::new(ScriptedWorker::default(), Encoding::Mesh);
    pipeline.submit_frame(&[5, 6, 7]).unwrap();
    assert_eq!(pipeline.worker().tags(), [1]);

    let deliveries = [
        (SlotId::One, SlotId::Two),
        (SlotId::Two, SlotId::One),
        (SlotId::One, SlotId::Two),
    ];
    for (i, (tag, active)) in deliveries.into_iter().enumerate() {
        pipeline.submit_frame(&[i as u8; 3]).unwrap();
        pipeline.handle_result(result_for(tag, i as f32)).unwrap();
        assert_eq!(pipeline.active_slot(), active);
        assert_eq!(pipeline.active_floats(), marked_triangle(i as f32).as_floats());
        // exactly one SOURCE per RESULT, carrying the latest frame
        assert_eq!(pipeline.worker().posted.len(), i + 2);
        let last = pipeline.worker().posted.last().unwrap();
        assert_eq!(last.data.as_deref(), Some(&[i as u8; 3][..]));
    }

    assert_eq!(pipeline.worker().tags(), [1, 2, 1, 2]);
    assert_eq!(pipeline.stats().requests_sent, 4);
    assert_eq!(pipeline.stats().results_received, 3);
}

#[test]
fn test_bounds_follow_results() {
    let mut pipeline = OffloadPipeline::new(ScriptedWorker::default(), Encoding::Mesh);
    pipeline.submit_frame(&[1]).unwrap();
    pipeline.handle_result(result_for(SlotId::One, 3.0)).unwrap();
    let bounds = pipeline.bounds();
    assert_eq!((bounds.min_x, bounds.max_x), (3.0, 3.0));
    assert_eq!((bounds.min_z, bounds.max_z), (0.0, 1.0));
}

#[test]
fn test_malformed_results_are_fatal() {
    let mut pipeline = OffloadPipeline::new(ScriptedWorker::default(), Encoding::Mesh);
    pipeline.submit_frame(&[1, 2]).unwrap();

    let no_payload = Envelope {
        data: None,
        ..result_for(SlotId::One, 0.0)
    };
    assert!(matches!(
        pipeline.handle_result(no_payload),
        Err(SpectroError::Protocol(ProtocolError::MissingPayload))
    ));

    let bad_slot = Envelope {
        buffer_index: Some(7),
        ..result_for(SlotId::One, 0.0)
    };
    assert!(matches!(
        pipeline.handle_result(bad_slot),
        Err(SpectroError::Protocol(ProtocolError::InvalidBufferIndex(7)))
    ));

    // the wrong slot was never requested
    assert!(matches!(
        pipeline.handle_result(result_for(SlotId::Two, 0.0)),
        Err(SpectroError::Protocol(ProtocolError::UnrequestedSlot(2)))
    ));

    // nothing was installed and no new request went out
    assert!(pipeline.active_floats().is_empty());
    assert_eq!(pipeline.worker().posted.len(), 1);
}

#[test]
fn test_point_grid_records() {
    let mut pipeline = OffloadPipeline::new(ScriptedWorker::default(), Encoding::PointGrid);
    pipeline.submit_frame(&[9]).unwrap();

    let two_points = Envelope::result(SlotId::One, vec![0; 32], MeshBounds::EMPTY);
    pipeline.handle_result(two_points).unwrap();
    assert_eq!(pipeline.active_floats(), [0.0; 8]);

    let odd = Envelope::result(SlotId::Two, vec![0; 20], MeshBounds::EMPTY);
    assert!(matches!(
        pipeline.handle_result(odd),
        Err(SpectroError::Protocol(ProtocolError::MisalignedPayload {
            bytes: 20,
            record_bytes: 16
        }))
    ));
}

#[test]
fn test_teardown_resets_handshake() {
    let mut pipeline = OffloadPipeline::new(ScriptedWorker::default(), Encoding::Mesh);
    pipeline.submit_frame(&[1, 2]).unwrap();
    pipeline.handle_result(result_for(SlotId::One, 1.0)).unwrap();

    pipeline.teardown();
    assert!(pipeline.worker().terminated);
    assert!(!pipeline.is_started());
    assert_eq!(pipeline.in_flight(), None);
    assert!(pipeline.active_floats().is_empty());
    assert!(pipeline.bounds().is_empty());

    pipeline.restart(ScriptedWorker::default());
    pipeline.submit_frame(&[1, 2]).unwrap();
    assert_eq!(pipeline.worker().tags(), [1]);
    pipeline.handle_result(result_for(SlotId::One, 2.0)).unwrap();
    assert_eq!(pipeline.active_slot(), SlotId::Two);
}

#[derive(Debug, Clone)]
enum Event {
    Frame(Vec<u8>),
    Deliver,
    Render,
}

fn event() -> impl Strategy<Value = Event> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 0..6).prop_map(Event::Frame),
        Just(Event::Deliver),
        Just(Event::Render),
    ]
}

proptest! {
    #[test]
    fn prop_renderer_only_sees_complete_results(events in prop::collection::vec(event(), 1..80)) {
        let mut pipeline = OffloadPipeline::new(ScriptedWorker::default(), Encoding::Mesh);
        let mut installed: Vec<f32> = Vec::new();
        let mut mark = 0.0;

        for event in events {
            match event {
                Event::Frame(frame) => pipeline.submit_frame(&frame).unwrap(),
                Event::Deliver => {
                    let Some(tag) = pipeline.in_flight() else {
                        continue;
                    };
                    let before = pipeline.active_slot();
                    // the outstanding request never targets the slot being drawn
                    prop_assert_eq!(tag, before);

                    mark += 1.0;
                    pipeline.handle_result(result_for(tag, mark)).unwrap();
                    prop_assert_eq!(pipeline.active_slot(), before.other());
                    installed = marked_triangle(mark).as_floats().to_vec();
                }
                Event::Render => {
                    prop_assert_eq!(pipeline.active_floats(), installed.as_slice());
                    prop_assert_eq!(pipeline.active_floats().len() % 18, 0);
                }
            }

            let stats = pipeline.stats();
            prop_assert!(stats.requests_sent - stats.results_received <= 1);
            prop_assert_eq!(pipeline.worker().posted.len() as u64, stats.requests_sent);
        }
    }

    #[test]
    fn prop_double_buffer_never_writes_active(ops in prop::collection::vec((any::<bool>(), any::<u32>()), 1..64)) {
        let mut buffer = DoubleBuffer::new(0u32, 0u32);
        for (target_one, value) in ops {
            let slot = if target_one { SlotId::One } else { SlotId::Two };
            let active = buffer.active_slot();
            let shown = *buffer.active();

            let outcome = buffer.install(slot, value);
            if slot == active {
                prop_assert_eq!(outcome, Err(SlotInUse(slot)));
                prop_assert_eq!(*buffer.active(), shown);
                prop_assert_eq!(buffer.active_slot(), active);
            } else {
                prop_assert!(outcome.is_ok());
                prop_assert_eq!(*buffer.active(), value);
                prop_assert_eq!(*buffer.slot(active), shown);
            }
        }
    }
}
