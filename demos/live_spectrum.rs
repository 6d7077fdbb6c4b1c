//! Feeds a synthetic spectrum through both execution models.
//!
//! Run with: `RUST_LOG=info cargo run --example live_spectrum`

use std::thread;
use std::time::{Duration, Instant};

use spectromesh::*;

const BINS: usize = 512;
const TICKS: usize = 240;

/// A sweeping tone over a bed of noise, shaped like an analyser's output.
fn spectrum(t: usize, out: &mut Vec<u8>) {
    out.clear();
    let sweep = (t * 7) % BINS;
    out.extend((0..BINS).map(|bin| {
        let tone = 230.0 / (1.0 + (bin.abs_diff(sweep) as f32 / 6.0).powi(2));
        let noise = ((bin * 31 + t * 17) % 23) as f32;
        (tone + noise).min(255.0) as u8
    }));
}

fn run(options: VisualizerOptions) -> Result<()> {
    let mut vis = Visualizer::new(options)?;
    vis.init()?;

    let mut frame = Vec::with_capacity(BINS);
    let start = Instant::now();
    for t in 0..TICKS {
        spectrum(t, &mut frame);
        vis.tick(&frame)?;
        if t % 60 == 0 {
            log::info!(
                "tick {t}: {} vertices, x {:.1}..{:.1}",
                vis.vertex_count(),
                vis.bounds().min_x,
                vis.bounds().max_x
            );
        }
        // roughly one animation frame
        thread::sleep(Duration::from_millis(16));
    }

    if let Some(pipeline) = vis.pipeline() {
        let stats = pipeline.stats();
        log::info!(
            "{} requests, {} results",
            stats.requests_sent,
            stats.results_received
        );
    }
    log::info!(
        "{:?} / {:?}: {TICKS} ticks in {:.2?}",
        vis.options().mode,
        vis.options().encoding,
        start.elapsed()
    );

    vis.clear();
    Ok(())
}

fn main() -> Result<()> {
    init_logging();

    run(VisualizerOptions::default().with_mode(ExecutionMode::Synchronous))?;
    run(VisualizerOptions::default())?;
    run(VisualizerOptions::point_grid())?;
    Ok(())
}
