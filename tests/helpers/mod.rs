//! Test helpers and fixtures for rondo integration tests
//!
//! Engines are built without a dispatcher thread so each test decides when
//! queued events apply. The renderer runs on an [`AudioThread`], a dedicated
//! thread that becomes the engine's AUDIO thread on its first block.
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): Exact operations (passthrough, unity gain)
//! - `SILENCE_THRESHOLD` (0.0001): Silence detection (-80dB)

#![allow(dead_code)]

pub mod tolerances;

use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use rondo::prelude::*;

/// Low rate so that grid and loop lengths stay small: 8000 frames per beat
/// at 60 bpm.
pub const TEST_SAMPLE_RATE: u32 = 8_000;

pub const TEST_BUFFER_SIZE: usize = 64;

/// Installs a test-writer subscriber once per binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        sample_rate: TEST_SAMPLE_RATE,
        buffer_size: TEST_BUFFER_SIZE,
        output_channels: 2,
        input_channels: 2,
        bpm: 60.0,
        beats: 4,
        bars: 1,
        quantize: 0,
        ..EngineConfig::default()
    }
}

/// An engine whose events apply only on [`Engine::dispatch_pending`].
pub fn test_engine() -> Engine {
    test_engine_with(test_config())
}

pub fn test_engine_with(config: EngineConfig) -> Engine {
    init_tracing();
    Engine::builder()
        .config(config)
        .dispatcher_thread(false)
        .build()
        .expect("Failed to create test engine")
}

/// Applies every queued event.
pub fn dispatch(engine: &Engine) -> usize {
    engine.dispatch_pending().expect("dispatch failed")
}

/// A mono wave of `frames` samples, all `value`.
pub fn constant_wave(name: &str, frames: usize, value: f32) -> Arc<Wave> {
    let samples = vec![value; frames];
    Arc::new(
        Wave::from_interleaved(&samples, 1, TEST_SAMPLE_RATE)
            .expect("valid wave")
            .with_name(name),
    )
}

/// A sample channel holding `wave` in `mode`.
pub fn sample_channel(engine: &Engine, mode: SamplePlayerMode, wave: Arc<Wave>) -> ChannelId {
    let id = engine.add_channel(ChannelKind::Sample).expect("add channel");
    engine.load_wave(id, wave).expect("load wave");
    engine.set_mode(id, mode).expect("set mode");
    id
}

struct Block {
    input: Vec<f32>,
    frames: usize,
    sample_rate: u32,
    ready: bool,
}

/// Owns the renderer on its own thread, the way a device callback would.
///
/// Every request renders one device block and returns the interleaved
/// output. The output buffer is pre-filled with garbage so tests can see
/// that the renderer clears it.
pub struct AudioThread {
    requests: Sender<Block>,
    blocks: Receiver<Vec<f32>>,
    handle: Option<JoinHandle<AudioRenderer>>,
    sample_rate: u32,
    output_channels: usize,
    input_channels: usize,
}

impl AudioThread {
    pub fn spawn(renderer: AudioRenderer) -> Self {
        let (requests, rx) = bounded::<Block>(1);
        let (tx, blocks) = bounded::<Vec<f32>>(1);
        let sample_rate = renderer.sample_rate();
        let output_channels = renderer.output_channels();
        let input_channels = renderer.input_channels();

        let handle = thread::Builder::new()
            .name("rondo-test-audio".into())
            .spawn(move || {
                let mut renderer = renderer;
                for block in rx {
                    let mut output = vec![0.75; block.frames * output_channels];
                    renderer.render(
                        &block.input,
                        &mut output,
                        block.frames,
                        block.sample_rate,
                        block.ready,
                    );
                    if tx.send(output).is_err() {
                        break;
                    }
                }
                renderer
            })
            .expect("spawn audio thread");

        Self {
            requests,
            blocks,
            handle: Some(handle),
            sample_rate,
            output_channels,
            input_channels,
        }
    }

    /// Takes the engine's renderer and spawns a thread for it.
    pub fn for_engine(engine: &Engine) -> Self {
        Self::spawn(engine.take_renderer().expect("renderer available"))
    }

    fn request(&self, block: Block) -> Vec<f32> {
        self.requests.send(block).expect("audio thread alive");
        self.blocks.recv().expect("audio thread alive")
    }

    /// Renders `frames` frames with silent input.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        self.render_input(vec![0.0; frames * self.input_channels], frames)
    }

    /// Renders `frames` frames of interleaved `input`.
    pub fn render_input(&self, input: Vec<f32>, frames: usize) -> Vec<f32> {
        self.request(Block {
            input,
            frames,
            sample_rate: self.sample_rate,
            ready: true,
        })
    }

    /// A block from a device that is not ready yet.
    pub fn render_not_ready(&self, frames: usize) -> Vec<f32> {
        self.request(Block {
            input: Vec::new(),
            frames,
            sample_rate: self.sample_rate,
            ready: false,
        })
    }

    /// Renders `total` frames in blocks of at most `block` frames.
    pub fn run(&self, total: usize, block: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(total * self.output_channels);
        let mut done = 0;
        while done < total {
            let n = block.min(total - done);
            out.extend(self.render(n));
            done += n;
        }
        out
    }

    pub fn output_channels(&self) -> usize {
        self.output_channels
    }

    /// Stops the thread and hands the renderer back.
    pub fn join(mut self) -> AudioRenderer {
        let handle = self.handle.take().expect("joined once");
        drop(self.requests);
        handle.join().expect("audio thread panicked")
    }
}

/// Left-channel samples of an interleaved stereo block.
pub fn left(block: &[f32]) -> Vec<f32> {
    block.iter().step_by(2).copied().collect()
}

/// Calculate peak amplitude of a signal.
pub fn peak(samples: &[f32]) -> f32 {
    samples
        .iter()
        .map(|s| s.abs())
        .fold(0.0_f32, |a, b| a.max(b))
}

/// Assert that a signal is approximately silent (all values near zero).
pub fn assert_silence(samples: &[f32], tolerance: f32) {
    let max = peak(samples);
    assert!(
        max <= tolerance,
        "Expected silence, but peak amplitude was {}",
        max
    );
}
