//! The audio device entry point.

use std::sync::Arc;

use rondo_channels::{AdvanceContext, Mixer};
use rondo_core::{AudioBuffer, EngineConfig, EventBuffer, Metronome, Store};
use rondo_midi::{ClockGenerator, ClockMessage, MidiSink};

use crate::Layout;

/// Owns every piece of realtime scratch state.
///
/// There is exactly one renderer per engine, taken with
/// [`Engine::take_renderer`](crate::Engine::take_renderer) and moved to the
/// device thread. The first `render` call binds that thread as AUDIO.
pub struct AudioRenderer {
    store: Arc<Store<Layout>>,
    core: RenderCore,
}

struct RenderCore {
    mixer: Mixer,
    metronome: Metronome,
    events: EventBuffer,
    out: AudioBuffer,
    clock: Option<ClockOut>,
    block: usize,
    sample_rate: u32,
    input_channels: usize,
    output_channels: usize,
}

/// MIDI beat clock sent while the engine is the clock master.
struct ClockOut {
    generator: ClockGenerator,
    sink: Arc<dyn MidiSink>,
    was_running: bool,
}

impl AudioRenderer {
    pub(crate) fn new(
        store: Arc<Store<Layout>>,
        mixer: Mixer,
        config: &EngineConfig,
        clock_sink: Option<Arc<dyn MidiSink>>,
    ) -> Self {
        Self {
            store,
            core: RenderCore {
                mixer,
                metronome: Metronome::new(config.sample_rate),
                events: EventBuffer::new(),
                out: AudioBuffer::new(config.buffer_size, config.output_channels),
                clock: clock_sink.map(|sink| ClockOut {
                    generator: ClockGenerator::new(),
                    sink,
                    was_running: false,
                }),
                block: config.buffer_size,
                sample_rate: config.sample_rate,
                input_channels: config.input_channels,
                output_channels: config.output_channels,
            },
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.core.sample_rate
    }

    pub fn output_channels(&self) -> usize {
        self.core.output_channels
    }

    pub fn input_channels(&self) -> usize {
        self.core.input_channels
    }

    /// Renders `frames` frames of interleaved audio into `output`.
    ///
    /// `output` is always cleared first, also when the device is not `ready`,
    /// when `sample_rate` differs from the configured one, or when the mixer
    /// is disabled. Requests larger than the configured buffer size are
    /// rendered in consecutive blocks.
    pub fn render(
        &mut self,
        input: &[f32],
        output: &mut [f32],
        frames: usize,
        sample_rate: u32,
        ready: bool,
    ) {
        output.fill(0.0);
        if !ready || sample_rate != self.core.sample_rate {
            return;
        }
        if self.store.ensure_audio_thread().is_err() {
            return;
        }
        let Ok(layout) = self.store.get_realtime_snapshot() else {
            return;
        };
        if !self.core.mixer.shared().is_active() {
            return;
        }

        let out_ch = self.core.output_channels.max(1);
        let in_ch = self.core.input_channels;
        let frames = frames.min(output.len() / out_ch);
        let mut offset = 0;
        while offset < frames {
            let n = (frames - offset).min(self.core.block);
            let input = if in_ch == 0 {
                &[][..]
            } else {
                input.get(offset * in_ch..).unwrap_or(&[])
            };
            let output = &mut output[offset * out_ch..(offset + n) * out_ch];
            self.core.render_block(&layout, input, output, n);
            offset += n;
        }
    }
}

impl RenderCore {
    fn render_block(&mut self, layout: &Layout, input: &[f32], output: &mut [f32], frames: usize) {
        let sequencer = &layout.sequencer;

        if sequencer.is_active() {
            sequencer.advance(frames, &layout.actions, &mut self.events);
            if !layout.locked {
                let ctx = AdvanceContext {
                    actions: &layout.actions,
                    sequencer_running: sequencer.is_running(),
                };
                for channel in &layout.channels {
                    channel.advance(&self.events, &ctx);
                }
            }
        } else {
            self.events.clear();
        }

        self.out.clear();
        self.mixer.render(
            &layout.channels,
            input,
            self.input_channels,
            &mut self.out,
            frames,
            sequencer.is_running(),
            &layout.mixer,
        );
        if sequencer.metronome() && sequencer.is_running() {
            self.metronome.render(&mut self.out, frames, &self.events);
        }
        if let Some(clock) = self.clock.as_mut() {
            clock.tick(layout, frames, self.sample_rate);
        }
        self.out.write_interleaved(output, self.output_channels, frames);
    }
}

impl ClockOut {
    fn tick(&mut self, layout: &Layout, frames: usize, sample_rate: u32) {
        let running = layout.sequencer.is_running();
        match (self.was_running, running) {
            (false, true) => {
                self.generator.reset();
                self.sink.send_clock(ClockMessage::Start);
            }
            (true, false) => self.sink.send_clock(ClockMessage::Stop),
            _ => {}
        }
        self.was_running = running;
        if running {
            let pulses = self.generator.advance(frames, sample_rate, layout.sequencer.bpm());
            for _ in 0..pulses {
                self.sink.send_clock(ClockMessage::Tick);
            }
        }
    }
}
