//! Builder for configuring and constructing an [`Engine`].

use std::sync::Arc;

use arc_swap::ArcSwap;
use rondo_channels::{Mixer, MixerShared};
use rondo_core::{
    Dispatcher, DispatcherConfig, EngineConfig, InputRecMode, Store, SyncState, ThreadRole,
};
use rondo_midi::{MidiSink, NullSink};
use tracing::info;

use crate::handler::EngineHandler;
use crate::layout::Layout;
use crate::renderer::AudioRenderer;
use crate::{Engine, Result};

/// The calling thread of [`EngineBuilder::build`] becomes the engine's MAIN
/// thread.
///
/// # Example
///
/// ```ignore
/// use rondo::prelude::*;
///
/// let engine = Engine::builder()
///     .sample_rate(48_000)
///     .buffer_size(256)
///     .bpm(96.0)
///     .build()?;
/// ```
pub struct EngineBuilder {
    config: EngineConfig,
    midi_sink: Option<Arc<dyn MidiSink>>,
    dispatcher_thread: bool,
    midi_clock_out: bool,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            midi_sink: None,
            dispatcher_thread: true,
            midi_clock_out: false,
        }
    }
}

impl EngineBuilder {
    /// Replaces every setting at once.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Default: 44100
    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.config.sample_rate = sample_rate;
        self
    }

    /// Largest block rendered in one pass. Default: 512
    pub fn buffer_size(mut self, frames: usize) -> Self {
        self.config.buffer_size = frames;
        self
    }

    /// Default: 2
    pub fn outputs(mut self, channels: usize) -> Self {
        self.config.output_channels = channels;
        self
    }

    /// Default: 2
    pub fn inputs(mut self, channels: usize) -> Self {
        self.config.input_channels = channels;
        self
    }

    pub fn bpm(mut self, bpm: f32) -> Self {
        self.config.bpm = bpm;
        self
    }

    pub fn beats(mut self, beats: u32, bars: u32) -> Self {
        self.config.beats = beats;
        self.config.bars = bars;
        self
    }

    pub fn quantize(mut self, quantize: u32) -> Self {
        self.config.quantize = quantize;
        self
    }

    pub fn input_rec_mode(mut self, mode: InputRecMode) -> Self {
        self.config.input_rec_mode = mode;
        self
    }

    /// Where MIDI channels and the clock master send. Default: discard.
    pub fn midi_sink(mut self, sink: Arc<dyn MidiSink>) -> Self {
        self.midi_sink = Some(sink);
        self
    }

    /// Run the dispatcher on its own thread. Without it, call
    /// [`Engine::dispatch_pending`] to apply queued events. Default: on
    pub fn dispatcher_thread(mut self, on: bool) -> Self {
        self.dispatcher_thread = on;
        self
    }

    /// Send MIDI beat clock to the MIDI sink while the transport runs.
    pub fn midi_clock_out(mut self, on: bool) -> Self {
        self.midi_clock_out = on;
        self
    }

    pub fn build(self) -> Result<Engine> {
        let config = self.config;
        config.validate()?;

        let sink = self
            .midi_sink
            .unwrap_or_else(|| Arc::new(NullSink) as Arc<dyn MidiSink>);
        let layout = Layout::new(&config, &sink)?;
        let store = Arc::new(Store::new(layout));
        store.ensure_registered(ThreadRole::Main)?;

        let shared_config = Arc::new(ArcSwap::from_pointee(config.clone()));
        let mixer_shared = Arc::new(MixerShared::new());
        let handler = EngineHandler::new(Arc::clone(&shared_config), Arc::clone(&mixer_shared));
        let mut dispatcher = Dispatcher::new(
            Arc::clone(&store),
            handler,
            DispatcherConfig::from(&config),
        );

        let mixer = Mixer::new(
            Arc::clone(&mixer_shared),
            Arc::new(dispatcher.sender()),
            &config,
        );
        let clock_sink = self.midi_clock_out.then(|| Arc::clone(&sink));
        let renderer = AudioRenderer::new(Arc::clone(&store), mixer, &config, clock_sink);

        if self.dispatcher_thread {
            dispatcher.start()?;
        }

        info!(
            sample_rate = config.sample_rate,
            buffer_size = config.buffer_size,
            outputs = config.output_channels,
            inputs = config.input_channels,
            "engine built"
        );

        Ok(Engine::from_parts(
            store,
            dispatcher,
            shared_config,
            mixer_shared,
            Arc::new(SyncState::new()),
            sink,
            renderer,
        ))
    }
}
