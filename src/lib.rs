//! # Rondo - realtime loop engine
//!
//! Sample and MIDI channels driven by a loop transport, mixed on a hard
//! realtime audio thread.
//!
//! ## Architecture
//!
//! Rondo is an umbrella crate that coordinates:
//! - **rondo-core** - Versioned state store, event dispatcher, sequencer,
//!   quantizer and recorded actions
//! - **rondo-channels** - Sample and MIDI channels, the render queue and the
//!   mixer
//! - **rondo-midi** - MIDI parsing, outbound sinks and beat clock
//!
//! State lives in a [`Layout`] held by a generation-versioned
//! [`Store`](core::Store). Control threads enqueue events; the dispatcher
//! applies them to the working copy and publishes a new generation; the
//! [`AudioRenderer`] reads the newest published generation once per block
//! without locking.
//!
//! ## Quick Start
//!
//! ```ignore
//! use rondo::prelude::*;
//!
//! let engine = Engine::builder().sample_rate(48_000).build()?;
//! let id = engine.add_channel(ChannelKind::Sample)?;
//! engine.load_wave(id, Arc::new(Wave::from_interleaved(&samples, 2, 48_000)?))?;
//! engine.set_mode(id, SamplePlayerMode::LoopBasic)?;
//!
//! let renderer = engine.take_renderer()?;
//! let output = AudioOutput::start(renderer, None)?;
//!
//! engine.key_press(id, 127);
//! engine.start();
//! ```
//!
//! ## Feature Flags
//!
//! - `cpal-output` - [`AudioOutput`], a `cpal` stream driving the renderer

/// Re-export of rondo-core for direct access
pub use rondo_core as core;

/// Re-export of rondo-channels for direct access
pub use rondo_channels as channels;

/// Re-export of rondo-midi for direct access
pub use rondo_midi as midi;

pub use rondo_core::{
    ChannelId, EngineConfig, EventSender, Frame, InputRecMode, PublishNotice, SequencerStatus,
    SwapKind, SyncListener, SyncSource, SyncStatus,
};

pub use rondo_channels::{
    ChannelBindings, ChannelKind, ChannelSnapshot, ChannelStatus, MasterBindings,
    SamplePlayerMode, Wave,
};

pub use rondo_midi::{MidiEvent, MidiSink, NullSink, OutboundMidi, QueueSink};

mod error;
pub use error::{Error, Result};

mod builder;
mod engine;
mod handler;
mod layout;
mod midi_input;
mod recorder;
mod renderer;

#[cfg(feature = "cpal-output")]
mod output;

pub use builder::EngineBuilder;
pub use engine::{Engine, EngineSnapshot, Peaks, TransportStatus};
pub use layout::Layout;
pub use midi_input::MidiInput;
pub use renderer::AudioRenderer;

#[cfg(feature = "cpal-output")]
pub use output::AudioOutput;

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{AudioRenderer, Engine, EngineBuilder, EngineConfig};

    pub use crate::{ChannelId, ChannelKind, ChannelStatus, SamplePlayerMode, Wave};

    pub use crate::{SequencerStatus, TransportStatus};

    pub use crate::{MidiEvent, MidiInput, MidiSink};

    #[cfg(feature = "cpal-output")]
    pub use crate::AudioOutput;

    pub use std::sync::Arc;
}
