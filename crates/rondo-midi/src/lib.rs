//! MIDI types for the rondo loop engine.
//!
//! - [`MidiEvent`]: a channel message packed into a `u32`, used by recorded
//!   actions and learn bindings
//! - [`parse`]: classifies raw driver bytes into channel or clock messages
//! - [`MidiSink`]: non-blocking outbound MIDI, called from the audio thread
//! - [`ClockFollower`] / [`ClockGenerator`]: MIDI beat clock slave and master

pub mod error;
pub use error::{Error, Result};

mod clock;
mod event;
mod parse;
mod sink;

pub use clock::{ClockFollower, ClockGenerator, ClockMessage, ClockSignal, PPQN};
pub use event::{MidiEvent, MidiStatus, ALL_NOTES_OFF, MAX_VELOCITY};
pub use parse::{parse, MidiMessage};
pub use sink::{MidiSink, NullSink, OutboundMidi, QueueSink};
