//! Realtime kernel of the rondo loop engine.
//!
//! # Primary API
//!
//! - [`Store`]: generation-versioned state shared with the audio thread
//! - [`Dispatcher`] / [`EventSender`]: the single writer of that state
//! - [`Sequencer`] / [`Quantizer`]: loop transport and grid-aligned actions
//! - [`ActionRecorder`]: recorded performance actions
//! - [`AudioBuffer`], [`PeakMeter`], [`Metronome`]: render-side helpers
//!
//! # Example
//!
//! ```ignore
//! use rondo_core::{Store, ThreadRole, SwapKind};
//!
//! let store = Store::new(layout);
//! store.register_thread(ThreadRole::Main, false)?;
//! store.get_mutable()?.publish(SwapKind::Hard)?;
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod actions;
pub use actions::{Action, ActionId, ActionRecorder};

mod buffer;
pub use buffer::{AudioBuffer, Pan};

pub mod config;
pub use config::{EngineConfig, InputRecMode};

pub mod dispatcher;
pub use dispatcher::{
    DispatchHandler, Dispatcher, DispatcherConfig, Event, EventKind, EventSender, EventTarget,
};

mod lockfree;
pub use lockfree::{AtomicDouble, AtomicFlag, AtomicFloat};

mod metering;
pub use metering::{to_dbfs, PeakMeter};

pub mod store;
pub use store::{PublishNotice, SnapshotGuard, Store, SwapKind, ThreadRole, WorkingCopy};

pub mod transport;
pub use transport::{
    slot_id, EventBuffer, Metronome, Quantizer, QuantizerCallback, Sequencer, SequencerEvent,
    SequencerEventKind, SequencerStatus, SlotId, SyncListener, SyncSource, SyncState,
    SyncStatus,
};

pub use rondo_midi::{MidiEvent, MidiStatus};

/// Absolute or buffer-local frame count.
pub type Frame = u64;

/// Channel identifier. 0 is reserved for "every channel".
pub type ChannelId = u32;
