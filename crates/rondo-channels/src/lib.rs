//! Channels and mixer of the rondo loop engine.
//!
//! # Primary API
//!
//! - [`Channel`]: identity, mixer parameters and a [`ChannelBody`]
//!   (sample, MIDI or master)
//! - [`ChannelShared`]: status cells, play head and [`RenderQueue`], shared by
//!   every published generation of a channel
//! - [`Mixer`]: renders and sums channels on the audio thread
//! - [`ChannelBindings`] / [`MasterBindings`]: MIDI learn
//! - [`snapshot`]: hydrate/dehydrate for persistence
//!
//! Channels react to [`Event`](rondo_core::Event)s on the dispatcher thread
//! and to [`SequencerEvent`](rondo_core::SequencerEvent)s on the audio thread.
//! Every frame-exact effect decided off the audio thread travels through the
//! render queue.

pub mod error;
pub use error::{Error, Result};

pub mod channel;
pub use channel::{
    AdvanceContext, Channel, ChannelBehavior, ChannelBody, ChannelInfo, ChannelKind,
    MasterChannel, ReactContext, RenderContext, FIRST_USER_ID, MASTER_IN_ID, MASTER_OUT_ID,
    MAX_VOLUME, PREVIEW_ID,
};

pub mod learn;
pub use learn::{ChannelBindings, MasterBindings, TransportView};

pub mod midi;
pub use midi::MidiChannel;

pub mod mixer;
pub use mixer::{Mixer, MixerListener, MixerParams, MixerShared, NullListener};

mod render_queue;
pub use render_queue::{RenderCommand, RenderCommands, RenderMode, RenderQueue, RENDER_QUEUE_CAPACITY};

pub mod sample;
pub use sample::{SampleChannel, SamplePlayerMode, Wave};

mod shared;
pub use shared::ChannelShared;

pub mod snapshot;
pub use snapshot::{ChannelSnapshot, MidiSnapshot, SampleSnapshot};

mod status;
pub use status::{
    transition, ChannelStatus, PlayStatusCell, PlayTrigger, RecStatusCell, TransitionResult,
};
