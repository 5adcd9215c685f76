//! Per-channel state shared by every generation of a channel.
//!
//! Published layouts clone channels freely; this part is behind an `Arc` so
//! that the audio thread and the dispatcher see one status, one play head
//! and one render queue whichever generation they hold.

use rondo_core::{AtomicDouble, AtomicFlag, AtomicFloat, Frame};

use crate::render_queue::{RenderCommand, RenderMode, RenderQueue};
use crate::status::{ChannelStatus, PlayStatusCell, PlayTrigger, RecStatusCell};

#[derive(Debug)]
pub struct ChannelShared {
    pub play_status: PlayStatusCell,
    pub rec_status: RecStatusCell,
    pub read_actions: AtomicFlag,
    /// Velocity-driven volume multiplier.
    pub volume_i: AtomicFloat,
    /// Fractional frame into the wave.
    pub position: AtomicDouble,
    /// The player is producing audio. Set and cleared by render commands.
    pub rendering: AtomicFlag,
    /// A stop is pending for the end of the wave.
    pub stop_at_end: AtomicFlag,
    pub render_queue: RenderQueue,
}

impl ChannelShared {
    pub fn new() -> Self {
        Self {
            play_status: PlayStatusCell::default(),
            rec_status: RecStatusCell::default(),
            read_actions: AtomicFlag::new(false),
            volume_i: AtomicFloat::new(1.0),
            position: AtomicDouble::new(0.0),
            rendering: AtomicFlag::new(false),
            stop_at_end: AtomicFlag::new(false),
            render_queue: RenderQueue::new(),
        }
    }

    #[inline]
    pub fn status(&self) -> ChannelStatus {
        self.play_status.load()
    }

    #[inline]
    pub fn apply(&self, trigger: PlayTrigger) -> Option<ChannelStatus> {
        self.play_status.apply(trigger)
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.status().is_playing()
    }

    #[inline]
    pub fn is_reading_actions(&self) -> bool {
        self.rec_status.load().is_playing()
    }

    /// Queues a command from a non-realtime thread.
    pub fn command(&self, mode: RenderMode, frame: Frame) -> bool {
        self.render_queue.push(RenderCommand::new(mode, frame))
    }

    /// Queues a command from the audio thread.
    pub fn command_rt(&self, mode: RenderMode, frame: Frame) -> bool {
        self.render_queue.push_rt(RenderCommand::new(mode, frame))
    }

    pub fn start_reading_actions(&self) {
        self.rec_status.store(ChannelStatus::Play);
        self.read_actions.set(true);
    }

    pub fn stop_reading_actions(&self) {
        self.rec_status.store(ChannelStatus::Off);
        self.read_actions.set(false);
    }
}

impl Default for ChannelShared {
    fn default() -> Self {
        Self::new()
    }
}
