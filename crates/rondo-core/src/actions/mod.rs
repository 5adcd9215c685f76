//! Recorded performance actions.

mod recorder;

pub use recorder::ActionRecorder;

use rondo_midi::MidiEvent;
use serde::{Deserialize, Serialize};

use crate::{ChannelId, Frame};

/// Action ids start at 1; 0 means "no action".
pub type ActionId = u32;

/// A MIDI event bound to a channel and an absolute loop frame.
///
/// `prev_id`/`next_id` link a note on to its note off, possibly across the
/// loop boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub id: ActionId,
    pub channel_id: ChannelId,
    pub frame: Frame,
    pub event: MidiEvent,
    #[serde(default)]
    pub prev_id: ActionId,
    #[serde(default)]
    pub next_id: ActionId,
}

impl Action {
    #[inline]
    pub fn status_byte(&self) -> u8 {
        self.event.status_byte()
    }
}
