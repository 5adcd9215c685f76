//! Frame-indexed action storage.

use std::collections::BTreeMap;

use rondo_midi::{MidiEvent, MidiStatus};
use smallvec::SmallVec;
use tracing::debug;

use super::{Action, ActionId};
use crate::{ChannelId, Frame};

/// Rescaled frames this close to a grid line are snapped onto it.
const SNAP_TOLERANCE: Frame = 4;

type FrameActions = SmallVec<[Action; 4]>;

/// Every recorded action, keyed by frame.
///
/// Lives in the layout, so the audio thread reads a published copy through
/// [`ActionRecorder::actions_on`] while the dispatcher edits the working one.
/// Per channel, no two actions share a frame and a status.
#[derive(Debug, Clone, Default)]
pub struct ActionRecorder {
    actions: BTreeMap<Frame, FrameActions>,
    last_id: ActionId,
}

impl ActionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `event` on `channel` at `frame`, replacing an action with the
    /// same status already there.
    pub fn rec(&mut self, channel: ChannelId, frame: Frame, event: MidiEvent) -> Action {
        self.last_id += 1;
        let action = Action {
            id: self.last_id,
            channel_id: channel,
            frame,
            event,
            prev_id: 0,
            next_id: 0,
        };
        self.insert(action);
        action
    }

    /// Records two actions linked to each other, e.g. a note on and its off.
    pub fn rec_pair(
        &mut self,
        channel: ChannelId,
        first: (Frame, MidiEvent),
        second: (Frame, MidiEvent),
    ) -> (Action, Action) {
        let mut a = self.rec(channel, first.0, first.1);
        let mut b = self.rec(channel, second.0, second.1);
        a.next_id = b.id;
        b.prev_id = a.id;
        self.update(a);
        self.update(b);
        (a, b)
    }

    /// Links every unpaired note on of `channel` to the next matching note
    /// off, wrapping around the loop end when the off comes earlier.
    pub fn consolidate(&mut self, channel: ChannelId) {
        let ordered = self.actions_of(channel);
        let mut linked = 0;

        for on in ordered.iter().filter(|a| a.event.is_note_on()) {
            if self.find(on.frame, on.id).is_some_and(|a| a.next_id != 0) {
                continue;
            }
            let is_free_off = |a: &&Action| {
                a.event.is_note_off()
                    && a.event.note() == on.event.note()
                    && self.find(a.frame, a.id).is_some_and(|a| a.prev_id == 0)
            };
            let off = ordered
                .iter()
                .filter(|a| a.frame > on.frame)
                .find(is_free_off)
                .or_else(|| ordered.iter().filter(|a| a.frame < on.frame).find(is_free_off))
                .copied();

            if let Some(mut off) = off {
                let mut on = *on;
                on.next_id = off.id;
                off.prev_id = on.id;
                self.update(on);
                self.update(off);
                linked += 1;
            }
        }
        if linked > 0 {
            debug!(channel, linked, "consolidated actions");
        }
    }

    pub fn clear_channel(&mut self, channel: ChannelId) {
        self.retain(|a| a.channel_id != channel);
    }

    /// Removes `channel`'s actions with the given status.
    pub fn clear_actions(&mut self, channel: ChannelId, status: MidiStatus) {
        self.retain(|a| !(a.channel_id == channel && a.status_byte() == status as u8));
    }

    pub fn clear_all(&mut self) {
        self.actions.clear();
    }

    pub fn has_actions(&self, channel: ChannelId) -> bool {
        self.actions
            .values()
            .flatten()
            .any(|a| a.channel_id == channel)
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Actions at `frame`, all channels. Allocation free.
    #[inline]
    pub fn actions_on(&self, frame: Frame) -> &[Action] {
        self.actions.get(&frame).map_or(&[], |list| list.as_slice())
    }

    #[inline]
    pub fn has_actions_at(&self, frame: Frame) -> bool {
        self.actions.contains_key(&frame)
    }

    /// `channel`'s actions in frame order.
    pub fn actions_of(&self, channel: ChannelId) -> Vec<Action> {
        self.actions
            .values()
            .flatten()
            .filter(|a| a.channel_id == channel)
            .copied()
            .collect()
    }

    /// Reinstalls previously saved actions, keeping their ids.
    pub fn import(&mut self, actions: impl IntoIterator<Item = Action>) {
        for action in actions {
            self.last_id = self.last_id.max(action.id);
            self.insert(action);
        }
    }

    /// Moves every action after a tempo change. `ratio` is old bpm / new bpm.
    ///
    /// Actions squeezed onto a frame already holding one of the same channel
    /// and status move forward to the next free frame.
    pub fn update_bpm(&mut self, ratio: f32, quantizer_step: Frame) {
        if self.actions.is_empty() {
            return;
        }
        let old = std::mem::take(&mut self.actions);
        let mut nudged = 0;
        for (frame, list) in old {
            let frame = rescale(frame, ratio, quantizer_step);
            for mut action in list {
                action.frame = self.free_frame(frame, &action);
                if action.frame != frame {
                    nudged += 1;
                }
                self.insert(action);
            }
        }
        if nudged > 0 {
            debug!(nudged, "moved colliding actions after tempo change");
        }
    }

    /// Stores `action`. One with the same channel and status on that frame is
    /// replaced, and its partner loses the link to it.
    fn insert(&mut self, action: Action) {
        let list = self.actions.entry(action.frame).or_default();
        let mut replaced: SmallVec<[ActionId; 1]> = SmallVec::new();
        list.retain(|a| {
            let same = collides(a, &action);
            if same {
                replaced.push(a.id);
            }
            !same
        });
        list.push(action);
        for id in replaced {
            self.unlink(id);
        }
    }

    /// First frame from `frame` on where `action` replaces nothing.
    fn free_frame(&self, mut frame: Frame, action: &Action) -> Frame {
        while self
            .actions
            .get(&frame)
            .is_some_and(|list| list.iter().any(|a| collides(a, action)))
        {
            frame += 1;
        }
        frame
    }

    fn unlink(&mut self, id: ActionId) {
        for a in self.actions.values_mut().flatten() {
            if a.prev_id == id {
                a.prev_id = 0;
            }
            if a.next_id == id {
                a.next_id = 0;
            }
        }
    }

    fn find(&self, frame: Frame, id: ActionId) -> Option<&Action> {
        self.actions.get(&frame)?.iter().find(|a| a.id == id)
    }

    fn update(&mut self, action: Action) {
        if let Some(slot) = self
            .actions
            .get_mut(&action.frame)
            .and_then(|list| list.iter_mut().find(|a| a.id == action.id))
        {
            *slot = action;
        }
    }

    fn retain(&mut self, mut keep: impl FnMut(&Action) -> bool) {
        self.actions.retain(|_, list| {
            list.retain(|a| keep(a));
            !list.is_empty()
        });
    }
}

fn collides(a: &Action, b: &Action) -> bool {
    a.channel_id == b.channel_id && a.status_byte() == b.status_byte()
}

fn rescale(frame: Frame, ratio: f32, step: Frame) -> Frame {
    let scaled = (frame as f64 * f64::from(ratio)).round() as Frame;
    if step == 0 {
        return scaled;
    }
    let rem = scaled % step;
    if rem != 0 && rem <= SNAP_TOLERANCE {
        scaled - rem
    } else if rem != 0 && step - rem <= SNAP_TOLERANCE {
        scaled + (step - rem)
    } else {
        scaled
    }
}
