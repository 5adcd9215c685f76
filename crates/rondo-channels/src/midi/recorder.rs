//! Records inbound notes on a MIDI channel as actions.

use rondo_core::{Event, EventKind};

use super::MidiChannel;
use crate::channel::{ChannelInfo, ReactContext};

pub(crate) fn react(
    ch: &MidiChannel,
    info: &ChannelInfo<'_>,
    event: &Event,
    ctx: &mut ReactContext<'_>,
) {
    let EventKind::Midi(midi) = event.kind else {
        return;
    };
    if !ctx.recording_actions || !ctx.sequencer.is_running() || !ch.accepts(midi) {
        return;
    }
    let midi = midi.fix_velocity_zero();
    if midi.is_note_on_off() {
        let frame = ctx.sequencer.current_frame();
        ctx.actions.rec(info.id, frame, midi);
    }
}
