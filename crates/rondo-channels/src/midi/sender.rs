//! Outbound MIDI of a MIDI channel.

use rondo_core::{Event, EventKind, SequencerEvent, SequencerEventKind};
use rondo_midi::MidiEvent;

use super::MidiChannel;
use crate::channel::{AdvanceContext, ChannelInfo};

pub(crate) fn react(ch: &MidiChannel, event: &Event) {
    if matches!(
        event.kind,
        EventKind::KeyKill | EventKind::SequencerStop | EventKind::SequencerRewind
    ) {
        send(ch, MidiEvent::all_notes_off(0));
    }
}

/// Replays the channel's recorded actions. Audio thread.
pub(crate) fn advance(
    ch: &MidiChannel,
    info: &ChannelInfo<'_>,
    event: &SequencerEvent,
    ctx: &AdvanceContext<'_>,
) {
    if event.kind != SequencerEventKind::Actions || !info.shared.is_playing() || info.muted {
        return;
    }
    for action in ctx.actions.actions_on(event.global_frame) {
        if action.channel_id == info.id {
            send(ch, action.event);
        }
    }
}

fn send(ch: &MidiChannel, event: MidiEvent) {
    if ch.output_enabled {
        ch.sink.send(event.with_channel(ch.output_channel));
    }
}
