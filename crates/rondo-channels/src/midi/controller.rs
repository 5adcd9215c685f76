//! Playback status of a MIDI channel.

use rondo_core::{Event, EventKind, SequencerEvent, SequencerEventKind};

use crate::shared::ChannelShared;
use crate::status::{ChannelStatus, PlayTrigger};

pub(crate) fn react(shared: &ChannelShared, event: &Event) {
    match event.kind {
        EventKind::KeyPress { .. } => {
            let trigger = match shared.status() {
                ChannelStatus::Off => PlayTrigger::Arm,
                ChannelStatus::Wait => PlayTrigger::Cancel,
                ChannelStatus::Play => PlayTrigger::RequestEnd,
                ChannelStatus::Ending => PlayTrigger::Resume,
            };
            shared.apply(trigger);
        }
        EventKind::KeyKill | EventKind::SequencerStop => {
            shared.apply(PlayTrigger::Stop);
        }
        _ => {}
    }
}

pub(crate) fn advance(shared: &ChannelShared, event: &SequencerEvent) {
    if event.kind != SequencerEventKind::FirstBeat {
        return;
    }
    match shared.status() {
        ChannelStatus::Wait => {
            shared.apply(PlayTrigger::Start);
        }
        ChannelStatus::Ending => {
            shared.apply(PlayTrigger::Stop);
        }
        _ => {}
    }
}
