//! Sample channel reactions to sequencer events. Audio thread only.

use rondo_core::{Frame, MidiStatus, SequencerEvent, SequencerEventKind};

use super::{SampleChannel, SamplePlayerMode};
use crate::channel::{AdvanceContext, ChannelInfo};
use crate::render_queue::RenderMode;
use crate::shared::ChannelShared;
use crate::status::{ChannelStatus, PlayTrigger};

pub(crate) fn advance(
    ch: &SampleChannel,
    info: &ChannelInfo<'_>,
    event: &SequencerEvent,
    ctx: &AdvanceContext<'_>,
) {
    if !ch.has_wave() {
        return;
    }
    let shared = &**info.shared;
    match event.kind {
        SequencerEventKind::FirstBeat => on_first_beat(ch, shared, event.delta),
        SequencerEventKind::Bar(_) => on_bar(ch, shared, event.delta),
        SequencerEventKind::Rewind => {
            if shared.is_playing() {
                rewind(shared, event.delta);
            }
        }
        SequencerEventKind::Actions => {
            if !shared.is_reading_actions() {
                return;
            }
            for action in ctx.actions.actions_on(event.global_frame) {
                if action.channel_id != info.id {
                    continue;
                }
                match action.event.status() {
                    Some(MidiStatus::NoteOn) => on_note_on(ch, shared, event.delta),
                    Some(MidiStatus::NoteOff | MidiStatus::NoteKill) => {
                        if shared.is_playing() {
                            stop(shared, event.delta);
                        }
                    }
                    Some(MidiStatus::ControlChange) => {
                        shared.volume_i.set(action.event.velocity_f32());
                    }
                    _ => {}
                }
            }
        }
        SequencerEventKind::Beat(_) => {}
    }
}

fn on_first_beat(ch: &SampleChannel, shared: &ChannelShared, delta: Frame) {
    if ch.mode.is_loop() {
        match shared.status() {
            ChannelStatus::Play => rewind(shared, delta),
            ChannelStatus::Wait => play(shared, delta),
            ChannelStatus::Ending => stop(shared, delta),
            ChannelStatus::Off => {}
        }
    }

    match shared.rec_status.load() {
        ChannelStatus::Wait => shared.start_reading_actions(),
        ChannelStatus::Ending => shared.stop_reading_actions(),
        _ => {}
    }
}

fn on_bar(ch: &SampleChannel, shared: &ChannelShared, delta: Frame) {
    use SamplePlayerMode::*;

    match (shared.status(), ch.mode) {
        (ChannelStatus::Play, LoopRepeat | LoopOnceBar) => rewind(shared, delta),
        (ChannelStatus::Wait, LoopOnceBar) => play(shared, delta),
        _ => {}
    }
}

fn on_note_on(ch: &SampleChannel, shared: &ChannelShared, delta: Frame) {
    match shared.status() {
        ChannelStatus::Off => play(shared, delta),
        ChannelStatus::Play if ch.mode == SamplePlayerMode::SingleRetrig => rewind(shared, delta),
        ChannelStatus::Play => stop(shared, delta),
        _ => {}
    }
}

fn play(shared: &ChannelShared, delta: Frame) {
    if shared.apply(PlayTrigger::Start).is_some() {
        shared.command_rt(RenderMode::Normal, delta);
    }
}

fn rewind(shared: &ChannelShared, delta: Frame) {
    shared.command_rt(RenderMode::Rewind, delta);
}

fn stop(shared: &ChannelShared, delta: Frame) {
    shared.command_rt(RenderMode::Stop, delta);
}
