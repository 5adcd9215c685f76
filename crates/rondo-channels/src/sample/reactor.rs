//! Sample channel reactions to user events. Dispatcher thread only.
//!
//! Status changes that must land on an exact frame are queued as render
//! commands; grid-aligned ones go through the quantizer slots registered by
//! [`schedule`].

use std::sync::Arc;

use rondo_core::{slot_id, ChannelId, Event, EventKind, Quantizer, Sequencer};
use rondo_midi::MAX_VELOCITY;

use super::{SampleChannel, SamplePlayerMode};
use crate::channel::{ChannelInfo, ReactContext};
use crate::render_queue::RenderMode;
use crate::shared::ChannelShared;
use crate::status::{ChannelStatus, PlayTrigger};

/// Quantizer action starting a channel on the next grid line.
pub const PLAY_SLOT: u8 = 0;
/// Quantizer action rewinding a channel on the next grid line.
pub const REWIND_SLOT: u8 = 1;

/// Registers the channel's grid-aligned actions.
pub fn schedule(
    quantizer: &mut Quantizer,
    id: ChannelId,
    shared: &Arc<ChannelShared>,
) -> rondo_core::Result<()> {
    let play = Arc::clone(shared);
    quantizer.schedule(
        slot_id(id, PLAY_SLOT),
        Arc::new(move |delta| {
            if play.apply(PlayTrigger::Start).is_some() {
                play.command_rt(RenderMode::Normal, delta);
            }
        }),
    )?;

    let rewind = Arc::clone(shared);
    quantizer.schedule(
        slot_id(id, REWIND_SLOT),
        Arc::new(move |delta| {
            let mode = if rewind.is_playing() {
                RenderMode::Rewind
            } else {
                RenderMode::Stop
            };
            rewind.command_rt(mode, delta);
        }),
    )
}

pub fn unschedule(quantizer: &mut Quantizer, id: ChannelId) {
    quantizer.unschedule(slot_id(id, PLAY_SLOT));
    quantizer.unschedule(slot_id(id, REWIND_SLOT));
}

pub(crate) fn react(
    ch: &SampleChannel,
    info: &ChannelInfo<'_>,
    event: &Event,
    ctx: &mut ReactContext<'_>,
) {
    if !ch.has_wave() {
        return;
    }
    let shared = &**info.shared;
    let seq = ctx.sequencer;
    match event.kind {
        EventKind::KeyPress { velocity } => press(ch, info.id, shared, velocity, seq),
        EventKind::KeyRelease => release(ch, info.id, shared, seq),
        EventKind::KeyKill => kill(info.id, shared, seq),
        EventKind::SequencerStop => on_sequencer_stop(ch, shared, ctx.chans_stop_on_seq_halt),
        EventKind::ChannelToggleReadActions => {
            if seq.is_running()
                && shared.rec_status.load() == ChannelStatus::Play
                && !ctx.treat_recs_as_loops
            {
                shared.command(RenderMode::Stop, 0);
            }
        }
        _ => {}
    }
}

fn press(ch: &SampleChannel, id: ChannelId, shared: &ChannelShared, velocity: u8, seq: &Sequencer) {
    use SamplePlayerMode::*;

    match shared.status() {
        ChannelStatus::Off => {
            let slot = slot_id(id, PLAY_SLOT);
            if seq.can_quantize() {
                if seq.quantizer.is_armed(slot) {
                    seq.quantizer.disarm(slot);
                } else {
                    // Loops start on the bar, not as a fresh press.
                    if !ch.mode.is_loop() {
                        set_velocity_volume(ch, shared, velocity);
                    }
                    seq.quantizer.trigger(slot);
                }
            } else if ch.mode.is_loop() {
                shared.apply(PlayTrigger::Arm);
            } else {
                set_velocity_volume(ch, shared, velocity);
                if shared.apply(PlayTrigger::Start).is_some() {
                    shared.command(RenderMode::Normal, 0);
                }
            }
        }
        ChannelStatus::Play => match ch.mode {
            LoopBasic | LoopOnce | LoopRepeat | LoopOnceBar | SingleEndless => {
                shared.apply(PlayTrigger::RequestEnd);
            }
            SingleRetrig => {
                if seq.can_quantize() {
                    seq.quantizer.trigger(slot_id(id, REWIND_SLOT));
                } else {
                    shared.command(RenderMode::Rewind, 0);
                }
            }
            // Stays PLAY until the wave reaches its end point.
            SingleBasic => {
                shared.command(RenderMode::StopAtEnd, 0);
            }
            SinglePress => {
                shared.apply(PlayTrigger::Stop);
                shared.command(RenderMode::Stop, 0);
            }
        },
        ChannelStatus::Wait => {
            shared.apply(PlayTrigger::Cancel);
        }
        ChannelStatus::Ending => {
            shared.apply(PlayTrigger::Resume);
        }
    }
}

fn release(ch: &SampleChannel, id: ChannelId, shared: &ChannelShared, seq: &Sequencer) {
    if ch.mode != SamplePlayerMode::SinglePress {
        return;
    }
    if shared.status() == ChannelStatus::Play {
        shared.command(RenderMode::Stop, 0);
    } else {
        seq.quantizer.disarm(slot_id(id, PLAY_SLOT));
    }
}

fn kill(id: ChannelId, shared: &ChannelShared, seq: &Sequencer) {
    seq.quantizer.disarm(slot_id(id, PLAY_SLOT));
    seq.quantizer.disarm(slot_id(id, REWIND_SLOT));
    if shared.is_playing() && shared.apply(PlayTrigger::Stop).is_some() {
        shared.command(RenderMode::Stop, 0);
    }
}

fn on_sequencer_stop(ch: &SampleChannel, shared: &ChannelShared, chans_stop_on_seq_halt: bool) {
    match shared.status() {
        ChannelStatus::Wait if ch.mode.is_loop() => {
            shared.apply(PlayTrigger::Cancel);
        }
        ChannelStatus::Play
            if chans_stop_on_seq_halt && (ch.mode.is_loop() || shared.is_reading_actions()) =>
        {
            shared.command(RenderMode::Stop, 0);
        }
        _ => {}
    }
}

fn set_velocity_volume(ch: &SampleChannel, shared: &ChannelShared, velocity: u8) {
    if ch.velocity_as_vol {
        shared
            .volume_i
            .set(f32::from(velocity.min(MAX_VELOCITY)) / f32::from(MAX_VELOCITY));
    }
}
