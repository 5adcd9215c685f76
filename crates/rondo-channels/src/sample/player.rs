//! Wave rendering driven by render commands.

use rondo_core::{AudioBuffer, Frame};

use super::{SampleChannel, SamplePlayerMode};
use crate::render_queue::{RenderCommands, RenderMode};
use crate::shared::ChannelShared;
use crate::status::{ChannelStatus, PlayTrigger};

/// Renders `frames` frames of `ch` into `out`, applying every queued
/// command at its exact frame. Audio thread only.
pub(crate) fn render(
    ch: &SampleChannel,
    shared: &ChannelShared,
    out: &mut AudioBuffer,
    frames: usize,
    sequencer_running: bool,
) {
    let mut commands = RenderCommands::new();
    shared.render_queue.drain(frames as Frame, &mut commands);

    let Some(wave) = ch.wave.as_deref() else {
        return;
    };
    let begin = ch.begin as f64;
    let end = ch.end.min(wave.len());
    let end_f = end as f64;
    let pitch = f64::from(ch.pitch);
    let stereo = out.channels() > 1;

    let mut position = shared.position.get();
    let mut rendering = shared.rendering.get();
    let mut stop_at_end = shared.stop_at_end.get();
    let mut next = 0;

    for frame in 0..frames.min(out.frames()) {
        while let Some(command) = commands.get(next).filter(|c| c.frame as usize <= frame) {
            match command.mode {
                RenderMode::Normal => {
                    rendering = true;
                    stop_at_end = false;
                    if position < begin || position >= end_f {
                        position = begin;
                    }
                }
                RenderMode::Rewind => position = begin,
                RenderMode::Stop => {
                    rendering = false;
                    stop_at_end = false;
                    position = begin;
                    shared.apply(PlayTrigger::Stop);
                }
                RenderMode::StopAtEnd => stop_at_end = true,
            }
            next += 1;
        }
        if !rendering {
            continue;
        }

        let (left, right) = wave.frame_at(position, end);
        out.set(frame, 0, left);
        if stereo {
            out.set(frame, 1, right);
        }

        position += pitch;
        if position >= end_f {
            if stop_at_end {
                stop_at_end = false;
                rendering = false;
                position = begin;
                shared.apply(PlayTrigger::Stop);
            } else if on_last_frame(shared, ch.mode, sequencer_running) {
                position = begin + (position - end_f);
            } else {
                rendering = false;
                position = begin;
            }
        }
    }

    shared.position.set(position);
    shared.rendering.set(rendering);
    shared.stop_at_end.set(stop_at_end);
}

/// The play head ran past the end. Returns whether playback wraps around.
fn on_last_frame(shared: &ChannelShared, mode: SamplePlayerMode, sequencer_running: bool) -> bool {
    use SamplePlayerMode::*;

    match shared.status() {
        ChannelStatus::Play => {
            if (mode.is_single() && mode != SingleEndless) || (mode.is_loop() && !sequencer_running)
            {
                shared.apply(PlayTrigger::Stop);
                false
            } else if matches!(mode, LoopOnce | LoopOnceBar) {
                shared.apply(PlayTrigger::Rearm);
                false
            } else {
                true
            }
        }
        ChannelStatus::Ending => {
            shared.apply(PlayTrigger::Stop);
            false
        }
        ChannelStatus::Off | ChannelStatus::Wait => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::testing::channel;
    use approx::assert_relative_eq;

    fn playing() -> ChannelShared {
        let shared = ChannelShared::new();
        shared.apply(PlayTrigger::Start);
        shared
    }

    #[test]
    fn test_normal_command_starts_at_exact_frame() {
        let ch = channel(SamplePlayerMode::SingleBasic, 100);
        let shared = playing();
        shared.command(RenderMode::Normal, 3);

        let mut out = AudioBuffer::new(8, 2);
        render(&ch, &shared, &mut out, 8, false);
        for f in 0..3 {
            assert_eq!(out.get(f, 0), 0.0);
        }
        assert_relative_eq!(out.get(4, 0), 0.001);
        assert_relative_eq!(out.get(7, 1), 0.004);
        assert_relative_eq!(shared.position.get(), 5.0);
    }

    #[test]
    fn test_nothing_renders_without_a_command() {
        let ch = channel(SamplePlayerMode::SingleBasic, 100);
        let shared = playing();
        let mut out = AudioBuffer::new(8, 2);
        render(&ch, &shared, &mut out, 8, false);
        assert_eq!(out.peak(8), 0.0);
    }

    #[test]
    fn test_single_shot_turns_off_at_end() {
        let ch = channel(SamplePlayerMode::SingleBasic, 10);
        let shared = playing();
        shared.command(RenderMode::Normal, 0);

        let mut out = AudioBuffer::new(16, 2);
        render(&ch, &shared, &mut out, 16, true);
        assert_eq!(shared.status(), ChannelStatus::Off);
        assert!(!shared.rendering.get());
        assert_relative_eq!(out.get(9, 0), 0.009);
        assert_eq!(out.get(10, 0), 0.0);
    }

    #[test]
    fn test_loop_wraps_while_sequencer_runs() {
        let ch = channel(SamplePlayerMode::LoopBasic, 10);
        let shared = playing();
        shared.command(RenderMode::Normal, 0);

        let mut out = AudioBuffer::new(16, 2);
        render(&ch, &shared, &mut out, 16, true);
        assert_eq!(shared.status(), ChannelStatus::Play);
        assert_relative_eq!(out.get(12, 0), 0.002);
    }

    #[test]
    fn test_loop_stops_when_sequencer_is_stopped() {
        let ch = channel(SamplePlayerMode::LoopRepeat, 10);
        let shared = playing();
        shared.command(RenderMode::Normal, 0);
        let mut out = AudioBuffer::new(16, 2);
        render(&ch, &shared, &mut out, 16, false);
        assert_eq!(shared.status(), ChannelStatus::Off);
    }

    #[test]
    fn test_loop_once_waits_after_one_round() {
        let ch = channel(SamplePlayerMode::LoopOnce, 10);
        let shared = playing();
        shared.command(RenderMode::Normal, 0);
        let mut out = AudioBuffer::new(16, 2);
        render(&ch, &shared, &mut out, 16, true);
        assert_eq!(shared.status(), ChannelStatus::Wait);
        assert!(!shared.rendering.get());
    }

    #[test]
    fn test_ending_turns_off_at_end() {
        let ch = channel(SamplePlayerMode::SingleEndless, 10);
        let shared = playing();
        shared.command(RenderMode::Normal, 0);
        shared.apply(PlayTrigger::RequestEnd);
        let mut out = AudioBuffer::new(16, 2);
        render(&ch, &shared, &mut out, 16, true);
        assert_eq!(shared.status(), ChannelStatus::Off);
    }

    #[test]
    fn test_stop_command_turns_off_at_its_frame() {
        let ch = channel(SamplePlayerMode::SingleBasic, 100);
        let shared = playing();
        shared.command(RenderMode::Normal, 0);
        shared.command(RenderMode::Stop, 4);

        let mut out = AudioBuffer::new(8, 2);
        render(&ch, &shared, &mut out, 8, true);
        assert_relative_eq!(out.get(3, 0), 0.003);
        assert_eq!(out.get(4, 0), 0.0);
        assert_eq!(shared.status(), ChannelStatus::Off);
        assert_eq!(shared.position.get(), 0.0);
    }

    #[test]
    fn test_stop_at_end_keeps_playing_until_the_end_point() {
        let mut ch = channel(SamplePlayerMode::SingleBasic, 100);
        ch.set_trim(0, 20).unwrap();
        let shared = playing();
        shared.command(RenderMode::Normal, 0);
        shared.command(RenderMode::StopAtEnd, 2);

        let mut out = AudioBuffer::new(16, 2);
        render(&ch, &shared, &mut out, 16, true);
        assert_eq!(shared.status(), ChannelStatus::Play);
        assert!(shared.stop_at_end.get());
        assert_relative_eq!(out.get(15, 0), 0.015);

        out.clear();
        render(&ch, &shared, &mut out, 16, true);
        assert_relative_eq!(out.get(3, 0), 0.019);
        assert_eq!(out.get(4, 0), 0.0);
        assert_eq!(shared.status(), ChannelStatus::Off);
        assert!(!shared.stop_at_end.get());
    }

    #[test]
    fn test_restart_cancels_a_pending_stop_at_end() {
        let ch = channel(SamplePlayerMode::SingleEndless, 10);
        let shared = playing();
        shared.command(RenderMode::StopAtEnd, 0);
        shared.command(RenderMode::Normal, 1);

        let mut out = AudioBuffer::new(16, 2);
        render(&ch, &shared, &mut out, 16, true);
        assert_eq!(shared.status(), ChannelStatus::Play);
        assert!(shared.rendering.get());
    }

    #[test]
    fn test_rewind_jumps_to_begin() {
        let mut ch = channel(SamplePlayerMode::SingleBasic, 100);
        ch.set_trim(20, 100).unwrap();
        let shared = playing();
        shared.command(RenderMode::Normal, 0);
        shared.command(RenderMode::Rewind, 3);

        let mut out = AudioBuffer::new(6, 2);
        render(&ch, &shared, &mut out, 6, true);
        assert_relative_eq!(out.get(0, 0), 0.020);
        assert_relative_eq!(out.get(2, 0), 0.022);
        assert_relative_eq!(out.get(3, 0), 0.020);
    }

    #[test]
    fn test_pitch_interpolates() {
        let mut ch = channel(SamplePlayerMode::SingleBasic, 100);
        ch.set_pitch(0.5);
        let shared = playing();
        shared.command(RenderMode::Normal, 0);
        let mut out = AudioBuffer::new(4, 2);
        render(&ch, &shared, &mut out, 4, true);
        assert_relative_eq!(out.get(1, 0), 0.0005);
        assert_relative_eq!(out.get(2, 0), 0.001);
    }

    #[test]
    fn test_command_beyond_buffer_lands_in_the_next_one() {
        let ch = channel(SamplePlayerMode::SingleBasic, 100);
        let shared = playing();
        shared.command_rt(RenderMode::Normal, 10);

        let mut out = AudioBuffer::new(8, 2);
        render(&ch, &shared, &mut out, 8, true);
        assert_eq!(out.peak(8), 0.0);

        out.clear();
        render(&ch, &shared, &mut out, 8, true);
        assert_eq!(out.get(1, 0), 0.0);
        assert_relative_eq!(out.get(3, 0), 0.001);
    }
}
