//! Action recording and read-actions control for sample channels.
//! Dispatcher thread only.

use rondo_core::{Event, EventKind};
use rondo_midi::MidiEvent;

use super::{SampleChannel, SamplePlayerMode};
use crate::channel::{ChannelInfo, ReactContext};
use crate::shared::ChannelShared;
use crate::status::ChannelStatus;

pub(crate) fn react(
    ch: &SampleChannel,
    info: &ChannelInfo<'_>,
    event: &Event,
    ctx: &mut ReactContext<'_>,
) {
    let shared = &**info.shared;
    let running = ctx.sequencer.is_running();
    match event.kind {
        EventKind::ChannelToggleReadActions => {
            if ctx.actions.has_actions(info.id) || shared.rec_status.load() != ChannelStatus::Off {
                toggle_read_actions(shared, ctx.treat_recs_as_loops, running);
            }
        }
        EventKind::ChannelKillReadActions => {
            // Only meaningful when recordings wait for the loop start.
            if ctx.treat_recs_as_loops {
                shared.stop_reading_actions();
            }
        }
        EventKind::KeyPress { velocity } if can_record(ch, ctx) => {
            let frame = ctx.sequencer.current_frame_quantized();
            ctx.actions
                .rec(info.id, frame, MidiEvent::note_on(0, 0, velocity));
        }
        EventKind::KeyRelease if ch.mode == SamplePlayerMode::SinglePress && can_record(ch, ctx) => {
            let frame = ctx.sequencer.current_frame();
            ctx.actions.rec(info.id, frame, MidiEvent::note_off(0, 0, 0));
        }
        EventKind::KeyKill if can_record(ch, ctx) => {
            let frame = ctx.sequencer.current_frame();
            ctx.actions.rec(info.id, frame, MidiEvent::note_kill(0, 0));
        }
        _ => {}
    }
}

fn can_record(ch: &SampleChannel, ctx: &ReactContext<'_>) -> bool {
    ctx.recording_actions && ctx.sequencer.is_running() && ch.can_action_rec()
}

/// A channel still waiting for the first beat counts as reading.
pub(crate) fn toggle_read_actions(shared: &ChannelShared, treat_recs_as_loops: bool, running: bool) {
    let reading = shared.read_actions.get();
    if reading || shared.rec_status.load() == ChannelStatus::Wait {
        stop_read_actions(shared, treat_recs_as_loops, running);
    } else {
        start_read_actions(shared, treat_recs_as_loops);
    }
}

fn start_read_actions(shared: &ChannelShared, treat_recs_as_loops: bool) {
    if treat_recs_as_loops {
        shared.rec_status.store(ChannelStatus::Wait);
    } else {
        shared.start_reading_actions();
    }
}

fn stop_read_actions(shared: &ChannelShared, treat_recs_as_loops: bool, running: bool) {
    if !running || !treat_recs_as_loops {
        shared.stop_reading_actions();
        return;
    }
    match shared.rec_status.load() {
        ChannelStatus::Wait | ChannelStatus::Ending => shared.rec_status.store(ChannelStatus::Play),
        ChannelStatus::Play => shared.rec_status.store(ChannelStatus::Ending),
        ChannelStatus::Off => {}
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::sample::testing::channel;
    use rondo_core::{ActionRecorder, ChannelId, EngineConfig, MidiStatus, Sequencer};

    const ID: ChannelId = 9;

    struct Rig {
        seq: Sequencer,
        actions: ActionRecorder,
        shared: Arc<ChannelShared>,
        recording: bool,
        loops: bool,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                seq: Sequencer::new(&EngineConfig::default()),
                actions: ActionRecorder::new(),
                shared: Arc::new(ChannelShared::new()),
                recording: true,
                loops: false,
            }
        }

        fn send(&mut self, ch: &SampleChannel, kind: EventKind) {
            let mut ctx = ReactContext {
                sequencer: &self.seq,
                actions: &mut self.actions,
                recording_actions: self.recording,
                chans_stop_on_seq_halt: false,
                treat_recs_as_loops: self.loops,
            };
            let info = ChannelInfo {
                id: ID,
                shared: &self.shared,
                muted: false,
                armed: false,
            };
            react(ch, &info, &Event::for_channel(ID, kind), &mut ctx);
        }
    }

    #[test]
    fn test_press_release_kill_are_recorded_while_running() {
        let mut rig = Rig::new();
        let ch = channel(SamplePlayerMode::SinglePress, 100);
        rig.seq.start();
        rig.send(&ch, EventKind::KeyPress { velocity: 90 });
        rig.send(&ch, EventKind::KeyRelease);
        rig.send(&ch, EventKind::KeyKill);

        let statuses: Vec<_> = rig
            .actions
            .actions_of(ID)
            .iter()
            .map(|a| a.event.status())
            .collect();
        assert_eq!(
            statuses,
            vec![
                Some(MidiStatus::NoteOn),
                Some(MidiStatus::NoteOff),
                Some(MidiStatus::NoteKill)
            ]
        );
    }

    #[test]
    fn test_nothing_recorded_when_stopped_or_looping() {
        let mut rig = Rig::new();
        let one_shot = channel(SamplePlayerMode::SingleBasic, 100);
        rig.send(&one_shot, EventKind::KeyPress { velocity: 90 });
        assert!(rig.actions.is_empty());

        rig.seq.start();
        let looped = channel(SamplePlayerMode::LoopBasic, 100);
        rig.send(&looped, EventKind::KeyPress { velocity: 90 });
        assert!(rig.actions.is_empty());

        rig.recording = false;
        rig.send(&one_shot, EventKind::KeyPress { velocity: 90 });
        assert!(rig.actions.is_empty());
    }

    #[test]
    fn test_toggle_read_actions_immediate() {
        let mut rig = Rig::new();
        let ch = channel(SamplePlayerMode::SingleBasic, 100);
        rig.actions.rec(ID, 10, MidiEvent::note_on(0, 0, 100));
        rig.send(&ch, EventKind::ChannelToggleReadActions);
        assert!(rig.shared.is_reading_actions());
        assert!(rig.shared.read_actions.get());
        rig.send(&ch, EventKind::ChannelToggleReadActions);
        assert_eq!(rig.shared.rec_status.load(), ChannelStatus::Off);
    }

    #[test]
    fn test_toggle_read_actions_as_loops() {
        let mut rig = Rig::new();
        rig.loops = true;
        rig.seq.start();
        let ch = channel(SamplePlayerMode::SingleBasic, 100);
        rig.actions.rec(ID, 10, MidiEvent::note_on(0, 0, 100));

        rig.send(&ch, EventKind::ChannelToggleReadActions);
        assert_eq!(rig.shared.rec_status.load(), ChannelStatus::Wait);
        assert!(!rig.shared.read_actions.get());

        // Toggling again while waiting starts reading right away.
        rig.send(&ch, EventKind::ChannelToggleReadActions);
        assert_eq!(rig.shared.rec_status.load(), ChannelStatus::Play);

        rig.shared.start_reading_actions();
        rig.send(&ch, EventKind::ChannelToggleReadActions);
        assert_eq!(rig.shared.rec_status.load(), ChannelStatus::Ending);

        rig.send(&ch, EventKind::ChannelKillReadActions);
        assert_eq!(rig.shared.rec_status.load(), ChannelStatus::Off);
    }

    #[test]
    fn test_toggle_without_actions_does_nothing() {
        let mut rig = Rig::new();
        let ch = channel(SamplePlayerMode::SingleBasic, 100);
        rig.send(&ch, EventKind::ChannelToggleReadActions);
        assert_eq!(rig.shared.rec_status.load(), ChannelStatus::Off);
    }
}
