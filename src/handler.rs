//! Applies dispatched events to the working layout.

use std::sync::Arc;

use arc_swap::ArcSwap;
use rondo_channels::{MixerShared, ReactContext};
use rondo_core::{DispatchHandler, EngineConfig, Event, EventKind, SwapKind};
use tracing::warn;

use crate::layout::Layout;
use crate::recorder::Recorder;

/// The dispatcher's view of the engine: transport and recorder on one side,
/// channels on the other.
pub struct EngineHandler {
    config: Arc<ArcSwap<EngineConfig>>,
    mixer: Arc<MixerShared>,
    recorder: Recorder,
}

impl EngineHandler {
    pub fn new(config: Arc<ArcSwap<EngineConfig>>, mixer: Arc<MixerShared>) -> Self {
        Self {
            config,
            mixer,
            recorder: Recorder::new(),
        }
    }

    fn process_sequencer_event(&mut self, layout: &mut Layout, event: &Event) -> SwapKind {
        let config = self.config.load();
        let seq = &mut layout.sequencer;
        match event.kind {
            EventKind::SequencerStart => {
                seq.start();
                SwapKind::Soft
            }
            EventKind::SequencerStop => {
                seq.stop();
                self.recorder
                    .on_sequencer_stop(layout, &self.mixer, &config)
                    .max(SwapKind::Soft)
            }
            EventKind::SequencerRewind => {
                seq.rewind();
                SwapKind::Soft
            }
            EventKind::SequencerBpm(bpm) => match seq.set_bpm(bpm) {
                Ok(ratio) => {
                    let step = seq.quantizer_step();
                    layout.actions.update_bpm(ratio, step);
                    SwapKind::Soft
                }
                Err(e) => {
                    warn!(error = %e, "tempo change rejected");
                    SwapKind::None
                }
            },
            EventKind::SequencerBeats { beats, bars } => match seq.set_beats(beats, bars) {
                Ok(()) => SwapKind::Soft,
                Err(e) => {
                    warn!(error = %e, "loop length change rejected");
                    SwapKind::None
                }
            },
            EventKind::SequencerGoToBeat(beat) => {
                seq.go_to_beat(beat);
                SwapKind::Soft
            }
            EventKind::SequencerQuantize(quantize) => {
                seq.set_quantize(quantize);
                SwapKind::Soft
            }
            EventKind::SequencerMetronome(on) => {
                seq.set_metronome(on);
                SwapKind::Soft
            }
            EventKind::ActionRecStart => self.recorder.start_action_rec(layout),
            EventKind::ActionRecStop => self.recorder.stop_action_rec(layout),
            EventKind::InputRecStart { signal } => {
                self.recorder
                    .start_input_rec(layout, &self.mixer, &config, signal)
            }
            EventKind::InputRecStop | EventKind::MixerEndOfRecording => {
                self.recorder.stop_input_rec(layout, &self.mixer, &config)
            }
            EventKind::MixerSignalThreshold => {
                self.recorder.on_signal(layout, &self.mixer, &config)
            }
            _ => SwapKind::None,
        }
    }
}

impl DispatchHandler<Layout> for EngineHandler {
    fn on_process_sequencer(&mut self, layout: &mut Layout, events: &[Event]) -> SwapKind {
        events
            .iter()
            .map(|event| self.process_sequencer_event(layout, event))
            .max()
            .unwrap_or_default()
    }

    fn on_process_channels(&mut self, layout: &mut Layout, events: &[Event]) -> SwapKind {
        let config = self.config.load();
        let Layout {
            channels,
            sequencer,
            actions,
            recording_actions,
            ..
        } = layout;
        let mut ctx = ReactContext {
            sequencer,
            actions,
            recording_actions: *recording_actions,
            chans_stop_on_seq_halt: config.chans_stop_on_seq_halt,
            treat_recs_as_loops: config.treat_recs_as_loops,
        };
        for event in events {
            for channel in channels.iter_mut() {
                channel.react(event, &mut ctx);
            }
        }
        SwapKind::Soft
    }
}
