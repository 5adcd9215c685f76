//! Action and input recording control. Runs on the dispatcher thread.
//!
//! Action recording only flips a flag: channels record their own presses
//! while it is set. Stopping links note pairs and lets every channel that
//! received something start reading it back.
//!
//! Input recording arms the mixer, which writes device input into a
//! preallocated take. Stopping turns the take into a [`Wave`] and installs
//! it on every armed channel.

use std::sync::Arc;

use rondo_channels::{MixerShared, Wave};
use rondo_core::config::MAX_BEATS;
use rondo_core::{ChannelId, EngineConfig, Frame, InputRecMode, SequencerStatus, SwapKind};
use tracing::{debug, info, warn};

use crate::layout::Layout;

#[derive(Debug, Default)]
pub struct Recorder {
    /// Action count per channel when action recording started.
    baseline: Vec<(ChannelId, usize)>,
    takes: u32,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_action_rec(&mut self, layout: &mut Layout) -> SwapKind {
        if layout.recording_actions {
            return SwapKind::None;
        }
        self.baseline = layout
            .channels
            .iter()
            .map(|ch| (ch.id, layout.actions.actions_of(ch.id).len()))
            .collect();
        layout.recording_actions = true;
        if !layout.sequencer.is_active() {
            layout.sequencer.start();
        }
        info!("action recording started");
        SwapKind::Soft
    }

    pub fn stop_action_rec(&mut self, layout: &mut Layout) -> SwapKind {
        if !layout.recording_actions {
            return SwapKind::None;
        }
        layout.recording_actions = false;

        let Layout {
            channels, actions, ..
        } = layout;
        for channel in channels.iter() {
            let before = self
                .baseline
                .iter()
                .find(|(id, _)| *id == channel.id)
                .map_or(0, |(_, count)| *count);
            if actions.actions_of(channel.id).len() <= before {
                continue;
            }
            actions.consolidate(channel.id);
            if !channel.is_reading_actions() {
                channel.shared.start_reading_actions();
            }
        }
        self.baseline.clear();
        info!("action recording stopped");
        SwapKind::Soft
    }

    /// Starts now, or arms the input trigger when `signal` is set.
    pub fn start_input_rec(
        &mut self,
        layout: &mut Layout,
        mixer: &MixerShared,
        config: &EngineConfig,
        signal: bool,
    ) -> SwapKind {
        if layout.recording_input {
            return SwapKind::None;
        }
        if !layout.channels.iter().any(|ch| ch.can_input_rec()) {
            warn!("input recording requested with no armed channel");
            return SwapKind::None;
        }
        layout.recording_input = true;

        if signal && !layout.sequencer.is_running() {
            layout.sequencer.start_on_signal();
            mixer.wait_for_signal();
            info!("input recording waiting for signal");
            return SwapKind::Soft;
        }
        if !layout.sequencer.is_active() {
            layout.sequencer.start();
        }
        mixer.start_input_rec(max_frames(layout, config), config.input_channels);
        info!("input recording started");
        SwapKind::Soft
    }

    /// The mixer heard the trigger level.
    pub fn on_signal(
        &mut self,
        layout: &mut Layout,
        mixer: &MixerShared,
        config: &EngineConfig,
    ) -> SwapKind {
        if !layout.recording_input || mixer.is_recording_input() {
            return SwapKind::None;
        }
        layout.sequencer.on_signal();
        mixer.start_input_rec(max_frames(layout, config), config.input_channels);
        debug!("input signal detected");
        SwapKind::Soft
    }

    /// Stops recording and hands the take to every armed channel.
    pub fn stop_input_rec(
        &mut self,
        layout: &mut Layout,
        mixer: &MixerShared,
        config: &EngineConfig,
    ) -> SwapKind {
        if !layout.recording_input {
            return SwapKind::None;
        }
        layout.recording_input = false;
        let was_waiting = mixer.is_waiting_for_signal();
        let take = mixer.stop_input_rec();
        if was_waiting && layout.sequencer.status() == SequencerStatus::Waiting {
            layout.sequencer.stop();
        }
        if take.frames() == 0 {
            info!("input recording stopped, nothing captured");
            return SwapKind::Soft;
        }

        let frames = take.frames() as Frame;
        self.takes += 1;
        let wave = match Wave::new(take, config.sample_rate) {
            Ok(wave) => Arc::new(wave.with_name(format!("take-{}", self.takes))),
            Err(e) => {
                warn!(error = %e, "discarding input take");
                return SwapKind::Soft;
            }
        };

        let mut installed = 0;
        for channel in layout.channels.iter_mut().filter(|ch| ch.can_input_rec()) {
            if let Some(body) = channel.sample_mut() {
                body.set_wave(Some(Arc::clone(&wave)));
                installed += 1;
            }
        }
        if config.input_rec_mode == InputRecMode::Free {
            fit_loop_to(layout, frames);
        }
        info!(frames, channels = installed, "input recording stopped");
        SwapKind::Hard
    }

    /// A stopping sequencer ends every recording in progress.
    pub fn on_sequencer_stop(
        &mut self,
        layout: &mut Layout,
        mixer: &MixerShared,
        config: &EngineConfig,
    ) -> SwapKind {
        let actions = self.stop_action_rec(layout);
        let input = self.stop_input_rec(layout, mixer, config);
        actions.max(input)
    }
}

fn max_frames(layout: &Layout, config: &EngineConfig) -> Frame {
    match config.input_rec_mode {
        InputRecMode::Rigid => layout.sequencer.frames_in_loop(),
        InputRecMode::Free => layout.sequencer.max_frames_in_loop(),
    }
}

/// Resizes the loop to the smallest whole number of beats holding `frames`.
fn fit_loop_to(layout: &mut Layout, frames: Frame) {
    let seq = &mut layout.sequencer;
    let beats = frames
        .div_ceil(seq.frames_in_beat().max(1))
        .clamp(1, Frame::from(MAX_BEATS)) as u32;
    let bars = seq.bars().min(beats);
    if let Err(e) = seq.set_beats(beats, bars) {
        warn!(error = %e, "could not fit loop to input take");
    }
}
