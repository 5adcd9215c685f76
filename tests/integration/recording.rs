//! Input and action recording through the engine

use rondo::prelude::*;

use crate::helpers::*;

/// Renders `frames` frames of constant stereo input in engine-sized blocks.
fn feed(audio: &AudioThread, frames: usize, level: f32) {
    let mut done = 0;
    while done < frames {
        let n = TEST_BUFFER_SIZE.min(frames - done);
        audio.render_input(vec![level; n * 2], n);
        done += n;
    }
}

fn armed_channel(engine: &Engine) -> ChannelId {
    let id = engine.add_channel(ChannelKind::Sample).unwrap();
    engine.toggle_arm(id);
    dispatch(engine);
    id
}

fn wave_of(engine: &Engine, id: ChannelId) -> Option<String> {
    let snapshot = engine.dehydrate().unwrap();
    let ch = snapshot.channels.into_iter().find(|c| c.id == id)?;
    ch.sample.and_then(|s| s.wave)
}

#[test]
fn test_rigid_recording_fills_one_loop() {
    let engine = test_engine();
    engine.set_beats(1, 1);
    dispatch(&engine);
    let id = armed_channel(&engine);
    let audio = AudioThread::for_engine(&engine);

    assert!(engine.start_input_rec(false));
    dispatch(&engine);
    let status = engine.transport_status().unwrap();
    assert!(status.recording_input);
    assert_eq!(status.status, SequencerStatus::Running);

    // One loop is 8000 frames; the mixer reports the end of the take.
    feed(&audio, 8_000, 0.25);
    assert!(dispatch(&engine) >= 1);

    assert!(!engine.transport_status().unwrap().recording_input);
    assert_eq!(wave_of(&engine, id).as_deref(), Some("take-1"));
    let snapshot = engine.dehydrate().unwrap();
    let sample = snapshot
        .channels
        .iter()
        .find(|c| c.id == id)
        .and_then(|c| c.sample.as_ref())
        .unwrap();
    assert_eq!(sample.end, 8_000);
}

#[test]
fn test_recording_waits_for_input_signal() {
    let engine = test_engine();
    let id = armed_channel(&engine);
    let audio = AudioThread::for_engine(&engine);

    engine.start_input_rec(true);
    dispatch(&engine);
    assert_eq!(
        engine.transport_status().unwrap().status,
        SequencerStatus::Waiting
    );

    // -40 dBFS stays under the default trigger level.
    feed(&audio, 256, 0.01);
    assert_eq!(dispatch(&engine), 0);
    assert_eq!(
        engine.transport_status().unwrap().status,
        SequencerStatus::Waiting
    );

    feed(&audio, TEST_BUFFER_SIZE, 0.8);
    assert_eq!(dispatch(&engine), 1);
    assert_eq!(
        engine.transport_status().unwrap().status,
        SequencerStatus::Running
    );

    feed(&audio, TEST_BUFFER_SIZE, 0.8);
    engine.stop_input_rec();
    dispatch(&engine);
    assert!(!engine.transport_status().unwrap().recording_input);
    assert_eq!(wave_of(&engine, id).as_deref(), Some("take-1"));
}

#[test]
fn test_stopping_before_the_signal_discards_the_take() {
    let engine = test_engine();
    let id = armed_channel(&engine);
    let _audio = AudioThread::for_engine(&engine);

    engine.start_input_rec(true);
    dispatch(&engine);
    engine.stop_input_rec();
    dispatch(&engine);

    let status = engine.transport_status().unwrap();
    assert!(!status.recording_input);
    assert_eq!(status.status, SequencerStatus::Stopped);
    assert_eq!(wave_of(&engine, id), None);
}

#[test]
fn test_input_recording_needs_an_armed_channel() {
    let engine = test_engine();
    engine.add_channel(ChannelKind::Sample).unwrap();

    engine.start_input_rec(false);
    dispatch(&engine);
    assert!(!engine.transport_status().unwrap().recording_input);
}

#[test]
fn test_action_recording_reads_back_presses() {
    let engine = test_engine();
    let id = sample_channel(&engine, SamplePlayerMode::SingleBasic, constant_wave("hit", 500, 0.5));
    let audio = AudioThread::for_engine(&engine);

    engine.start_action_rec();
    dispatch(&engine);
    let status = engine.transport_status().unwrap();
    assert!(status.recording_actions);
    assert_eq!(status.status, SequencerStatus::Running);

    audio.run(256, TEST_BUFFER_SIZE);
    engine.key_press(id, 100);
    dispatch(&engine);
    audio.run(256, TEST_BUFFER_SIZE);

    engine.stop_action_rec();
    dispatch(&engine);
    let snapshot = engine.dehydrate().unwrap();
    let ch = snapshot.channels.iter().find(|c| c.id == id).unwrap();
    assert!(ch.read_actions);
    assert!(!ch.actions.is_empty());
    assert!(!engine.transport_status().unwrap().recording_actions);
}

#[test]
fn test_sequencer_stop_ends_recordings() {
    let engine = test_engine();
    armed_channel(&engine);
    engine.start_action_rec();
    engine.start_input_rec(false);
    dispatch(&engine);

    engine.stop();
    dispatch(&engine);
    let status = engine.transport_status().unwrap();
    assert!(!status.recording_actions);
    assert!(!status.recording_input);
}
