//! Transport integration tests
//!
//! Sequencer events travel through the dispatcher; the play head moves only
//! when the audio thread renders.

use approx::assert_relative_eq;
use rondo::prelude::*;
use rondo::SwapKind;

use crate::helpers::*;

#[test]
fn test_transport_events_apply_on_dispatch() {
    let engine = test_engine();
    assert!(engine.start());
    assert_eq!(
        engine.transport_status().unwrap().status,
        SequencerStatus::Stopped
    );

    assert_eq!(dispatch(&engine), 1);
    assert_eq!(
        engine.transport_status().unwrap().status,
        SequencerStatus::Running
    );

    engine.stop();
    dispatch(&engine);
    assert_eq!(
        engine.transport_status().unwrap().status,
        SequencerStatus::Stopped
    );
}

#[test]
fn test_play_head_follows_rendered_frames() {
    let engine = test_engine();
    let audio = AudioThread::for_engine(&engine);

    // Stopped: rendering does not move the play head.
    audio.run(1000, TEST_BUFFER_SIZE);
    assert_eq!(engine.transport_status().unwrap().current_frame, 0);

    engine.start();
    dispatch(&engine);
    audio.run(8_000 + 100, TEST_BUFFER_SIZE);

    let status = engine.transport_status().unwrap();
    assert_eq!(status.current_frame, 8_100);
    assert_eq!(status.current_beat, 1);
    assert_eq!(status.frames_in_loop, 32_000);
}

#[test]
fn test_loop_wraps_at_its_end() {
    let engine = test_engine();
    engine.set_beats(1, 1);
    engine.start();
    dispatch(&engine);
    let audio = AudioThread::for_engine(&engine);

    audio.run(8_000 * 2 + 10, 512);
    assert_eq!(engine.transport_status().unwrap().current_frame, 10);
}

#[test]
fn test_tempo_and_loop_length() {
    let engine = test_engine();
    engine.set_bpm(120.0);
    engine.set_beats(8, 2);
    dispatch(&engine);

    let status = engine.transport_status().unwrap();
    assert_relative_eq!(status.bpm, 120.0);
    assert_eq!((status.beats, status.bars), (8, 2));
    assert_eq!(status.frames_in_loop, 8 * 4_000);

    // Out of range: ignored, previous values kept.
    engine.set_bpm(5.0);
    engine.set_beats(4, 8);
    dispatch(&engine);
    let status = engine.transport_status().unwrap();
    assert_relative_eq!(status.bpm, 120.0);
    assert_eq!((status.beats, status.bars), (8, 2));
}

#[test]
fn test_go_to_beat_lands_on_next_block() {
    let engine = test_engine();
    engine.start();
    engine.go_to_beat(2);
    dispatch(&engine);
    let audio = AudioThread::for_engine(&engine);

    audio.render(10);
    assert_eq!(engine.transport_status().unwrap().current_frame, 16_010);
}

#[test]
fn test_metronome_clicks_only_when_enabled() {
    let engine = test_engine();
    engine.start();
    dispatch(&engine);
    let audio = AudioThread::for_engine(&engine);
    assert_silence(&audio.render(TEST_BUFFER_SIZE), 0.0);

    // Next beat: frame 8000.
    engine.set_metronome(true);
    dispatch(&engine);
    audio.run(8_000 - TEST_BUFFER_SIZE, TEST_BUFFER_SIZE);
    let click = audio.render(TEST_BUFFER_SIZE);
    assert!(peak(&click) > 0.1);
    assert!(engine.transport_status().unwrap().metronome);
}

/// Two events enqueued before a publish are both in that generation; an
/// event enqueued after it is not.
#[test]
fn test_publish_contains_events_enqueued_before_it() {
    let engine = test_engine();
    let id = sample_channel(&engine, SamplePlayerMode::SingleBasic, constant_wave("c", 10, 0.5));
    let notices = engine.subscribe();

    engine.set_volume(id, 0.5);
    engine.toggle_mute(id);
    dispatch(&engine);
    let notice = notices.try_recv().expect("one publish");
    assert_eq!(notice.kind, SwapKind::Soft);
    assert_eq!(notice.generation, engine.generation());

    engine.set_volume(id, 0.25);
    let snapshot = engine.dehydrate().unwrap();
    let ch = snapshot.channels.iter().find(|c| c.id == id).unwrap();
    assert_relative_eq!(ch.volume, 0.5);
    assert!(ch.mute);
    assert!(notices.try_recv().is_err());

    dispatch(&engine);
    let snapshot = engine.dehydrate().unwrap();
    let ch = snapshot.channels.iter().find(|c| c.id == id).unwrap();
    assert_relative_eq!(ch.volume, 0.25);
}

#[test]
fn test_structural_changes_publish_hard() {
    let engine = test_engine();
    let notices = engine.subscribe();
    let before = engine.generation();

    engine.add_channel(ChannelKind::Sample).unwrap();
    let notice = notices.try_recv().unwrap();
    assert_eq!(notice.kind, SwapKind::Hard);
    assert_eq!(notice.generation, before + 1);
}
