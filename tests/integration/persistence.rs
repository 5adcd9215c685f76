//! Session save and load

use std::collections::HashMap;

use approx::assert_relative_eq;
use rondo::prelude::*;
use rondo::EngineSnapshot;

use crate::helpers::*;

fn session(engine: &Engine) -> (ChannelId, ChannelId, Arc<Wave>) {
    let kick = constant_wave("kick.wav", 400, 0.5);
    let a = sample_channel(engine, SamplePlayerMode::LoopOnce, Arc::clone(&kick));
    let b = engine.add_channel(ChannelKind::Midi).unwrap();
    engine.set_bpm(132.0);
    engine.set_beats(8, 2);
    engine.set_quantize(4);
    engine.set_volume(a, 0.4);
    engine.set_pan(a, 0.25);
    engine.toggle_mute(b);
    engine.set_volume(rondo::channels::MASTER_OUT_ID, 0.8);
    dispatch(engine);
    (a, b, kick)
}

#[test]
fn test_snapshot_survives_json() {
    let engine = test_engine();
    let (_, _, kick) = session(&engine);
    let saved = engine.dehydrate().unwrap();

    let json = serde_json::to_string_pretty(&saved).unwrap();
    let parsed: EngineSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, saved);

    let other = test_engine();
    let waves = HashMap::from([("kick.wav".to_owned(), kick)]);
    other.hydrate(&parsed, &waves).unwrap();
    assert_eq!(other.dehydrate().unwrap(), saved);

    let status = other.transport_status().unwrap();
    assert_relative_eq!(status.bpm, 132.0);
    assert_eq!((status.beats, status.bars, status.quantize), (8, 2, 4));
}

#[test]
fn test_missing_wave_leaves_channel_empty() {
    let engine = test_engine();
    let (a, _, _) = session(&engine);
    let saved = engine.dehydrate().unwrap();

    let other = test_engine();
    other.hydrate(&saved, &HashMap::new()).unwrap();
    let loaded = other.dehydrate().unwrap();
    let ch = loaded.channels.iter().find(|c| c.id == a).unwrap();
    assert_eq!(ch.sample.as_ref().unwrap().wave, None);
    assert_relative_eq!(ch.volume, 0.4);
}

#[test]
fn test_hydrate_stops_everything() {
    let engine = test_engine();
    let id = sample_channel(&engine, SamplePlayerMode::SingleEndless, constant_wave("pad", 64, 0.5));
    let saved = engine.dehydrate().unwrap();
    let audio = AudioThread::for_engine(&engine);

    engine.start();
    engine.key_press(id, 127);
    dispatch(&engine);
    audio.render(TEST_BUFFER_SIZE);
    assert_eq!(engine.channel_status(id).unwrap(), ChannelStatus::Play);

    let waves = HashMap::from([("pad".to_owned(), constant_wave("pad", 64, 0.5))]);
    engine.hydrate(&saved, &waves).unwrap();
    assert_eq!(engine.channel_status(id).unwrap(), ChannelStatus::Off);
    assert_eq!(
        engine.transport_status().unwrap().status,
        SequencerStatus::Stopped
    );
    assert_silence(&audio.render(TEST_BUFFER_SIZE), 0.0);
}

#[test]
fn test_older_sessions_fill_in_defaults() {
    let json = r#"{
        "bpm": 90.0,
        "beats": 4,
        "bars": 1,
        "quantize": 0,
        "channels": []
    }"#;
    let snapshot: EngineSnapshot = serde_json::from_str(json).unwrap();
    assert!(!snapshot.metronome);

    let engine = test_engine();
    engine.hydrate(&snapshot, &HashMap::new()).unwrap();
    assert_eq!(engine.channel_ids().unwrap(), vec![1, 2, 3]);
    assert_relative_eq!(engine.transport_status().unwrap().bpm, 90.0);
}
