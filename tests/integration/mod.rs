//! Integration test modules for rondo

pub mod channels;
pub mod engine;
pub mod midi;
pub mod persistence;
pub mod properties;
pub mod recording;
pub mod transport;
