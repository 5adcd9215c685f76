//! Error types for rondo-core.

use thiserror::Error;

use crate::store::ThreadRole;

/// Error type for rondo-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid tempo: {0}. Must be between 20.0 and 999.0 BPM")]
    InvalidTempo(f32),

    #[error("Invalid loop length: {beats} beats over {bars} bars")]
    InvalidBeats { beats: u32, bars: u32 },

    #[error("Thread is not registered with this store")]
    UnregisteredThread,

    #[error("Thread is already registered as {0:?}")]
    ThreadAlreadyRegistered(ThreadRole),

    #[error("Another thread already holds the audio role")]
    AudioRoleTaken,

    #[error("Role {role:?} cannot be registered with realtime={realtime}")]
    RoleMismatch { role: ThreadRole, realtime: bool },

    #[error("Operation not allowed from a {0:?} thread")]
    WrongRole(ThreadRole),

    #[error("No free generation slot: too many snapshots held")]
    NoFreeGeneration,

    #[error("Quantizer slot table is full ({0} slots)")]
    QuantizerFull(usize),

    #[error("Failed to spawn thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
