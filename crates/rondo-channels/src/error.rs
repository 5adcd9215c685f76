//! Error types for rondo-channels.

use rondo_core::ChannelId;
use thiserror::Error;

use crate::ChannelKind;

/// Error type for channel operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Channel {0} not found")]
    ChannelNotFound(ChannelId),

    #[error("Channel {id} is a {kind:?} channel")]
    WrongKind { id: ChannelId, kind: ChannelKind },

    #[error("Invalid wave: {0}")]
    InvalidWave(String),

    #[error("Invalid trim: begin {begin}, end {end}, wave length {len}")]
    InvalidTrim { begin: u64, end: u64, len: u64 },

    #[error(transparent)]
    Core(#[from] rondo_core::Error),
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
