//! Error types for rondo-midi.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Empty MIDI message")]
    Empty,

    #[error("Invalid MIDI message: {0}")]
    Parse(String),

    #[error("Unsupported MIDI status byte: {0:#04x}")]
    Unsupported(u8),
}

impl From<midi_msg::ParseError> for Error {
    fn from(err: midi_msg::ParseError) -> Self {
        Error::Parse(format!("{err:?}"))
    }
}

pub type Result<T> = core::result::Result<T, Error>;
