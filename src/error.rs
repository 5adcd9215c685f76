//! Centralized error type for the rondo umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use rondo_core::ChannelId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] rondo_core::Error),

    #[error("MIDI: {0}")]
    Midi(#[from] rondo_midi::Error),

    #[error(transparent)]
    Channels(#[from] rondo_channels::Error),

    #[error("Channel {0} not found")]
    ChannelNotFound(ChannelId),

    #[error("Channel {0} is internal and cannot be removed")]
    InternalChannel(ChannelId),

    #[error("{0} cannot change while the engine runs")]
    DeviceConfigChanged(&'static str),

    #[error("The audio renderer was already taken")]
    RendererTaken,

    #[cfg(feature = "cpal-output")]
    #[error("Invalid audio device: {0}")]
    InvalidDevice(String),

    #[cfg(feature = "cpal-output")]
    #[error("Audio device not available")]
    DeviceNotAvailable(#[from] cpal::DefaultStreamConfigError),

    #[cfg(feature = "cpal-output")]
    #[error("Failed to build audio stream")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[cfg(feature = "cpal-output")]
    #[error("Failed to play audio stream")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[cfg(feature = "cpal-output")]
    #[error("Failed to enumerate devices")]
    Devices(#[from] cpal::DevicesError),

    #[cfg(feature = "cpal-output")]
    #[error("Failed to get device name")]
    DeviceName(#[from] cpal::DeviceNameError),
}

pub type Result<T> = std::result::Result<T, Error>;
