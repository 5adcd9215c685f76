//! CPAL output stream driving an [`AudioRenderer`].

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rondo_core::AtomicFlag;
use tracing::info;

use crate::renderer::AudioRenderer;
use crate::{Error, Result};

/// Largest device block handed to the renderer in one call.
const SCRATCH_FRAMES: usize = 4096;

/// Wrapper to hold a `cpal::Stream` in a `Send` context.
///
/// `cpal::Stream` is `!Send` on some platforms. `AudioOutput` owns it for its
/// whole life and never hands out a reference, so it is never used from two
/// threads at once.
struct StreamHandle(#[allow(dead_code)] cpal::Stream);

// SAFETY: the stream is only touched through `&mut AudioOutput` or on drop.
unsafe impl Send for StreamHandle {}

/// A running output stream. Dropping it closes the device.
pub struct AudioOutput {
    sample_rate: u32,
    channels: usize,
    ready: Arc<AtomicFlag>,
    _stream: StreamHandle,
}

impl AudioOutput {
    /// Opens output device `index` (or the default) and starts rendering.
    ///
    /// The device must run at the renderer's sample rate. There is no input
    /// stream; the renderer sees silence on its input.
    pub fn start(renderer: AudioRenderer, index: Option<usize>) -> Result<Self> {
        let device = Self::get_device(index)?;
        let config = device.default_output_config()?;
        let sample_rate = config.sample_rate().0;
        if sample_rate != renderer.sample_rate() {
            return Err(Error::InvalidDevice(format!(
                "device runs at {} Hz, engine at {} Hz",
                sample_rate,
                renderer.sample_rate()
            )));
        }
        let channels = config.channels() as usize;
        let ready = Arc::new(AtomicFlag::new(false));

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                Self::build_stream::<f32>(&device, &config.into(), renderer, Arc::clone(&ready))?
            }
            cpal::SampleFormat::I16 => {
                Self::build_stream::<i16>(&device, &config.into(), renderer, Arc::clone(&ready))?
            }
            cpal::SampleFormat::U16 => {
                Self::build_stream::<u16>(&device, &config.into(), renderer, Arc::clone(&ready))?
            }
            format => {
                return Err(Error::InvalidDevice(format!(
                    "Unsupported sample format: {:?}",
                    format
                )));
            }
        };

        stream.play()?;
        ready.set(true);
        info!(sample_rate, channels, "audio output started");

        Ok(Self {
            sample_rate,
            channels,
            ready,
            _stream: StreamHandle(stream),
        })
    }

    fn get_device(index: Option<usize>) -> Result<cpal::Device> {
        let host = cpal::default_host();

        if let Some(idx) = index {
            let devices: Vec<_> = host.output_devices()?.collect();

            let device_count = devices.len();
            devices.into_iter().nth(idx).ok_or_else(|| {
                Error::InvalidDevice(format!(
                    "Output device index {} out of range (available: {})",
                    idx, device_count
                ))
            })
        } else {
            host.default_output_device()
                .ok_or_else(|| Error::InvalidDevice("No output device available".to_string()))
        }
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        mut renderer: AudioRenderer,
        ready: Arc<AtomicFlag>,
    ) -> Result<cpal::Stream>
    where
        T: cpal::SizedSample + cpal::FromSample<f32>,
    {
        let device_channels = config.channels as usize;
        let engine_channels = renderer.output_channels().max(1);
        let sample_rate = renderer.sample_rate();
        let mut scratch = vec![0.0f32; SCRATCH_FRAMES * engine_channels];

        let stream = device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    let is_ready = ready.get();
                    for block in data.chunks_mut(SCRATCH_FRAMES * device_channels) {
                        let frames = block.len() / device_channels;
                        let out = &mut scratch[..frames * engine_channels];
                        renderer.render(&[], out, frames, sample_rate, is_ready);

                        for (i, sample) in block.iter_mut().enumerate() {
                            let channel = i % device_channels;
                            let frame = i / device_channels;
                            let value = if channel < engine_channels {
                                out[frame * engine_channels + channel]
                            } else {
                                0.0
                            };
                            *sample = T::from_sample(value);
                        }
                    }
                }));

                if result.is_err() {
                    // Panic in callback - output silence
                    for sample in data.iter_mut() {
                        *sample = T::from_sample(0.0);
                    }
                }
            },
            |_err| {
                // Audio stream error - cannot log from callback
            },
            None,
        )?;

        Ok(stream)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Keeps the stream open but renders silence.
    pub fn pause(&self) {
        self.ready.set(false);
    }

    pub fn resume(&self) {
        self.ready.set(true);
    }

    /// List available output devices.
    pub fn list_output_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices: Result<Vec<String>> = host
            .output_devices()?
            .enumerate()
            .map(|(idx, device)| Ok(format!("{}: {}", idx, device.name()?)))
            .collect();
        devices
    }
}
