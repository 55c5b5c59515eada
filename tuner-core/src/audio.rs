//! # Audio Capture Module
//!
//! This module handles real-time audio capture using CPAL (Cross-Platform Audio Library)
//! and defines the `AudioFrame` handed to the pitch pipeline.
//!
//! ## Features
//! - Input device listing and selection by name, with default-device fallback
//! - Mono 32-bit float capture, no adaptive processing applied
//! - Fixed-size framing of callback data, streamed over a channel
//! - Input gain in dB

use anyhow::Result;
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;
use log::{info, warn};

use crate::error::TunerError;

/// Default number of samples per analysis frame.
///
/// Long enough to hold more than three periods of a 20 Hz tone at 44.1 kHz,
/// which the lag search needs at the bottom of the range.
pub const DEFAULT_FRAME_SIZE: usize = 8192;

/// Preferred capture sample rate in Hz.
pub const TARGET_SAMPLE_RATE: u32 = 44100;

/// One fixed-length block of mono samples, nominally in [-1, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> crate::error::Result<Self> {
        if sample_rate == 0 {
            return Err(TunerError::InvalidSampleRate(sample_rate));
        }
        if samples.is_empty() {
            return Err(TunerError::EmptyFrame);
        }
        Ok(Self { samples, sample_rate })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Applies an input gain given in decibels.
    pub fn amplified(mut self, gain_db: f32) -> Self {
        if gain_db != 0.0 {
            let gain = db_to_linear(gain_db);
            for sample in self.samples.iter_mut() {
                *sample *= gain;
            }
        }
        self
    }
}

/// Converts decibels to a linear amplitude factor.
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Names of every input device the default host exposes.
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let names = host
        .input_devices()?
        .filter_map(|device| device.name().ok())
        .collect();
    Ok(names)
}

/// Starts audio capture and streams fixed-size frames to `sender`.
///
/// The named device is used when present; otherwise the default input device.
/// Frames are sent with `try_send` so the audio callback never blocks; when
/// the consumer falls behind, frames are dropped.
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Audio stream handle and sample rate
/// * `Err(e)` - No usable device or stream configuration
pub fn start_audio_capture(
    device_name: Option<&str>,
    frame_size: usize,
    sender: Sender<Vec<f32>>,
) -> Result<(cpal::Stream, u32)> {
    if frame_size == 0 {
        return Err(TunerError::Audio("frame size must be positive".to_string()).into());
    }

    let device = select_input_device(device_name)?;
    info!("Using audio input device: {}", device.name()?);

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, TARGET_SAMPLE_RATE)
        .ok_or_else(|| TunerError::Audio("no mono f32 input format".to_string()))?;

    let rate = TARGET_SAMPLE_RATE
        .clamp(supported_config.min_sample_rate().0, supported_config.max_sample_rate().0);
    let config = supported_config.with_sample_rate(cpal::SampleRate(rate));

    let sample_rate = config.sample_rate().0;
    let config: cpal::StreamConfig = config.into();
    info!("Selected sample rate: {} Hz, frame size {}", sample_rate, frame_size);

    let err_fn = |err| warn!("An error occurred on the audio stream: {}", err);

    let mut audio_buffer = Vec::with_capacity(frame_size * 2);

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            audio_buffer.extend_from_slice(data);

            while audio_buffer.len() >= frame_size {
                let frame: Vec<f32> = audio_buffer.drain(..frame_size).collect();
                let _ = sender.try_send(frame);
            }
        },
        err_fn,
        None,
    )?;

    stream.play()?;

    Ok((stream, sample_rate))
}

fn select_input_device(device_name: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();

    if let Some(wanted) = device_name {
        let found = host
            .input_devices()?
            .find(|device| device.name().map(|name| name == wanted).unwrap_or(false));
        match found {
            Some(device) => return Ok(device),
            None => warn!("Input device '{}' not found, using default", wanted),
        }
    }

    host.default_input_device()
        .ok_or_else(|| TunerError::Audio("no input device available".to_string()).into())
}

/// Picks a mono f32 configuration whose rate range lies closest to `target_rate`.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.channels() == 1 && c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min = c.min_sample_rate().0;
            let max = c.max_sample_rate().0;
            if (min..=max).contains(&target_rate) {
                0
            } else {
                let min_diff = (min as i64 - target_rate as i64).abs();
                let max_diff = (max as i64 - target_rate as i64).abs();
                min_diff.min(max_diff)
            }
        })
}
