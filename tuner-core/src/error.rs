//! # Error Module
//!
//! Errors raised by the tuner core. Missing pitch (silence, ambiguous
//! correlation) is never an error: it travels through the pipeline as `None`.
//! Only invalid configuration and I/O surface here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TunerError {
    /// Concert A4 must be a positive, finite frequency.
    #[error("invalid tuning reference: {0} Hz")]
    InvalidTuningReference(f32),

    #[error("invalid sample rate: {0} Hz")]
    InvalidSampleRate(u32),

    /// Detection bounds must satisfy `0 < min < max`.
    #[error("invalid detection bounds: {min} Hz to {max} Hz")]
    InvalidFrequencyBounds { min: f32, max: f32 },

    #[error("audio frame contains no samples")]
    EmptyFrame,

    #[error("audio device error: {0}")]
    Audio(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TunerError>;
