// tuner-core/src/lib.rs

//! The core logic for the visual vocal tuner.
//! This crate is responsible for audio capture, pitch detection,
//! note stabilization, practice tracking and the metronome clock.
//! It is completely headless and contains no GUI code.

pub mod audio;
pub mod config;
pub mod error;
pub mod fft;
pub mod lock;
pub mod metronome;
pub mod pitch;
pub mod practice;
pub mod session;
pub mod smoothing;
pub mod tuning;

pub use audio::AudioFrame;
pub use config::TunerConfig;
pub use error::{Result, TunerError};
pub use metronome::{BeatEvent, Metronome, MetronomeClock};
pub use pitch::{CorrelationMethod, DetectorSettings, PitchDetector, PitchEstimate};
pub use practice::{PracticeSnapshot, PracticeTracker};
pub use session::{FrameResult, SessionCommand, StableReading, TunerSession};
pub use smoothing::{SmoothingProfile, SmoothingSettings};
pub use tuning::{NoteId, NoteReading, PitchClass, TuningReference};
