//! # Configuration Module
//!
//! User-facing tuner settings, saved and loaded as JSON. Every field has a
//! default, so a settings file only needs the values it changes.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::audio::DEFAULT_FRAME_SIZE;
use crate::error::Result;
use crate::metronome::{MAX_BEATS_PER_BAR, MAX_BPM, MIN_BPM};
use crate::pitch::{
    CorrelationMethod, DEFAULT_ENERGY_THRESHOLD, DEFAULT_MAX_FREQUENCY_HZ, DEFAULT_MIN_FREQUENCY_HZ,
    DetectorSettings,
};
use crate::smoothing::SmoothingProfile;
use crate::tuning::{DEFAULT_A4_HZ, PitchClass, TuningReference, note_to_midi};

/// Input gain range of the gain control, in dB.
pub const MAX_GAIN_DB: f32 = 24.0;
/// Widest accepted training tolerance, in cents.
pub const MAX_TOLERANCE_CENTS: u32 = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    pub tuning_reference_hz: f32,
    pub smoothing: SmoothingProfile,
    pub min_frequency_hz: f32,
    pub max_frequency_hz: f32,
    pub energy_threshold: f32,
    pub correlation: CorrelationMethod,
    /// Parabolic interpolation of the winning lag.
    pub refine_lag: bool,
    pub input_gain_db: f32,
    /// Samples per analysis frame.
    pub frame_size: usize,
    /// Preferred input device name; the default device when absent.
    pub input_device: Option<String>,
    pub trainer: TrainerConfig,
    pub metronome: MetronomeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub note: PitchClass,
    pub octave: i32,
    pub tolerance_cents: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetronomeConfig {
    pub bpm: u32,
    pub beats_per_bar: u32,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            tuning_reference_hz: DEFAULT_A4_HZ,
            smoothing: SmoothingProfile::default(),
            min_frequency_hz: DEFAULT_MIN_FREQUENCY_HZ,
            max_frequency_hz: DEFAULT_MAX_FREQUENCY_HZ,
            energy_threshold: DEFAULT_ENERGY_THRESHOLD,
            correlation: CorrelationMethod::default(),
            refine_lag: false,
            input_gain_db: 0.0,
            frame_size: DEFAULT_FRAME_SIZE,
            input_device: None,
            trainer: TrainerConfig::default(),
            metronome: MetronomeConfig::default(),
        }
    }
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            note: PitchClass::A,
            octave: 4,
            tolerance_cents: 10,
        }
    }
}

impl Default for MetronomeConfig {
    fn default() -> Self {
        Self {
            bpm: 120,
            beats_per_bar: 4,
        }
    }
}

impl TrainerConfig {
    pub fn target_midi(&self) -> i32 {
        note_to_midi(self.note, self.octave)
    }
}

impl TunerConfig {
    /// Loads settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut data = String::new();
        file.read_to_string(&mut data)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Loads settings, falling back to defaults when the file is missing or unreadable.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => {
                info!("Loaded settings from {}", path.display());
                config
            }
            Err(e) => {
                warn!("Failed to load {}: {}. Using defaults.", path.display(), e);
                Self::default()
            }
        }
    }

    /// Saves settings as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json_string = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json_string.as_bytes())?;
        Ok(())
    }

    pub fn detector_settings(&self) -> Result<DetectorSettings> {
        Ok(
            DetectorSettings::new(self.min_frequency_hz, self.max_frequency_hz, self.energy_threshold)?
                .with_correlation(self.correlation)
                .with_refinement(self.refine_lag),
        )
    }

    pub fn tuning_reference(&self) -> Result<TuningReference> {
        TuningReference::new(self.tuning_reference_hz)
    }
}

pub fn clamp_bpm(bpm: u32) -> u32 {
    bpm.clamp(MIN_BPM, MAX_BPM)
}

pub fn clamp_beats_per_bar(beats: u32) -> u32 {
    beats.clamp(1, MAX_BEATS_PER_BAR)
}

pub fn clamp_tolerance(cents: u32) -> u32 {
    cents.clamp(1, MAX_TOLERANCE_CENTS)
}

pub fn clamp_gain_db(gain_db: f32) -> f32 {
    if gain_db.is_finite() {
        gain_db.clamp(-MAX_GAIN_DB, MAX_GAIN_DB)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_fill_in_defaults() {
        let config: TunerConfig =
            serde_json::from_str(r#"{ "tuning_reference_hz": 442.0, "smoothing": "stable" }"#).unwrap();
        assert_eq!(config.tuning_reference_hz, 442.0);
        assert_eq!(config.smoothing, SmoothingProfile::Stable);
        assert_eq!(config.max_frequency_hz, 2000.0);
        assert_eq!(config.trainer, TrainerConfig::default());
        assert_eq!(config.metronome.bpm, 120);
    }

    #[test]
    fn save_and_load_preserve_settings() {
        let path = std::env::temp_dir().join(format!("tuner_settings_{}.json", std::process::id()));
        let mut config = TunerConfig::default();
        config.correlation = CorrelationMethod::Fft;
        config.trainer.note = PitchClass::FSharp;
        config.input_device = Some("USB Mic".to_string());

        config.save(&path).unwrap();
        let loaded = TunerConfig::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = TunerConfig::load_or_default("/nonexistent/tuner_settings.json");
        assert_eq!(config, TunerConfig::default());
    }

    #[test]
    fn invalid_values_fail_fast() {
        let mut config = TunerConfig::default();
        config.tuning_reference_hz = -1.0;
        assert!(config.tuning_reference().is_err());

        config.min_frequency_hz = 3000.0;
        assert!(config.detector_settings().is_err());
    }

    #[test]
    fn clamps_to_documented_ranges() {
        assert_eq!(clamp_bpm(10), 20);
        assert_eq!(clamp_bpm(300), 240);
        assert_eq!(clamp_beats_per_bar(0), 1);
        assert_eq!(clamp_tolerance(0), 1);
        assert_eq!(clamp_tolerance(80), 50);
        assert_eq!(clamp_gain_db(40.0), 24.0);
        assert_eq!(clamp_gain_db(f32::NAN), 0.0);
    }

    #[test]
    fn trainer_target_is_a_midi_number() {
        assert_eq!(TrainerConfig::default().target_midi(), 69);
    }
}
