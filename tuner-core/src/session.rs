//! # Session Module
//!
//! One listening session: the per-frame pipeline from raw samples to a stable
//! note readout, together with every piece of state it carries between frames.
//!
//! ```text
//! frame -> detect -> EMA(freq) -> map to note -> median(cents) -> lock -> readout
//!                        \-> practice tracker
//! ```
//!
//! The session is owned by whoever drives the audio callback and is never
//! shared; configuration changes arrive as `SessionCommand`s applied between
//! frames.

use log::{debug, info, trace};
use std::time::{Duration, Instant};

use crate::audio::AudioFrame;
use crate::config::TunerConfig;
use crate::error::Result;
use crate::lock::NoteLock;
use crate::pitch::{DetectorSettings, PitchDetector};
use crate::practice::{PracticeSnapshot, PracticeTracker};
use crate::smoothing::{EmaFilter, MedianFilter, SmoothingProfile, SmoothingSettings};
use crate::tuning::{self, NoteId, TuningReference};

/// The stable readout for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StableReading {
    /// Displayed note; the locked note while a lock is holding.
    pub note: NoteId,
    /// Median-filtered deviation of the detected pitch from its nearest note.
    pub cents: i32,
    /// Note actually nearest to the smoothed frequency this frame.
    pub detected_note: NoteId,
    pub held: bool,
}

/// Everything one frame produced, for the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameResult {
    pub rms: f32,
    pub raw_frequency_hz: Option<f32>,
    pub smoothed_frequency_hz: Option<f32>,
    pub reading: Option<StableReading>,
    pub practice: Option<PracticeSnapshot>,
}

/// Changes applied to a running session between frames.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    SetProfile(SmoothingProfile),
    SetTuningReference(f32),
    SetInputGainDb(f32),
    SetDetector(DetectorSettings),
    StartTraining { target_midi: i32, tolerance_cents: u32 },
    StopTraining,
    Stop,
}

#[derive(Debug)]
pub struct TunerSession {
    detector: PitchDetector,
    reference: TuningReference,
    profile: SmoothingProfile,
    smoothing: SmoothingSettings,
    input_gain_db: f32,
    ema: EmaFilter,
    median: MedianFilter,
    lock: NoteLock,
    practice: PracticeTracker,
    last_frame_at: Option<Instant>,
}

impl TunerSession {
    pub fn new(detector: DetectorSettings, reference: TuningReference, profile: SmoothingProfile) -> Self {
        let smoothing = profile.settings();
        Self {
            detector: PitchDetector::new(detector),
            reference,
            profile,
            smoothing,
            input_gain_db: 0.0,
            ema: EmaFilter::new(),
            median: MedianFilter::new(smoothing.median_window),
            lock: NoteLock::new(),
            practice: PracticeTracker::new(),
            last_frame_at: None,
        }
    }

    /// Builds a session from configuration, rejecting invalid bounds or reference.
    pub fn from_config(config: &TunerConfig) -> Result<Self> {
        let mut session = Self::new(
            config.detector_settings()?,
            config.tuning_reference()?,
            config.smoothing,
        );
        session.input_gain_db = config.input_gain_db;
        Ok(session)
    }

    pub fn profile(&self) -> SmoothingProfile {
        self.profile
    }

    pub fn smoothing(&self) -> &SmoothingSettings {
        &self.smoothing
    }

    pub fn tuning_reference(&self) -> TuningReference {
        self.reference
    }

    pub fn detector(&self) -> &DetectorSettings {
        self.detector.settings()
    }

    pub fn lock(&self) -> &NoteLock {
        &self.lock
    }

    pub fn ema(&self) -> &EmaFilter {
        &self.ema
    }

    pub fn median(&self) -> &MedianFilter {
        &self.median
    }

    pub fn practice(&self) -> &PracticeTracker {
        &self.practice
    }

    /// Runs the full pipeline on one frame captured at `now`.
    pub fn process_frame(&mut self, frame: AudioFrame, now: Instant) -> FrameResult {
        let elapsed = self
            .last_frame_at
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or(Duration::ZERO);
        self.last_frame_at = Some(now);

        let frame = frame.amplified(self.input_gain_db);
        let estimate = self.detector.detect(&frame);

        let smoothed = self.ema.update(estimate.frequency_hz, self.smoothing.alpha);

        let reading = smoothed
            .and_then(|freq| tuning::map_frequency(freq, self.reference))
            .map(|mapped| {
                let cents = self.median.push(mapped.cents);
                let shown = self.lock.update(mapped.note, cents, now, &self.smoothing);
                StableReading {
                    note: shown.note,
                    cents: shown.cents,
                    detected_note: mapped.note,
                    held: shown.held,
                }
            });

        self.practice.tick(smoothed, elapsed, self.reference);

        trace!(
            "frame rms={:.4} raw={:?} smoothed={:?} reading={:?}",
            estimate.rms, estimate.frequency_hz, smoothed, reading
        );

        FrameResult {
            rms: estimate.rms,
            raw_frequency_hz: estimate.frequency_hz,
            smoothed_frequency_hz: smoothed,
            reading,
            practice: self.practice.snapshot(),
        }
    }

    /// Clears smoothing and lock state. Calling it again changes nothing.
    ///
    /// An active training run survives; only its frame clock restarts.
    pub fn stop(&mut self) {
        if self.last_frame_at.is_some() || !self.median.is_empty() || self.ema.value().is_some() {
            info!("Listening session stopped");
        }
        self.ema.reset();
        self.median.reset();
        self.lock.reset();
        self.last_frame_at = None;
    }

    /// Switches presets; accumulated history is kept, trimmed to the new window.
    pub fn set_profile(&mut self, profile: SmoothingProfile) {
        self.profile = profile;
        self.smoothing = profile.settings();
        self.median.set_capacity(self.smoothing.median_window);
        debug!("Smoothing profile: {} {:?}", profile, self.smoothing);
    }

    pub fn set_tuning_reference(&mut self, a4_hz: f32) -> Result<()> {
        self.reference = TuningReference::new(a4_hz)?;
        debug!("Tuning reference: A4 = {} Hz", a4_hz);
        Ok(())
    }

    pub fn set_input_gain_db(&mut self, gain_db: f32) {
        self.input_gain_db = gain_db;
    }

    pub fn set_detector(&mut self, detector: DetectorSettings) {
        self.detector.set_settings(detector);
    }

    pub fn start_training(&mut self, target_midi: i32, tolerance_cents: u32, now: Instant) {
        self.practice.start_session(target_midi, tolerance_cents, now);
    }

    pub fn stop_training(&mut self) {
        self.practice.stop_session();
    }

    /// Applies a command between frames.
    pub fn apply(&mut self, command: SessionCommand, now: Instant) -> Result<()> {
        match command {
            SessionCommand::SetProfile(profile) => self.set_profile(profile),
            SessionCommand::SetTuningReference(a4_hz) => self.set_tuning_reference(a4_hz)?,
            SessionCommand::SetInputGainDb(gain_db) => self.set_input_gain_db(gain_db),
            SessionCommand::SetDetector(detector) => self.set_detector(detector),
            SessionCommand::StartTraining {
                target_midi,
                tolerance_cents,
            } => self.start_training(target_midi, tolerance_cents, now),
            SessionCommand::StopTraining => self.stop_training(),
            SessionCommand::Stop => self.stop(),
        }
        Ok(())
    }
}

impl Default for TunerSession {
    fn default() -> Self {
        Self::new(
            DetectorSettings::default(),
            TuningReference::default(),
            SmoothingProfile::default(),
        )
    }
}
