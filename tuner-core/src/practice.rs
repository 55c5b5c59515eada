//! # Practice Module
//!
//! Target-note training: accumulates in-tune time and error statistics for a
//! chosen note while the singer holds it.

use log::info;
use std::time::{Duration, Instant};

use crate::tuning::{NoteId, TuningReference, calculate_cents_deviation, midi_to_frequency};

/// Accumulators for one training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainerState {
    pub target_midi: i32,
    pub tolerance_cents: u32,
    pub session_start: Instant,
    pub in_tune: Duration,
    pub best_abs_error: Option<u32>,
    pub error_sum: f64,
    pub error_count: u32,
    pub last_error: Option<i32>,
}

/// The four values a trainer display shows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PracticeSnapshot {
    pub target: NoteId,
    pub current_error: Option<i32>,
    pub in_tune: Duration,
    pub best_abs_error: Option<u32>,
    pub mean_abs_error: Option<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct PracticeTracker {
    state: Option<TrainerState>,
}

impl PracticeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begins a run, discarding whatever the previous one accumulated.
    pub fn start_session(&mut self, target_midi: i32, tolerance_cents: u32, now: Instant) {
        info!(
            "Training started: target {} within {} cents",
            NoteId::from_midi(target_midi),
            tolerance_cents
        );
        self.state = Some(TrainerState {
            target_midi,
            tolerance_cents,
            session_start: now,
            in_tune: Duration::ZERO,
            best_abs_error: None,
            error_sum: 0.0,
            error_count: 0,
            last_error: None,
        });
    }

    pub fn stop_session(&mut self) {
        if self.state.take().is_some() {
            info!("Training stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    pub fn state(&self) -> Option<&TrainerState> {
        self.state.as_ref()
    }

    /// Scores one frame.
    ///
    /// Ignored when no run is active or the frame had no frequency. The error
    /// is measured against the target under the current `reference`.
    pub fn tick(&mut self, frequency: Option<f32>, elapsed: Duration, reference: TuningReference) {
        let (Some(state), Some(freq)) = (self.state.as_mut(), frequency) else {
            return;
        };
        if !freq.is_finite() || freq <= 0.0 {
            return;
        }

        let target_freq = midi_to_frequency(state.target_midi, reference);
        let error = calculate_cents_deviation(freq, target_freq).round() as i32;
        let abs_error = error.unsigned_abs();

        state.last_error = Some(error);
        state.best_abs_error = Some(state.best_abs_error.map_or(abs_error, |best| best.min(abs_error)));
        state.error_sum += abs_error as f64;
        state.error_count += 1;
        if abs_error <= state.tolerance_cents {
            state.in_tune += elapsed;
        }
    }

    pub fn snapshot(&self) -> Option<PracticeSnapshot> {
        self.state.as_ref().map(|state| PracticeSnapshot {
            target: NoteId::from_midi(state.target_midi),
            current_error: state.last_error,
            in_tune: state.in_tune,
            best_abs_error: state.best_abs_error,
            mean_abs_error: (state.error_count > 0)
                .then(|| (state.error_sum / state.error_count as f64) as f32),
        })
    }
}
