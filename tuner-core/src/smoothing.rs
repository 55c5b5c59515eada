//! # Smoothing Module
//!
//! Two independent filters that steady the tuner readout:
//! an exponential moving average over detected frequency, and a median over
//! the cents deviation derived from it. Both are tuned together through a
//! named `SmoothingProfile`.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// The median stage passes raw values through until it holds this many.
pub const MIN_MEDIAN_SAMPLES: usize = 3;

/// Named smoothing presets, from responsive to steady.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmoothingProfile {
    Fast,
    #[default]
    Balanced,
    Stable,
}

impl SmoothingProfile {
    pub const ALL: [SmoothingProfile; 3] = [
        SmoothingProfile::Fast,
        SmoothingProfile::Balanced,
        SmoothingProfile::Stable,
    ];

    /// The filter and lock parameters this preset stands for.
    pub fn settings(self) -> SmoothingSettings {
        match self {
            SmoothingProfile::Fast => SmoothingSettings {
                alpha: 0.45,
                median_window: 3,
                dwell: Duration::from_millis(120),
                switch_hysteresis_cents: 22,
            },
            SmoothingProfile::Balanced => SmoothingSettings {
                alpha: 0.25,
                median_window: 7,
                dwell: Duration::from_millis(200),
                switch_hysteresis_cents: 30,
            },
            SmoothingProfile::Stable => SmoothingSettings {
                alpha: 0.18,
                median_window: 11,
                dwell: Duration::from_millis(260),
                switch_hysteresis_cents: 35,
            },
        }
    }
}

impl fmt::Display for SmoothingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SmoothingProfile::Fast => "Fast (responsive)",
            SmoothingProfile::Balanced => "Balanced",
            SmoothingProfile::Stable => "Stable (slow)",
        };
        f.write_str(label)
    }
}

/// Parameters applied as one unit between frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingSettings {
    /// EMA weight of the newest frequency (0, 1].
    pub alpha: f32,
    /// Capacity of the cents median window.
    pub median_window: usize,
    /// Minimum time a displayed note stays locked.
    pub dwell: Duration,
    /// Deviation a different note needs before it may take over the lock.
    pub switch_hysteresis_cents: i32,
}

impl Default for SmoothingSettings {
    fn default() -> Self {
        SmoothingProfile::default().settings()
    }
}

/// Exponential moving average over detected frequency.
#[derive(Debug, Clone, Default)]
pub struct EmaFilter {
    value: Option<f32>,
}

impl EmaFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds the next detection into the average.
    ///
    /// A missing frequency clears the average instead of holding a stale value
    /// across silence, and yields `None` for the frame.
    pub fn update(&mut self, frequency: Option<f32>, alpha: f32) -> Option<f32> {
        self.value = match (frequency, self.value) {
            (Some(freq), Some(prev)) => Some(alpha * freq + (1.0 - alpha) * prev),
            (Some(freq), None) => Some(freq),
            (None, _) => None,
        };
        self.value
    }

    pub fn value(&self) -> Option<f32> {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = None;
    }
}

/// Fixed-capacity FIFO of cents values with a median readout.
#[derive(Debug, Clone)]
pub struct MedianFilter {
    history: VecDeque<i32>,
    capacity: usize,
}

impl MedianFilter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Pushes a value and returns the filtered one.
    ///
    /// With fewer than `MIN_MEDIAN_SAMPLES` values in the window the input is
    /// passed through unchanged.
    pub fn push(&mut self, cents: i32) -> i32 {
        self.history.push_back(cents);
        self.evict();

        if self.history.len() < MIN_MEDIAN_SAMPLES {
            return cents;
        }
        let window: Vec<i32> = self.history.iter().copied().collect();
        median(&window).unwrap_or(cents)
    }

    /// Changes the window size, keeping the newest values that still fit.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        self.evict();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    fn evict(&mut self) {
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }
    }
}

/// Median by sorting and taking the element at `len / 2`.
///
/// For an even number of values this is the upper of the two middle
/// elements, not their mean.
pub fn median(values: &[i32]) -> Option<i32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    Some(sorted[sorted.len() / 2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_starts_from_first_detection() {
        let mut ema = EmaFilter::new();
        assert_eq!(ema.update(Some(440.0), 0.25), Some(440.0));
        let next = ema.update(Some(444.0), 0.25).unwrap();
        assert!((next - 441.0).abs() < 1e-4);
    }

    #[test]
    fn ema_forgets_across_silence() {
        let mut ema = EmaFilter::new();
        ema.update(Some(440.0), 0.5);
        assert_eq!(ema.update(None, 0.5), None);
        assert_eq!(ema.value(), None);
        assert_eq!(ema.update(Some(220.0), 0.5), Some(220.0));
    }

    #[test]
    fn median_passes_through_until_three_values() {
        let mut filter = MedianFilter::new(7);
        let outputs: Vec<i32> = [0, 0, 0, 50, 0, 0, 0]
            .into_iter()
            .map(|c| filter.push(c))
            .collect();
        assert_eq!(outputs, vec![0, 0, 0, 0, 0, 0, 0]);

        let mut filter = MedianFilter::new(7);
        assert_eq!(filter.push(10), 10);
        assert_eq!(filter.push(-20), -20);
        // [10, -20, 4] sorted is [-20, 4, 10]
        assert_eq!(filter.push(4), 4);
    }

    #[test]
    fn even_windows_take_the_upper_middle() {
        assert_eq!(median(&[10, 40, 20, 30]), Some(30));
        assert_eq!(median(&[0, 0, 0, 50]), Some(0));
        assert_eq!(median(&[0, 50, 50, 0]), Some(50));
        assert_eq!(median(&[]), None);

        let mut filter = MedianFilter::new(7);
        for c in [10, 20, 30] {
            filter.push(c);
        }
        // Mean of the middle pair would be 25.
        assert_eq!(filter.push(40), 30);
    }

    #[test]
    fn window_evicts_oldest() {
        let mut filter = MedianFilter::new(3);
        for c in [100, 100, 100] {
            filter.push(c);
        }
        filter.push(0);
        assert_eq!(filter.push(0), 0);
        assert_eq!(filter.len(), 3);
    }

    #[test]
    fn shrinking_the_window_keeps_newest_values() {
        let mut filter = MedianFilter::new(11);
        for c in 0..10 {
            filter.push(c);
        }
        filter.set_capacity(3);
        assert_eq!(filter.len(), 3);
        // Window is now [7, 8, 9] plus the new value, trimmed to [8, 9, 1].
        assert_eq!(filter.push(1), 8);
    }

    #[test]
    fn presets_match_their_parameters() {
        let fast = SmoothingProfile::Fast.settings();
        assert_eq!(fast.median_window, 3);
        assert_eq!(fast.dwell, Duration::from_millis(120));
        assert_eq!(fast.switch_hysteresis_cents, 22);

        let balanced = SmoothingSettings::default();
        assert_eq!(balanced.alpha, 0.25);
        assert_eq!(balanced.median_window, 7);

        let stable = SmoothingProfile::Stable.settings();
        assert_eq!(stable.alpha, 0.18);
        assert_eq!(stable.median_window, 11);
        assert_eq!(stable.switch_hysteresis_cents, 35);
    }
}
