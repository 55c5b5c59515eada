//! # Pitch Detection Module
//!
//! Estimates the fundamental frequency of one audio frame with a time-domain
//! autocorrelation lag search behind an RMS energy gate.
//!
//! ## Features
//! - Energy gate that skips the lag search entirely on silence
//! - Exhaustive lag search between the configured frequency bounds
//! - Shortest strong peak wins, so high tones do not drop an octave
//! - Optional FFT evaluation of the same correlation values
//! - Optional parabolic interpolation for sub-sample period precision

use serde::{Deserialize, Serialize};

use crate::audio::AudioFrame;
use crate::error::{Result, TunerError};
use crate::fft::Autocorrelator;

/// Default lower detection bound in Hz.
pub const DEFAULT_MIN_FREQUENCY_HZ: f32 = 20.0;
/// Default upper detection bound in Hz.
pub const DEFAULT_MAX_FREQUENCY_HZ: f32 = 2000.0;
/// Default RMS gate below which a frame counts as silence.
pub const DEFAULT_ENERGY_THRESHOLD: f32 = 0.008;

/// Share of the strongest peak a shorter-lag peak needs to win.
///
/// Every multiple of the period correlates almost as well as the period
/// itself, and with integer lags a multiple can edge it out.
const PEAK_THRESHOLD: f32 = 0.9;

/// How the correlation value for each lag is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationMethod {
    /// One dot product per lag, O(frame · lags).
    #[default]
    Direct,
    /// All lags at once through a zero-padded FFT round trip.
    Fft,
}

/// Parameters of the frequency detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorSettings {
    pub min_frequency_hz: f32,
    pub max_frequency_hz: f32,
    pub energy_threshold: f32,
    pub correlation: CorrelationMethod,
    pub refine_lag: bool,
}

impl DetectorSettings {
    /// Validated settings with direct correlation and no lag refinement.
    pub fn new(min_frequency_hz: f32, max_frequency_hz: f32, energy_threshold: f32) -> Result<Self> {
        let bounds_ok = min_frequency_hz.is_finite()
            && max_frequency_hz.is_finite()
            && min_frequency_hz > 0.0
            && max_frequency_hz > min_frequency_hz;
        if !bounds_ok {
            return Err(TunerError::InvalidFrequencyBounds {
                min: min_frequency_hz,
                max: max_frequency_hz,
            });
        }
        Ok(Self {
            min_frequency_hz,
            max_frequency_hz,
            energy_threshold: energy_threshold.max(0.0),
            correlation: CorrelationMethod::Direct,
            refine_lag: false,
        })
    }

    pub fn with_correlation(mut self, correlation: CorrelationMethod) -> Self {
        self.correlation = correlation;
        self
    }

    pub fn with_refinement(mut self, refine_lag: bool) -> Self {
        self.refine_lag = refine_lag;
        self
    }

    /// Inclusive lag range searched for a frame, clamped to `[1, len - 1]`.
    fn lag_range(&self, sample_rate: u32, len: usize) -> Option<(usize, usize)> {
        let sr = sample_rate as f32;
        let min_lag = ((sr / self.max_frequency_hz).floor() as usize).max(1);
        let max_lag = ((sr / self.min_frequency_hz).floor() as usize).min(len.saturating_sub(1));
        (min_lag <= max_lag).then_some((min_lag, max_lag))
    }
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            min_frequency_hz: DEFAULT_MIN_FREQUENCY_HZ,
            max_frequency_hz: DEFAULT_MAX_FREQUENCY_HZ,
            energy_threshold: DEFAULT_ENERGY_THRESHOLD,
            correlation: CorrelationMethod::Direct,
            refine_lag: false,
        }
    }
}

/// Result of analysing one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchEstimate {
    /// Absent when the frame is below the energy gate or no lag correlates positively.
    pub frequency_hz: Option<f32>,
    pub rms: f32,
}

/// Root-mean-square level of a block of samples.
pub fn rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|&s| s * s).sum::<f32>() / signal.len() as f32).sqrt()
}

/// Estimates the fundamental frequency of `frame`.
///
/// Frames whose RMS falls below `settings.energy_threshold` return at once
/// without a lag search. Otherwise every lag between
/// `floor(sr / max_frequency)` and `floor(sr / min_frequency)` is scored with
/// the raw dot product of the frame against itself shifted by that lag, over
/// the overlapping region. The winning lag is the shortest correlation peak
/// scoring at least 90% of the best one; the best score starts at zero, so a
/// frame with no positive peak produces no frequency.
///
/// Never fails: absence of a frequency is an ordinary outcome. FFT plans are
/// built for this call only; use a [`PitchDetector`] for a stream of frames.
pub fn detect(frame: &AudioFrame, settings: &DetectorSettings) -> PitchEstimate {
    estimate(frame, settings, &mut Autocorrelator::new())
}

/// Detector settings plus the FFT state reused from frame to frame.
#[derive(Debug, Default)]
pub struct PitchDetector {
    settings: DetectorSettings,
    correlator: Autocorrelator,
}

impl PitchDetector {
    pub fn new(settings: DetectorSettings) -> Self {
        Self {
            settings,
            correlator: Autocorrelator::new(),
        }
    }

    pub fn settings(&self) -> &DetectorSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: DetectorSettings) {
        self.settings = settings;
    }

    /// Same result as [`detect`], keeping FFT plans between calls.
    pub fn detect(&mut self, frame: &AudioFrame) -> PitchEstimate {
        estimate(frame, &self.settings, &mut self.correlator)
    }
}

fn estimate(frame: &AudioFrame, settings: &DetectorSettings, correlator: &mut Autocorrelator) -> PitchEstimate {
    let signal = frame.samples();
    let level = rms(signal);
    let silent = PitchEstimate {
        frequency_hz: None,
        rms: level,
    };

    // --- Noise Gate ---
    if level < settings.energy_threshold || level == 0.0 {
        return silent;
    }

    let Some((min_lag, max_lag)) = settings.lag_range(frame.sample_rate(), signal.len()) else {
        return silent;
    };

    // One extra lag on each side so the window edges can be classified as peaks.
    let first = min_lag - 1;
    let last = (max_lag + 1).min(signal.len() - 1);

    let correlation = match settings.correlation {
        CorrelationMethod::Direct => direct_correlation(signal, first, last),
        CorrelationMethod::Fft => {
            let mut all = correlator.autocorrelate(signal, last);
            all.drain(..first);
            all
        }
    };

    let Some(index) = best_peak(&correlation, min_lag - first, max_lag - first) else {
        return silent;
    };

    let lag = (first + index) as f32;
    let period = if settings.refine_lag {
        lag + parabolic_shift(&correlation, index)
    } else {
        lag
    };
    let frequency = frame.sample_rate() as f32 / period;

    PitchEstimate {
        frequency_hz: (frequency.is_finite() && frequency > 0.0).then_some(frequency),
        rms: level,
    }
}

/// Raw correlation for lags `first..=last`, indexed from `first`.
fn direct_correlation(signal: &[f32], first: usize, last: usize) -> Vec<f32> {
    (first..=last)
        .map(|lag| {
            signal[..signal.len() - lag]
                .iter()
                .zip(&signal[lag..])
                .map(|(a, b)| a * b)
                .sum::<f32>()
        })
        .collect()
}

/// Index of the shortest-lag positive local maximum within `start..=end`
/// whose value reaches [`PEAK_THRESHOLD`] of the largest one.
///
/// A lag only counts when it rises above its left neighbour and is not below
/// its right one. On low tones the zero-lag lobe makes the shortest lags score
/// high while still falling, and this keeps them out of the running. High
/// tones have many peaks of near-equal height, one per period multiple, and
/// preferring the first keeps the result off the sub-octaves.
fn best_peak(correlation: &[f32], start: usize, end: usize) -> Option<usize> {
    let peaks: Vec<usize> = (start..=end)
        .filter(|&i| {
            let corr = correlation[i];
            let rising = i == 0 || corr > correlation[i - 1];
            let cresting = i + 1 >= correlation.len() || corr >= correlation[i + 1];
            rising && cresting && corr > 0.0
        })
        .collect();

    let best_corr = peaks.iter().map(|&i| correlation[i]).fold(0.0, f32::max);
    peaks
        .into_iter()
        .find(|&i| correlation[i] >= PEAK_THRESHOLD * best_corr)
}

/// Sub-sample offset of the correlation peak at `index`, from a parabola
/// through it and its two neighbours. Zero at the edges of the search range.
fn parabolic_shift(correlation: &[f32], index: usize) -> f32 {
    if index == 0 || index + 1 >= correlation.len() {
        return 0.0;
    }
    let y1 = correlation[index - 1];
    let y2 = correlation[index];
    let y3 = correlation[index + 1];

    let denominator = y1 - 2.0 * y2 + y3;
    if denominator.abs() < f32::EPSILON {
        return 0.0;
    }
    let shift = (y1 - y3) / (2.0 * denominator);
    if shift.is_finite() && shift.abs() < 1.0 { shift } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::DEFAULT_FRAME_SIZE;
    use std::f32::consts::PI;

    fn sine(freq: f32, sample_rate: u32, len: usize, amplitude: f32) -> AudioFrame {
        let samples = (0..len)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect();
        AudioFrame::new(samples, sample_rate).unwrap()
    }

    fn assert_within_one_percent(detected: Option<f32>, expected: f32) {
        let detected = detected.expect("expected a frequency");
        let error = (detected - expected).abs() / expected;
        assert!(error < 0.01, "detected {} Hz for {} Hz", detected, expected);
    }

    #[test]
    fn detects_sines_across_the_range() {
        let settings = DetectorSettings::default();
        for freq in [55.0, 110.0, 220.0, 440.0, 882.0, 1764.0, 2000.0] {
            let estimate = detect(&sine(freq, 44100, 8192, 0.5), &settings);
            assert_within_one_percent(estimate.frequency_hz, freq);
        }
    }

    #[test]
    fn detects_the_bottom_of_the_range_with_a_long_frame() {
        let settings = DetectorSettings::default();
        let estimate = detect(&sine(20.0, 44100, 16384, 0.5), &settings);
        assert_within_one_percent(estimate.frequency_hz, 20.0);
    }

    #[test]
    fn silence_never_yields_a_frequency() {
        let frame = AudioFrame::new(vec![0.0; 4096], 44100).unwrap();
        for settings in [
            DetectorSettings::default(),
            DetectorSettings::new(50.0, 500.0, 0.0).unwrap(),
            DetectorSettings::new(20.0, 2000.0, 0.0).unwrap().with_correlation(CorrelationMethod::Fft),
        ] {
            let estimate = detect(&frame, &settings);
            assert_eq!(estimate.frequency_hz, None);
            assert_eq!(estimate.rms, 0.0);
        }
    }

    #[test]
    fn quiet_frames_are_gated() {
        let estimate = detect(&sine(440.0, 44100, 4096, 0.005), &DetectorSettings::default());
        assert_eq!(estimate.frequency_hz, None);
        assert!(estimate.rms > 0.0 && estimate.rms < DEFAULT_ENERGY_THRESHOLD);
    }

    #[test]
    fn reports_rms() {
        let estimate = detect(&sine(441.0, 44100, 4410, 1.0), &DetectorSettings::default());
        assert!((estimate.rms - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-3);
    }

    #[test]
    fn no_positive_correlation_yields_nothing() {
        // Alternating samples anti-correlate at every odd lag, and the only
        // searchable lag here is 1.
        let samples = (0..64).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }).collect();
        let frame = AudioFrame::new(samples, 100).unwrap();
        let settings = DetectorSettings::new(60.0, 100.0, 0.0).unwrap();
        assert_eq!(detect(&frame, &settings).frequency_hz, None);
    }

    #[test]
    fn fft_correlation_agrees_with_direct_search() {
        let direct = DetectorSettings::default();
        let fast = direct.with_correlation(CorrelationMethod::Fft);
        // Periods of 450, 300, 100 and 42 samples.
        for freq in [98.0, 147.0, 441.0, 1050.0] {
            let frame = sine(freq, 44100, 8192, 0.4);
            let a = detect(&frame, &direct).frequency_hz.unwrap();
            let b = detect(&frame, &fast).frequency_hz.unwrap();
            assert!((a - b).abs() / a < 1e-3, "{} vs {}", a, b);
            assert!((a - freq).abs() / freq < 0.01);
        }
    }

    #[test]
    fn refinement_tightens_high_frequencies() {
        // 1500 Hz has a period of 29.4 samples at 44.1 kHz.
        let frame = sine(1500.0, 44100, 8192, 0.5);
        let refined = DetectorSettings::default().with_refinement(true);
        let estimate = detect(&frame, &refined).frequency_hz.unwrap();
        assert!((estimate - 1500.0).abs() / 1500.0 < 0.005, "got {}", estimate);
    }

    #[test]
    fn low_tones_are_not_mistaken_for_the_shortest_lag() {
        // Adjacent samples of a 55 Hz tone are nearly identical, so the
        // shortest lag scores high without being a period.
        let estimate = detect(&sine(55.0, 44100, 8192, 0.5), &DetectorSettings::default());
        assert_within_one_percent(estimate.frequency_hz, 55.0);
    }

    /// 121 frequencies spaced geometrically over the default detection range.
    fn range_sweep() -> impl Iterator<Item = f32> {
        (0..=120).map(|k| (20.0 * 100f32.powf(k as f32 / 120.0)).min(2000.0))
    }

    #[test]
    fn refined_sweep_stays_within_one_percent() {
        let mut detector = PitchDetector::new(
            DetectorSettings::default()
                .with_correlation(CorrelationMethod::Fft)
                .with_refinement(true),
        );
        for freq in range_sweep() {
            let estimate = detector.detect(&sine(freq, 44100, DEFAULT_FRAME_SIZE, 0.5));
            assert_within_one_percent(estimate.frequency_hz, freq);
        }
    }

    #[test]
    fn unrefined_sweep_never_drops_an_octave() {
        let mut detector = PitchDetector::new(DetectorSettings::default().with_correlation(CorrelationMethod::Fft));
        for freq in range_sweep() {
            let detected = detector
                .detect(&sine(freq, 44100, DEFAULT_FRAME_SIZE, 0.5))
                .frequency_hz
                .expect("expected a frequency");
            assert!(
                detected > 0.75 * freq && detected < 1.5 * freq,
                "detected {} Hz for {} Hz",
                detected,
                freq
            );
        }
    }

    #[test]
    fn high_tones_read_at_their_own_octave() {
        // Periods between 22 and 32 samples, where a multiple of the period
        // can outscore the period itself at integer lags.
        let settings = DetectorSettings::default();
        for (freq, len) in [(1879.0, 4096), (1956.0, 4096), (1400.41, 8192)] {
            let detected = detect(&sine(freq, 44100, len, 0.5), &settings).frequency_hz.unwrap();
            assert!((detected - freq).abs() / freq < 0.03, "detected {} Hz for {} Hz", detected, freq);
        }
    }

    #[test]
    fn detector_matches_one_off_detection() {
        let settings = DetectorSettings::default().with_correlation(CorrelationMethod::Fft);
        let mut detector = PitchDetector::new(settings);
        for freq in [98.0, 441.0, 1050.0] {
            let frame = sine(freq, 44100, 8192, 0.4);
            assert_eq!(detector.detect(&frame), detect(&frame, &settings));
        }
        // Frame length changes rebuild the plans.
        let frame = sine(441.0, 44100, 4096, 0.4);
        assert_eq!(detector.detect(&frame), detect(&frame, &settings));
    }

    #[test]
    fn unrefined_result_is_an_integer_lag() {
        let frame = sine(440.0, 44100, 8192, 0.5);
        let estimate = detect(&frame, &DetectorSettings::default()).frequency_hz.unwrap();
        let lag = 44100.0 / estimate;
        assert!((lag - lag.round()).abs() < 1e-3);
    }

    #[test]
    fn rejects_inverted_bounds() {
        assert!(DetectorSettings::new(2000.0, 20.0, 0.01).is_err());
        assert!(DetectorSettings::new(0.0, 20.0, 0.01).is_err());
    }

    #[test]
    fn bounds_above_nyquist_still_search_from_lag_one() {
        let settings = DetectorSettings::new(20.0, 50_000.0, 0.0).unwrap();
        let estimate = detect(&sine(440.0, 44100, 8192, 0.5), &settings);
        assert_within_one_percent(estimate.frequency_hz, 440.0);
    }
}
