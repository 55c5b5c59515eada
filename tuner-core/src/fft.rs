//! # Fast Fourier Transform (FFT) Module
//!
//! FFT-based computation of the raw autocorrelation used by the pitch
//! detector. The result is the same lag-by-lag dot product the direct search
//! computes, `r[L] = Σ x[i]·x[i+L]` over `i in 0..N-L`, obtained for every
//! lag in one forward/inverse round trip (Wiener–Khinchin).

use std::fmt;
use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};

/// Forward and inverse plans for one transform length.
struct Plans {
    fft_len: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

/// Reusable FFT autocorrelation state.
///
/// Plans and work buffers are built for the first frame length seen and kept
/// until a frame of a different length arrives, so a stream of equally sized
/// frames plans only once.
#[derive(Default)]
pub struct Autocorrelator {
    plans: Option<Plans>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl fmt::Debug for Autocorrelator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Autocorrelator")
            .field("fft_len", &self.fft_len())
            .finish()
    }
}

impl Autocorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transform length of the cached plans, if any have been built yet.
    pub fn fft_len(&self) -> Option<usize> {
        self.plans.as_ref().map(|plans| plans.fft_len)
    }

    /// Computes the raw (unnormalized) autocorrelation of `signal` for lags
    /// `0..=max_lag`.
    ///
    /// The signal is zero-padded to at least twice its length so the circular
    /// correlation computed by the FFT equals the linear one.
    ///
    /// # Returns
    /// * `Vec<f32>` - `max_lag + 1` correlation values (fewer if the signal is shorter)
    pub fn autocorrelate(&mut self, signal: &[f32], max_lag: usize) -> Vec<f32> {
        let len = signal.len();
        if len == 0 {
            return Vec::new();
        }
        let lags = max_lag.min(len - 1) + 1;
        let fft_len = (2 * len).next_power_of_two();

        if self.fft_len() != Some(fft_len) {
            let mut planner = FftPlanner::new();
            let forward = planner.plan_fft_forward(fft_len);
            let inverse = planner.plan_fft_inverse(fft_len);
            let scratch_len = forward
                .get_inplace_scratch_len()
                .max(inverse.get_inplace_scratch_len());
            self.scratch = vec![Complex::default(); scratch_len];
            self.plans = Some(Plans {
                fft_len,
                forward,
                inverse,
            });
        }
        let Some(plans) = self.plans.as_ref() else {
            return Vec::new();
        };

        self.buffer.clear();
        self.buffer.extend(
            signal
                .iter()
                .map(|&sample| Complex { re: sample, im: 0.0 })
                .chain(std::iter::repeat(Complex { re: 0.0, im: 0.0 }))
                .take(fft_len),
        );

        plans.forward.process_with_scratch(&mut self.buffer, &mut self.scratch);

        // Power spectrum: X·conj(X)
        for bin in self.buffer.iter_mut() {
            *bin = Complex {
                re: bin.norm_sqr(),
                im: 0.0,
            };
        }

        plans.inverse.process_with_scratch(&mut self.buffer, &mut self.scratch);

        // RustFFT leaves the inverse transform unscaled.
        let scale = 1.0 / fft_len as f32;
        self.buffer
            .iter()
            .take(lags)
            .map(|c| c.re * scale)
            .collect()
    }
}

/// One-off autocorrelation with freshly planned transforms.
///
/// Prefer a long-lived [`Autocorrelator`] when processing a stream of frames.
pub fn autocorrelate(signal: &[f32], max_lag: usize) -> Vec<f32> {
    Autocorrelator::new().autocorrelate(signal, max_lag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct(signal: &[f32], lag: usize) -> f32 {
        (0..signal.len() - lag).map(|i| signal[i] * signal[i + lag]).sum()
    }

    fn test_signal(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (i as f32 * 0.173).sin() + 0.3 * (i as f32 * 0.051).cos())
            .collect()
    }

    fn assert_matches_direct(signal: &[f32], fast: &[f32], lags: &[usize]) {
        for &lag in lags {
            let expected = direct(signal, lag);
            assert!(
                (fast[lag] - expected).abs() < 1e-2 * expected.abs().max(1.0),
                "lag {}: {} vs {}",
                lag,
                fast[lag],
                expected
            );
        }
    }

    #[test]
    fn matches_direct_correlation() {
        let signal = test_signal(500);
        let fast = autocorrelate(&signal, 200);
        assert_eq!(fast.len(), 201);
        assert_matches_direct(&signal, &fast, &[0, 1, 17, 36, 99, 200]);
    }

    #[test]
    fn lag_count_is_capped_by_signal_length() {
        assert_eq!(autocorrelate(&[1.0, 2.0, 3.0], 10).len(), 3);
        assert!(autocorrelate(&[], 10).is_empty());
    }

    #[test]
    fn plans_are_kept_across_equal_length_frames() {
        let mut correlator = Autocorrelator::new();
        assert_eq!(correlator.fft_len(), None);

        let first = test_signal(500);
        let a = correlator.autocorrelate(&first, 200);
        assert_eq!(correlator.fft_len(), Some(1024));
        let forward = correlator.plans.as_ref().map(|p| Arc::clone(&p.forward)).unwrap();

        // Same length, different content: same plan, fresh result.
        let second: Vec<f32> = first.iter().map(|s| -0.5 * s).collect();
        let b = correlator.autocorrelate(&second, 200);
        let reused = correlator.plans.as_ref().map(|p| Arc::clone(&p.forward)).unwrap();
        assert!(Arc::ptr_eq(&forward, &reused));
        assert_matches_direct(&second, &b, &[0, 17, 99, 200]);
        assert!((b[0] - 0.25 * a[0]).abs() < 1e-2 * a[0]);
    }

    #[test]
    fn plans_follow_a_change_of_frame_length() {
        let mut correlator = Autocorrelator::new();
        correlator.autocorrelate(&test_signal(500), 100);
        assert_eq!(correlator.fft_len(), Some(1024));

        let longer = test_signal(1500);
        let fast = correlator.autocorrelate(&longer, 600);
        assert_eq!(correlator.fft_len(), Some(4096));
        assert_eq!(fast.len(), 601);
        assert_matches_direct(&longer, &fast, &[0, 1, 36, 300, 600]);
    }
}
