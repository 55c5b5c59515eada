//! # Metronome Module
//!
//! Fixed-interval beat clock. `Metronome` is the timing state machine with
//! the clock passed in; `MetronomeClock` runs one on its own thread and
//! delivers beats over a channel. Neither touches the pitch pipeline.

use crossbeam_channel::{Sender, select, tick};
use log::{debug, info};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub const MIN_BPM: u32 = 20;
pub const MAX_BPM: u32 = 240;
pub const MAX_BEATS_PER_BAR: u32 = 12;

/// One beat. Beat 0 of every bar is accented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeatEvent {
    pub index: u32,
    pub accent: bool,
}

impl BeatEvent {
    fn new(index: u32) -> Self {
        Self {
            index,
            accent: index == 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Metronome {
    bpm: u32,
    beats_per_bar: u32,
    current_beat: u32,
    next_beat_at: Option<Instant>,
}

impl Metronome {
    /// BPM is clamped to [20, 240] and beats per bar to [1, 12].
    pub fn new(bpm: u32, beats_per_bar: u32) -> Self {
        Self {
            bpm: bpm.clamp(MIN_BPM, MAX_BPM),
            beats_per_bar: beats_per_bar.clamp(1, MAX_BEATS_PER_BAR),
            current_beat: 0,
            next_beat_at: None,
        }
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn beats_per_bar(&self) -> u32 {
        self.beats_per_bar
    }

    pub fn current_beat(&self) -> u32 {
        self.current_beat
    }

    pub fn is_running(&self) -> bool {
        self.next_beat_at.is_some()
    }

    /// Time between beats, `60 / bpm` seconds without rounding.
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(60.0 / self.bpm as f64)
    }

    /// Starts from beat 0 and returns it; the first beat sounds immediately.
    pub fn start(&mut self, now: Instant) -> BeatEvent {
        self.current_beat = 0;
        self.next_beat_at = Some(now + self.interval());
        BeatEvent::new(0)
    }

    /// Moves to the next beat of the bar and returns it.
    pub fn advance(&mut self) -> BeatEvent {
        self.current_beat = (self.current_beat + 1) % self.beats_per_bar;
        BeatEvent::new(self.current_beat)
    }

    /// Returns the next beat if it is due at `now`.
    ///
    /// At most one beat is emitted per call; a late caller catches up on
    /// subsequent calls.
    pub fn poll(&mut self, now: Instant) -> Option<BeatEvent> {
        let due = self.next_beat_at?;
        if now < due {
            return None;
        }
        self.next_beat_at = Some(due + self.interval());
        Some(self.advance())
    }

    pub fn stop(&mut self) {
        self.next_beat_at = None;
    }

    pub fn set_bpm(&mut self, bpm: u32) {
        self.bpm = bpm.clamp(MIN_BPM, MAX_BPM);
    }

    pub fn set_beats_per_bar(&mut self, beats_per_bar: u32) {
        self.beats_per_bar = beats_per_bar.clamp(1, MAX_BEATS_PER_BAR);
        self.current_beat %= self.beats_per_bar;
    }
}

/// A metronome running on a dedicated timer thread.
///
/// Dropping the clock stops it.
#[derive(Debug)]
pub struct MetronomeClock {
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<()>>,
}

impl MetronomeClock {
    /// Spawns the timer thread. Beat 0 is sent immediately, then one beat per
    /// interval until the clock is stopped or the receiver goes away.
    pub fn spawn(bpm: u32, beats_per_bar: u32, beats: Sender<BeatEvent>) -> Self {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let mut metronome = Metronome::new(bpm, beats_per_bar);
        info!(
            "[METRONOME] Starting at {} BPM, {} beats per bar",
            metronome.bpm(),
            metronome.beats_per_bar()
        );

        let thread_handle = thread::spawn(move || {
            let ticker = tick(metronome.interval());
            if beats.send(metronome.start(Instant::now())).is_err() {
                return;
            }
            loop {
                select! {
                    recv(ticker) -> _ => {
                        if beats.send(metronome.advance()).is_err() {
                            debug!("[METRONOME] Beat receiver closed");
                            break;
                        }
                    },
                    recv(shutdown_rx) -> _ => break,
                }
            }
            metronome.stop();
            debug!("[METRONOME] Thread finished");
        });

        Self {
            shutdown_tx,
            thread_handle: Some(thread_handle),
        }
    }

    /// Stops the clock and waits for its thread. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            let _ = self.shutdown_tx.try_send(());
            let _ = handle.join();
            info!("[METRONOME] Stopped");
        }
    }
}

impl Drop for MetronomeClock {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beats_cycle_through_the_bar() {
        let start = Instant::now();
        let mut metronome = Metronome::new(120, 4);
        assert_eq!(metronome.interval(), Duration::from_millis(500));

        let mut events = vec![metronome.start(start)];
        for n in 1..5u32 {
            let at = start + Duration::from_millis(500 * n as u64);
            events.push(metronome.poll(at).unwrap());
        }

        let indices: Vec<u32> = events.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 0]);
        let accents: Vec<bool> = events.iter().map(|e| e.accent).collect();
        assert_eq!(accents, vec![true, false, false, false, true]);
    }

    #[test]
    fn poll_waits_for_the_interval() {
        let start = Instant::now();
        let mut metronome = Metronome::new(60, 3);
        metronome.start(start);
        assert_eq!(metronome.poll(start + Duration::from_millis(999)), None);
        assert_eq!(
            metronome.poll(start + Duration::from_millis(1000)),
            Some(BeatEvent { index: 1, accent: false })
        );
    }

    #[test]
    fn interval_keeps_sub_millisecond_precision() {
        let start = Instant::now();
        let mut metronome = Metronome::new(70, 4);
        let interval = metronome.interval();
        assert!(interval > Duration::from_millis(857));
        assert!((interval.as_secs_f64() - 60.0 / 70.0).abs() < 1e-6);

        // A whole-millisecond interval would put the 70th beat 10 ms early.
        metronome.start(start);
        let minute = start + Duration::from_secs(60);
        for _ in 1..70 {
            assert!(metronome.poll(minute).is_some());
        }
        assert!(metronome.poll(minute - Duration::from_millis(5)).is_none());
        assert!(metronome.poll(minute).is_some());
    }

    #[test]
    fn restart_returns_to_beat_zero() {
        let start = Instant::now();
        let mut metronome = Metronome::new(120, 4);
        metronome.start(start);
        metronome.advance();
        metronome.advance();
        assert_eq!(metronome.start(start), BeatEvent { index: 0, accent: true });
        assert_eq!(metronome.current_beat(), 0);
    }

    #[test]
    fn stopped_metronome_is_silent() {
        let start = Instant::now();
        let mut metronome = Metronome::new(120, 4);
        assert_eq!(metronome.poll(start), None);
        metronome.start(start);
        metronome.stop();
        assert!(!metronome.is_running());
        assert_eq!(metronome.poll(start + Duration::from_secs(5)), None);
    }

    #[test]
    fn tempo_is_clamped() {
        assert_eq!(Metronome::new(5, 4).bpm(), MIN_BPM);
        assert_eq!(Metronome::new(400, 4).bpm(), MAX_BPM);
        assert_eq!(Metronome::new(120, 0).beats_per_bar(), 1);
    }

    #[test]
    fn clock_thread_emits_accented_downbeat_and_stops() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut clock = MetronomeClock::spawn(240, 2, tx);

        let first = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(first, BeatEvent { index: 0, accent: true });
        let second = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(second, BeatEvent { index: 1, accent: false });

        clock.stop();
        clock.stop();
        while rx.try_recv().is_ok() {}
        assert!(rx.recv_timeout(Duration::from_millis(400)).is_err());
    }
}
