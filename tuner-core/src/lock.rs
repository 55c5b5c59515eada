//! # Note Lock Module
//!
//! Hysteresis state machine that keeps the displayed note from flickering
//! when vibrato or noise pushes the nearest-semitone decision back and forth
//! across a note boundary.
//!
//! A different note only takes over once the current lock has outlived its
//! dwell time *and* the reading deviates by more than the switch hysteresis.
//! Until then the locked note keeps being displayed, together with the raw
//! cents value of the reading.

use log::debug;
use std::time::Instant;

use crate::smoothing::SmoothingSettings;
use crate::tuning::NoteId;

/// Band in which a reading of the locked note counts as in tune and renews
/// an expired lock.
pub const IN_TUNE_REFRESH_CENTS: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockState {
    /// No note shown since the session started.
    #[default]
    Unlocked,
    Locked { note: NoteId, expires_at: Instant },
}

/// What the display should show for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockedReading {
    pub note: NoteId,
    pub cents: i32,
    /// True when the lock overrode a different detected note.
    pub held: bool,
}

#[derive(Debug, Clone, Default)]
pub struct NoteLock {
    state: LockState,
}

impl NoteLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    /// Runs one transition for a frame that produced a reading.
    ///
    /// Frames without a reading must not call this; the lock simply holds.
    pub fn update(
        &mut self,
        note: NoteId,
        cents: i32,
        now: Instant,
        settings: &SmoothingSettings,
    ) -> LockedReading {
        let shown = LockedReading {
            note,
            cents,
            held: false,
        };

        match self.state {
            LockState::Unlocked => {
                debug!("Locking onto {}", note);
                self.state = LockState::Locked {
                    note,
                    expires_at: now + settings.dwell,
                };
                shown
            }
            LockState::Locked {
                note: locked,
                expires_at,
            } if locked == note => {
                if now > expires_at && cents.abs() <= IN_TUNE_REFRESH_CENTS {
                    self.state = LockState::Locked {
                        note,
                        expires_at: now + settings.dwell,
                    };
                }
                shown
            }
            LockState::Locked {
                note: locked,
                expires_at,
            } => {
                if now > expires_at && cents.abs() > settings.switch_hysteresis_cents {
                    debug!("Lock switching {} -> {}", locked, note);
                    self.state = LockState::Locked {
                        note,
                        expires_at: now + settings.dwell,
                    };
                    shown
                } else {
                    // The note name stays put; the cents still come from the
                    // newly detected note's reference.
                    LockedReading {
                        note: locked,
                        cents,
                        held: true,
                    }
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.state = LockState::Unlocked;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::PitchClass;
    use std::time::Duration;

    fn a4() -> NoteId {
        NoteId::new(PitchClass::A, 4)
    }

    fn a_sharp4() -> NoteId {
        NoteId::new(PitchClass::ASharp, 4)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn first_reading_locks_immediately() {
        let settings = SmoothingSettings::default();
        let start = Instant::now();
        let mut lock = NoteLock::new();

        let shown = lock.update(a4(), 12, start, &settings);
        assert_eq!(shown, LockedReading { note: a4(), cents: 12, held: false });
        assert_eq!(
            lock.state(),
            LockState::Locked { note: a4(), expires_at: start + settings.dwell }
        );
    }

    #[test]
    fn brief_deviation_inside_dwell_is_held() {
        let settings = SmoothingSettings::default();
        let start = Instant::now();
        let mut lock = NoteLock::new();
        lock.update(a4(), 0, start, &settings);

        let shown = lock.update(a_sharp4(), -10, start + ms(50), &settings);
        assert_eq!(shown.note, a4());
        assert_eq!(shown.cents, -10);
        assert!(shown.held);

        // Even a large deviation cannot switch before the dwell expires.
        let shown = lock.update(a_sharp4(), -45, start + ms(100), &settings);
        assert_eq!(shown.note, a4());
    }

    #[test]
    fn small_deviation_after_dwell_is_still_held() {
        let settings = SmoothingSettings::default();
        let start = Instant::now();
        let mut lock = NoteLock::new();
        lock.update(a4(), 0, start, &settings);

        let shown = lock.update(a_sharp4(), settings.switch_hysteresis_cents, start + ms(500), &settings);
        assert_eq!(shown.note, a4());
        assert!(shown.held);
    }

    #[test]
    fn sustained_large_deviation_switches_after_dwell() {
        let settings = SmoothingSettings::default();
        let start = Instant::now();
        let mut lock = NoteLock::new();
        lock.update(a4(), 0, start, &settings);

        assert_eq!(lock.update(a_sharp4(), -40, start + ms(100), &settings).note, a4());
        let shown = lock.update(a_sharp4(), -40, start + ms(250), &settings);
        assert_eq!(shown, LockedReading { note: a_sharp4(), cents: -40, held: false });
        assert_eq!(
            lock.state(),
            LockState::Locked { note: a_sharp4(), expires_at: start + ms(250) + settings.dwell }
        );
    }

    #[test]
    fn in_tune_readings_extend_an_expired_lock() {
        let settings = SmoothingSettings::default();
        let start = Instant::now();
        let mut lock = NoteLock::new();
        lock.update(a4(), 0, start, &settings);

        // Expired but out of the in-tune band: expiry unchanged.
        lock.update(a4(), 20, start + ms(300), &settings);
        assert_eq!(
            lock.state(),
            LockState::Locked { note: a4(), expires_at: start + settings.dwell }
        );

        lock.update(a4(), -IN_TUNE_REFRESH_CENTS, start + ms(400), &settings);
        assert_eq!(
            lock.state(),
            LockState::Locked { note: a4(), expires_at: start + ms(400) + settings.dwell }
        );
    }

    #[test]
    fn reset_is_idempotent() {
        let settings = SmoothingSettings::default();
        let mut lock = NoteLock::new();
        lock.update(a4(), 0, Instant::now(), &settings);

        lock.reset();
        assert_eq!(lock.state(), LockState::Unlocked);
        lock.reset();
        assert_eq!(lock.state(), LockState::Unlocked);
    }
}
