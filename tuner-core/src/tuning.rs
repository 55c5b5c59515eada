//! # Musical Tuning Module
//!
//! Converts frequencies to equal-tempered notes relative to a configurable
//! concert A4, and back again.
//!
//! ## Features
//! - 12 pitch classes with name parsing (`A#`, `A♯`, `Bb`, `B♭`)
//! - Note identity as a small value type (`NoteId`) instead of a string key
//! - MIDI number / frequency conversions against any A4 reference
//! - Cent deviation calculations for tuning accuracy

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, TunerError};

/// MIDI number of concert A4.
pub const A4_MIDI: i32 = 69;

/// Default concert pitch in Hz.
pub const DEFAULT_A4_HZ: f32 = 440.0;

/// Display names for the 12 pitch classes, starting at C.
const NOTE_NAMES: [&str; 12] = [
    "C", "C♯", "D", "D♯", "E", "F", "F♯", "G", "G♯", "A", "A♯", "B",
];

/// One of the 12 equal-tempered pitch classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Pitch class for any semitone index. Negative indices wrap the
    /// mathematical way, so -1 is B.
    pub fn from_index(index: i32) -> Self {
        Self::ALL[index.rem_euclid(12) as usize]
    }

    /// Semitones above C (0-11).
    pub fn index(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        NOTE_NAMES[self as usize]
    }

    pub fn is_sharp(self) -> bool {
        matches!(
            self,
            PitchClass::CSharp
                | PitchClass::DSharp
                | PitchClass::FSharp
                | PitchClass::GSharp
                | PitchClass::ASharp
        )
    }

    /// Parses a pitch class name such as "A", "C#", "F♯" or "Bb".
    pub fn from_name(name: &str) -> Option<Self> {
        NAME_MAP.get(name.trim()).copied()
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static map for note name to pitch class lookups, ASCII and flat
/// spellings included.
static NAME_MAP: Lazy<BTreeMap<&'static str, PitchClass>> = Lazy::new(|| {
    const ALIASES: [(&str, PitchClass); 15] = [
        ("C#", PitchClass::CSharp),
        ("Db", PitchClass::CSharp),
        ("D♭", PitchClass::CSharp),
        ("D#", PitchClass::DSharp),
        ("Eb", PitchClass::DSharp),
        ("E♭", PitchClass::DSharp),
        ("F#", PitchClass::FSharp),
        ("Gb", PitchClass::FSharp),
        ("G♭", PitchClass::FSharp),
        ("G#", PitchClass::GSharp),
        ("Ab", PitchClass::GSharp),
        ("A♭", PitchClass::GSharp),
        ("A#", PitchClass::ASharp),
        ("Bb", PitchClass::ASharp),
        ("B♭", PitchClass::ASharp),
    ];

    PitchClass::ALL
        .iter()
        .map(|&pc| (pc.name(), pc))
        .chain(ALIASES)
        .collect()
});

/// A concrete note: pitch class plus octave (scientific pitch notation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteId {
    pub pitch_class: PitchClass,
    pub octave: i32,
}

impl NoteId {
    pub fn new(pitch_class: PitchClass, octave: i32) -> Self {
        Self { pitch_class, octave }
    }

    /// Builds the note for a MIDI number, so 69 is A4 and 60 is C4.
    pub fn from_midi(midi: i32) -> Self {
        Self {
            pitch_class: PitchClass::from_index(midi),
            octave: midi.div_euclid(12) - 1,
        }
    }

    pub fn midi(self) -> i32 {
        note_to_midi(self.pitch_class, self.octave)
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class, self.octave)
    }
}

/// The frequency assigned to concert A4.
///
/// Construction rejects values that would push NaN or infinity through the
/// logarithms downstream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningReference(f32);

impl TuningReference {
    pub fn new(a4_hz: f32) -> Result<Self> {
        if a4_hz.is_finite() && a4_hz > 0.0 {
            Ok(Self(a4_hz))
        } else {
            Err(TunerError::InvalidTuningReference(a4_hz))
        }
    }

    pub fn hz(self) -> f32 {
        self.0
    }
}

impl Default for TuningReference {
    fn default() -> Self {
        Self(DEFAULT_A4_HZ)
    }
}

/// A frequency mapped onto the nearest equal-tempered note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteReading {
    pub note: NoteId,
    /// Deviation from `reference_frequency_hz`, rounded to whole cents.
    pub cents: i32,
    /// Equal-tempered frequency of `note` under the active reference.
    pub reference_frequency_hz: f32,
    pub midi: i32,
}

/// Converts a MIDI number to its frequency under `reference`.
pub fn midi_to_frequency(midi: i32, reference: TuningReference) -> f32 {
    reference.hz() * 2.0_f32.powf((midi - A4_MIDI) as f32 / 12.0)
}

/// Fractional MIDI number for a frequency under `reference`.
pub fn frequency_to_midi(freq: f32, reference: TuningReference) -> f32 {
    A4_MIDI as f32 + 12.0 * (freq / reference.hz()).log2()
}

/// MIDI number of a pitch class in a given octave (C4 = 60).
pub fn note_to_midi(pitch_class: PitchClass, octave: i32) -> i32 {
    (octave + 1) * 12 + pitch_class.index()
}

/// Calculates the deviation from a target frequency in cents.
///
/// Positive values are sharp, negative values are flat.
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}

/// Maps a frequency onto the nearest note under `reference`.
///
/// Returns `None` for zero, negative, or non-finite frequencies. The cents
/// value always comes from the reference passed in, never a cached one.
pub fn map_frequency(freq: f32, reference: TuningReference) -> Option<NoteReading> {
    if !freq.is_finite() || freq <= 0.0 {
        return None;
    }

    let nearest = frequency_to_midi(freq, reference).round();
    if !nearest.is_finite() {
        return None;
    }
    let midi = nearest as i32;

    let reference_frequency_hz = midi_to_frequency(midi, reference);
    let cents = calculate_cents_deviation(freq, reference_frequency_hz).round() as i32;

    Some(NoteReading {
        note: NoteId::from_midi(midi),
        cents,
        reference_frequency_hz,
        midi,
    })
}
