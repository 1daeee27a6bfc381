//! # Melody
//!
//! Key/period lookup, the fixed tune, and the sequencer task that walks it.
//!
//! Period values are half-periods in microseconds, i.e. the interval between
//! two DAC toggles: `1 / (2 · 440 Hz · 2^(s/12))` for semitone offset `s`
//! relative to A4. Offset 0 sits at table index `-MIN_INDEX`.

use core::fmt;

use crate::clock::Duration;
use crate::config::{MAX_INDEX, MELODY_LEN, MIN_INDEX, NOTE_GAP_US, PERIOD_TABLE_LEN, US_PER_MINUTE};
use crate::tone::ToneGenerator;

/// Half-periods in microseconds for semitone offsets `MIN_INDEX..=MAX_INDEX`.
pub const PERIODS: [u32; PERIOD_TABLE_LEN] = [
    2024, 1911, 1803, 1702, 1607, 1516, 1431, 1351, 1275, 1203, 1136, 1072, 1012, 955, 901,
    851, 803, 758, 715, 675, 637, 601, 568, 536, 506,
];

/// Semitone offsets of the tune.
pub const MELODY: [i32; MELODY_LEN] = [
    0, 2, 4, 0, 0, 2, 4, 0, 4, 5, 7, 4, 5, 7, 7, 9, 7, 5, 4, 0, 7, 9, 7, 5, 4, 0, 0, -5, 0, 0,
    -5, 0,
];

/// Note lengths in half-beats (2 = one beat).
pub const RHYTHM: [u32; MELODY_LEN] = [
    2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 4, 2, 2, 4, 1, 1, 1, 1, 2, 2, 1, 1, 1, 1, 2, 2, 2, 2, 4, 2, 2,
    4,
];

/// Table index for a semitone offset, `None` outside the table.
#[inline]
pub const fn period_index(semitone: i32) -> Option<usize> {
    if semitone < MIN_INDEX || semitone > MAX_INDEX {
        None
    } else {
        Some((semitone - MIN_INDEX) as usize)
    }
}

/// Half-period for a semitone offset, `None` outside the table.
#[inline]
pub const fn period_for(semitone: i32) -> Option<u32> {
    match period_index(semitone) {
        Some(index) => Some(PERIODS[index]),
        None => None,
    }
}

/// The 32 half-periods of the tune transposed to `key`, rendered as
/// space-separated values with `N/A` for notes outside the table.
#[derive(Debug, Clone, Copy)]
pub struct PeriodSnapshot {
    pub key: i32,
}

impl PeriodSnapshot {
    pub const fn new(key: i32) -> Self {
        Self { key }
    }

    /// Period of melody note `note` at this key, if it is inside the table.
    pub fn entry(&self, note: usize) -> Option<u32> {
        period_for(MELODY[note % MELODY_LEN] + self.key)
    }
}

impl fmt::Display for PeriodSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for note in 0..MELODY_LEN {
            if note > 0 {
                f.write_str(" ")?;
            }
            match self.entry(note) {
                Some(period) => write!(f, "{}", period)?,
                None => f.write_str("N/A")?,
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Note timing
// ---------------------------------------------------------------------------

/// Timing of one note at a given key and tempo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteTiming {
    /// DAC half-period, zero when the note is outside the table.
    pub period: Duration,
    /// Full note length.
    pub note: Duration,
    /// Sounding part of the note.
    pub tone: Duration,
}

/// Microseconds per beat.
#[inline]
pub const fn beat_duration(tempo: u32) -> Duration {
    let tempo = if tempo == 0 { 1 } else { tempo };
    Duration::from_ticks(US_PER_MINUTE / tempo as u64)
}

pub fn note_timing(note: usize, key: i32, tempo: u32) -> NoteTiming {
    let note = note % MELODY_LEN;
    let length = beat_duration(tempo).ticks() * RHYTHM[note] as u64 / 2;
    // Very short notes keep their full length instead of being swallowed by
    // the gap.
    let tone = if length > NOTE_GAP_US {
        length - NOTE_GAP_US
    } else {
        length
    };
    let period = period_for(MELODY[note] + key).unwrap_or(0);

    NoteTiming {
        period: Duration::from_ticks(period as u64),
        note: Duration::from_ticks(length),
        tone: Duration::from_ticks(tone),
    }
}

// ---------------------------------------------------------------------------
// Sequencer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The next step starts the current note.
    Sound,
    /// The next step silences it and advances.
    Gap,
}

/// Walks the tune in a sound/gap cycle, forever.
#[derive(Debug, Clone)]
pub struct MelodySequencer {
    note: usize,
    phase: Phase,
}

impl MelodySequencer {
    /// Positioned at the start of the first note.
    pub const fn new() -> Self {
        Self {
            note: 0,
            phase: Phase::Sound,
        }
    }

    /// Advance one phase and return how long it lasts. Key and tempo are only
    /// read when a note starts, so changes land on the next note boundary.
    pub fn step(&mut self, key: i32, tempo: u32, tone: &mut ToneGenerator) -> Duration {
        match self.phase {
            Phase::Sound => {
                let timing = note_timing(self.note, key, tempo);
                log::trace!(
                    "note {}: period {} us, tone {} us",
                    self.note,
                    timing.period.ticks(),
                    timing.tone.ticks()
                );
                tone.start(timing.period);
                self.phase = Phase::Gap;
                timing.tone
            }
            Phase::Gap => {
                tone.stop();
                self.note = (self.note + 1) % MELODY_LEN;
                self.phase = Phase::Sound;
                Duration::from_ticks(NOTE_GAP_US)
            }
        }
    }

    /// Index of the current note.
    #[inline]
    pub fn note(&self) -> usize {
        self.note
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }
}

impl Default for MelodySequencer {
    fn default() -> Self {
        Self::new()
    }
}
