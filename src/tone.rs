//! # Tone Generator
//!
//! Square-wave synthesis by toggling the DAC data register once per tick.
//! The tick interval is the half-period of the note being played.
//!
//! ## Output state machine
//!
//! ```text
//!                start(period)
//!   ┌────────┐ ─────────────► ┌──────────────┐  tick  ┌─────────────┐
//!   │ Silent │                │ Sounding-Low │ ◄────► │ Sounding-High│
//!   └────────┘ ◄───────────── └──────────────┘        └─────────────┘
//!                  stop()        muted: stays Low, no toggle
//! ```
//!
//! The generator never stops ticking. While silent it writes 0 and comes back
//! after [`IDLE_PERIOD_US`].

use crate::clock::Duration;
use crate::config::{DEFAULT_VOLUME, IDLE_PERIOD_US, MAX_VOLUME, MIN_VOLUME};

/// Write access to the analog output line.
pub trait Dac {
    /// Drive the line to `level` (0 is silence).
    fn write(&mut self, level: u8);
}

/// DAC that discards every write. Used to exercise the tick body without
/// touching the real output.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDac;

impl Dac for NullDac {
    #[inline]
    fn write(&mut self, _level: u8) {}
}

/// Outcome of a bounded adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjust<T> {
    /// The value moved to the contained new value.
    Changed(T),
    /// The value was already at its bound; nothing changed.
    AtLimit,
}

/// What the DAC line is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneOutput {
    Silent,
    SoundingHigh,
    SoundingLow,
}

/// Tone generator state. Only the tone and melody task bodies touch it.
#[derive(Debug, Clone)]
pub struct ToneGenerator {
    volume: u8,
    muted: bool,
    /// Duty toggle: true while the line is high.
    active: bool,
    /// Half-period of the current note.
    period: Duration,
    playing: bool,
}

impl ToneGenerator {
    /// Silent generator at the default volume, unmuted.
    pub const fn new() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            muted: false,
            active: false,
            period: Duration::from_ticks(0),
            playing: false,
        }
    }

    /// One tick of the generator: drive the DAC and return the interval to the
    /// next tick.
    pub fn tick<D: Dac>(&mut self, dac: &mut D) -> Duration {
        // A zero period means the note fell outside the period table.
        if !self.playing || self.period.ticks() == 0 {
            self.active = false;
            dac.write(0);
            return Duration::from_ticks(IDLE_PERIOD_US);
        }

        // Muted ticks hold the line low and leave the duty toggle where it was.
        if self.muted {
            dac.write(0);
        } else {
            self.active = !self.active;
            dac.write(if self.active { self.volume } else { 0 });
        }
        self.period
    }

    /// Start sounding with the given half-period.
    pub fn start(&mut self, period: Duration) {
        self.period = period;
        self.playing = true;
    }

    /// Stop sounding. Output is forced low on the next tick.
    pub fn stop(&mut self) {
        self.playing = false;
    }

    /// Raise the volume by one step, up to [`MAX_VOLUME`].
    pub fn increase_volume(&mut self) -> Adjust<u8> {
        if self.volume >= MAX_VOLUME {
            return Adjust::AtLimit;
        }
        self.volume += 1;
        Adjust::Changed(self.volume)
    }

    /// Lower the volume by one step, down to [`MIN_VOLUME`].
    pub fn decrease_volume(&mut self) -> Adjust<u8> {
        if self.volume <= MIN_VOLUME {
            return Adjust::AtLimit;
        }
        self.volume -= 1;
        Adjust::Changed(self.volume)
    }

    /// Flip mute. Returns the new muted state.
    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted
    }

    /// Current state of the output line.
    pub fn output(&self) -> ToneOutput {
        if !self.playing || self.period.ticks() == 0 {
            ToneOutput::Silent
        } else if self.active && !self.muted {
            ToneOutput::SoundingHigh
        } else {
            ToneOutput::SoundingLow
        }
    }

    /// Level written on the high half of each period.
    #[inline]
    pub fn volume(&self) -> u8 {
        self.volume
    }

    #[inline]
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    #[inline]
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Default for ToneGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Remembers the last level written.
    #[derive(Default)]
    struct Probe {
        last: Option<u8>,
        writes: u32,
    }

    impl Dac for Probe {
        fn write(&mut self, level: u8) {
            self.last = Some(level);
            self.writes += 1;
        }
    }

    const HALF_PERIOD: Duration = Duration::from_ticks(1_136);

    #[test]
    fn test_idle_ticks_write_low() {
        let mut tone = ToneGenerator::new();
        let mut dac = Probe::default();

        let next = tone.tick(&mut dac);
        assert_eq!(next.ticks(), IDLE_PERIOD_US);
        assert_eq!(dac.last, Some(0));
        assert_eq!(tone.output(), ToneOutput::Silent);
    }

    #[test]
    fn test_sounding_alternates() {
        let mut tone = ToneGenerator::new();
        let mut dac = Probe::default();
        tone.start(HALF_PERIOD);

        assert_eq!(tone.tick(&mut dac), HALF_PERIOD);
        assert_eq!(dac.last, Some(DEFAULT_VOLUME));
        assert_eq!(tone.output(), ToneOutput::SoundingHigh);

        tone.tick(&mut dac);
        assert_eq!(dac.last, Some(0));
        assert_eq!(tone.output(), ToneOutput::SoundingLow);

        tone.tick(&mut dac);
        assert_eq!(dac.last, Some(DEFAULT_VOLUME));
    }

    #[test]
    fn test_muted_stays_low_without_toggling() {
        let mut tone = ToneGenerator::new();
        let mut dac = Probe::default();
        tone.start(HALF_PERIOD);
        assert!(tone.toggle_mute());

        for _ in 0..4 {
            assert_eq!(tone.tick(&mut dac), HALF_PERIOD);
            assert_eq!(dac.last, Some(0));
            assert_eq!(tone.output(), ToneOutput::SoundingLow);
        }
    }

    #[test]
    fn test_mute_preserves_duty_toggle() {
        let mut tone = ToneGenerator::new();
        let mut dac = Probe::default();
        tone.start(HALF_PERIOD);
        tone.tick(&mut dac);
        assert_eq!(dac.last, Some(DEFAULT_VOLUME));

        // Muted while the line was high: ticks write low but keep the phase.
        tone.toggle_mute();
        for _ in 0..3 {
            tone.tick(&mut dac);
            assert_eq!(dac.last, Some(0));
        }
        tone.toggle_mute();
        assert_eq!(tone.output(), ToneOutput::SoundingHigh);

        // The alternation resumes from where it was left.
        tone.tick(&mut dac);
        assert_eq!(dac.last, Some(0));
        tone.tick(&mut dac);
        assert_eq!(dac.last, Some(DEFAULT_VOLUME));
    }

    #[test]
    fn test_double_toggle_restores_mute_state() {
        let mut tone = ToneGenerator::new();
        let mut dac = Probe::default();
        tone.start(HALF_PERIOD);

        for _ in 0..2 {
            tone.toggle_mute();
            tone.tick(&mut dac);
            assert_eq!(dac.last, Some(0));
            tone.toggle_mute();
        }
        assert!(!tone.is_muted());
        assert_eq!(tone.period(), HALF_PERIOD);
        assert!(tone.is_playing());
    }

    #[test]
    fn test_stop_forces_low_and_idles() {
        let mut tone = ToneGenerator::new();
        let mut dac = Probe::default();
        tone.start(HALF_PERIOD);
        tone.tick(&mut dac);
        assert_eq!(dac.last, Some(DEFAULT_VOLUME));

        tone.stop();
        assert_eq!(tone.tick(&mut dac).ticks(), IDLE_PERIOD_US);
        assert_eq!(dac.last, Some(0));
        assert_eq!(dac.writes, 2);
    }

    #[test]
    fn test_out_of_table_note_is_silent() {
        let mut tone = ToneGenerator::new();
        let mut dac = Probe::default();
        tone.start(Duration::from_ticks(0));
        assert_eq!(tone.tick(&mut dac).ticks(), IDLE_PERIOD_US);
        assert_eq!(dac.last, Some(0));
        assert_eq!(tone.output(), ToneOutput::Silent);
    }

    #[test]
    fn test_volume_clamps_at_max() {
        let mut tone = ToneGenerator::new();
        assert_eq!(tone.volume(), 15);

        let mut at_limit = 0;
        for _ in 0..25 {
            match tone.increase_volume() {
                Adjust::Changed(v) => assert!(v <= MAX_VOLUME),
                Adjust::AtLimit => {
                    assert_eq!(tone.volume(), MAX_VOLUME);
                    at_limit += 1;
                }
            }
        }
        assert_eq!(tone.volume(), 20);
        assert_eq!(at_limit, 20);
    }

    #[test]
    fn test_volume_clamps_at_min() {
        let mut tone = ToneGenerator::new();
        for _ in 0..14 {
            assert!(matches!(tone.decrease_volume(), Adjust::Changed(_)));
        }
        assert_eq!(tone.volume(), MIN_VOLUME);
        assert_eq!(tone.decrease_volume(), Adjust::AtLimit);
        assert_eq!(tone.volume(), MIN_VOLUME);
    }

    #[test]
    fn test_mute_leaves_volume_untouched() {
        let mut tone = ToneGenerator::new();
        tone.toggle_mute();
        assert_eq!(tone.increase_volume(), Adjust::Changed(16));
        tone.toggle_mute();
        assert_eq!(tone.volume(), 16);
    }
}
