//! # Node Configuration
//!
//! Compile-time constants governing the scheduler, the audio chain, the
//! background load and the profiler. All limits are fixed at compile time;
//! no dynamic allocation.

/// Core clock frequency in Hz (STM32F4 running from the PLL at 168 MHz).
/// The DWT cycle counter ticks at this rate.
pub const CPU_FREQ_HZ: u32 = 168_000_000;

/// Resolution of the scheduler timebase. Releases, deadlines and note
/// durations are all expressed in microsecond ticks.
pub const TIMEBASE_HZ: u32 = 1_000_000;

// ---------------------------------------------------------------------------
// Period table
// ---------------------------------------------------------------------------

/// Lowest semitone offset covered by the period table.
pub const MIN_INDEX: i32 = -10;

/// Highest semitone offset covered by the period table.
pub const MAX_INDEX: i32 = 14;

/// Number of entries in the period table.
pub const PERIOD_TABLE_LEN: usize = (MAX_INDEX - MIN_INDEX + 1) as usize;

/// Number of notes in the melody (and entries in a period snapshot).
pub const MELODY_LEN: usize = 32;

// ---------------------------------------------------------------------------
// Application state bounds
// ---------------------------------------------------------------------------

/// Accepted transposition keys.
pub const MIN_KEY: i32 = -5;
pub const MAX_KEY: i32 = 5;

/// Accepted tempo range in beats per minute.
pub const MIN_TEMPO: i32 = 1;
pub const MAX_TEMPO: i32 = 300;
pub const DEFAULT_TEMPO: u32 = 120;

/// Maximum number of characters held by the numeric input buffer.
/// Further characters are dropped until the buffer is committed.
pub const INPUT_CAPACITY: usize = 19;

/// Received characters waiting for the reader task.
pub const INPUT_QUEUE_CAPACITY: usize = 32;

/// Received CAN frames waiting for the reader task.
pub const CAN_QUEUE_CAPACITY: usize = 4;

// ---------------------------------------------------------------------------
// Tone generator
// ---------------------------------------------------------------------------

pub const MIN_VOLUME: u8 = 1;
pub const MAX_VOLUME: u8 = 20;
pub const DEFAULT_VOLUME: u8 = 15;

/// Tick interval used while no note is sounding (microseconds).
pub const IDLE_PERIOD_US: u64 = 1_000;

/// Completion bound for a hard-deadline tone tick (microseconds).
pub const TONE_DEADLINE_US: u64 = 100;

// ---------------------------------------------------------------------------
// Melody sequencer
// ---------------------------------------------------------------------------

/// Silence inserted between consecutive notes (microseconds).
pub const NOTE_GAP_US: u64 = 50_000;

/// Completion bound for a hard-deadline sequencer step (microseconds).
pub const MELODY_DEADLINE_US: u64 = 1_000;

/// Microseconds per minute, the numerator of the beat length.
pub const US_PER_MINUTE: u64 = 60_000_000;

// ---------------------------------------------------------------------------
// Background load
// ---------------------------------------------------------------------------

pub const MIN_LOAD: u32 = 1_000;
pub const MAX_LOAD: u32 = 8_000;
pub const LOAD_STEP: u32 = 500;
pub const DEFAULT_LOAD: u32 = 1_000;

/// Release interval of the background load task (microseconds).
pub const LOAD_PERIOD_US: u64 = 1_300;

/// Completion bound for a hard-deadline load run (microseconds).
pub const LOAD_DEADLINE_US: u64 = 1_300;

/// Deadline mode on power-up.
pub const DEFAULT_DEADLINE_MODE: bool = true;

// ---------------------------------------------------------------------------
// WCET profiler
// ---------------------------------------------------------------------------

/// Runs per profiling request.
pub const WCET_RUNS: u32 = 500;
