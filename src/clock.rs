//! # Cycle Clock
//!
//! Timebase for the scheduler and raw cycle source for the WCET profiler.
//!
//! The hardware counter (DWT `CYCCNT` on the Cortex-M4) is 32 bits wide and
//! wraps roughly every 25 s at 168 MHz. [`CycleClock`] extends it to 64 bits
//! by accumulating wrapping deltas, so it must be read at least once per
//! wrap period. The task chains read it every millisecond or so, which is
//! far inside that bound.

use crate::config::TIMEBASE_HZ;

/// Scheduler instant, microsecond resolution.
pub type Instant = fugit::TimerInstantU64<TIMEBASE_HZ>;

/// Scheduler duration, microsecond resolution.
pub type Duration = fugit::TimerDurationU64<TIMEBASE_HZ>;

/// A free-running, monotonically increasing 32-bit cycle counter.
pub trait CycleCounter {
    /// Current counter value. Wraps on overflow.
    fn cycles(&mut self) -> u32;
}

/// Source of scheduler time.
pub trait Monotonic {
    fn now(&mut self) -> Instant;
}

/// Convert a cycle count to nanoseconds: 64-bit multiply, then divide.
#[inline]
pub const fn cycles_to_ns(cycles: u32, clock_hz: u32) -> u64 {
    cycles as u64 * 1_000_000_000 / clock_hz as u64
}

/// Convert a (64-bit extended) cycle count to microseconds without
/// overflowing the intermediate product.
#[inline]
pub const fn cycles_to_us(cycles: u64, clock_hz: u32) -> u64 {
    let hz = clock_hz as u64;
    let whole = cycles / hz;
    let rem = cycles % hz;
    whole * TIMEBASE_HZ as u64 + rem * TIMEBASE_HZ as u64 / hz
}

/// 64-bit extension of a wrapping cycle counter.
pub struct CycleClock<C> {
    counter: C,
    clock_hz: u32,
    last: u32,
    elapsed: u64,
}

impl<C: CycleCounter> CycleClock<C> {
    /// Wrap `counter`, which ticks at `clock_hz`. Time zero is the moment of
    /// construction.
    pub fn new(mut counter: C, clock_hz: u32) -> Self {
        let last = counter.cycles();
        Self {
            counter,
            clock_hz,
            last,
            elapsed: 0,
        }
    }

    /// Cycles elapsed since construction.
    pub fn elapsed_cycles(&mut self) -> u64 {
        let now = self.counter.cycles();
        self.elapsed += now.wrapping_sub(self.last) as u64;
        self.last = now;
        self.elapsed
    }
}

impl<C: CycleCounter> Monotonic for CycleClock<C> {
    fn now(&mut self) -> Instant {
        let cycles = self.elapsed_cycles();
        Instant::from_ticks(cycles_to_us(cycles, self.clock_hz))
    }
}

// Reading through the clock keeps the 64-bit extension current while the
// profiler hammers the counter.
impl<C: CycleCounter> CycleCounter for CycleClock<C> {
    fn cycles(&mut self) -> u32 {
        self.elapsed_cycles() as u32
    }
}

/// Clock that only moves when told to.
///
/// Used by the tests to assert release times
/// exactly. Reading it as a cycle counter yields `now * cycles_per_us`.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now_us: u64,
    cycles_per_us: u32,
}

impl ManualClock {
    pub const fn new(clock_hz: u32) -> Self {
        Self {
            now_us: 0,
            cycles_per_us: clock_hz / TIMEBASE_HZ,
        }
    }

    pub fn advance(&mut self, by: Duration) {
        self.now_us += by.ticks();
    }

    pub fn advance_us(&mut self, us: u64) {
        self.now_us += us;
    }

    /// Move to `at`. Time never runs backwards; earlier instants are ignored.
    pub fn set(&mut self, at: Instant) {
        self.now_us = self.now_us.max(at.ticks());
    }

    #[inline]
    pub fn peek(&self) -> Instant {
        Instant::from_ticks(self.now_us)
    }
}

impl Monotonic for ManualClock {
    fn now(&mut self) -> Instant {
        self.peek()
    }
}

impl CycleCounter for ManualClock {
    fn cycles(&mut self) -> u32 {
        self.now_us.wrapping_mul(self.cycles_per_us as u64) as u32
    }
}
