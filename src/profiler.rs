//! # WCET Profiler
//!
//! Characterises a task body by running it back-to-back and reading the cycle
//! counter immediately before and after every run.
//!
//! The timed region contains the two counter reads and the body, nothing
//! else: no allocation, no logging, no formatting. Per-run deltas are folded
//! into a [`Measurement`] that lives on the stack for the duration of one
//! call and is converted to nanoseconds only after the last run.
//!
//! Results depend only on the body and the iteration count. The profiler
//! carries no state between calls; any run-to-run variation comes from the
//! hardware (pipeline, flash wait states, interrupts).

use log::debug;

use crate::clock::{cycles_to_ns, CycleCounter};
use crate::error::ProfileError;

/// Raw cycle statistics for one profiling request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Measurement {
    pub max_cycles: u32,
    /// Widened so tens of thousands of runs cannot overflow.
    pub total_cycles: u64,
    pub run_count: u32,
}

impl Measurement {
    #[inline(always)]
    fn record(&mut self, delta: u32) {
        if delta > self.max_cycles {
            self.max_cycles = delta;
        }
        self.total_cycles += delta as u64;
        self.run_count += 1;
    }

    /// Mean cycles per run. Zero for an empty measurement.
    pub fn avg_cycles(&self) -> u32 {
        if self.run_count == 0 {
            return 0;
        }
        (self.total_cycles / self.run_count as u64) as u32
    }

    /// Convert to nanoseconds for a counter ticking at `clock_hz`.
    pub fn report(&self, clock_hz: u32) -> WcetReport {
        let avg_cycles = self.avg_cycles();
        WcetReport {
            max_ns: cycles_to_ns(self.max_cycles, clock_hz),
            avg_ns: cycles_to_ns(avg_cycles, clock_hz),
            max_cycles: self.max_cycles,
            avg_cycles,
            runs: self.run_count,
        }
    }
}

/// Derived nanosecond statistics handed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WcetReport {
    pub max_ns: u64,
    pub avg_ns: u64,
    pub max_cycles: u32,
    pub avg_cycles: u32,
    pub runs: u32,
}

/// Borrowing front-end over a cycle counter.
pub struct WcetProfiler<'a, C> {
    counter: &'a mut C,
    clock_hz: u32,
}

impl<'a, C: CycleCounter> WcetProfiler<'a, C> {
    /// Profile with `counter`, which ticks at `clock_hz`.
    pub fn new(counter: &'a mut C, clock_hz: u32) -> Self {
        Self { counter, clock_hz }
    }

    /// Run `body` exactly `iterations` times and report the worst and mean
    /// execution time.
    pub fn measure<F: FnMut()>(&mut self, iterations: u32, mut body: F) -> Result<WcetReport, ProfileError> {
        if iterations == 0 {
            return Err(ProfileError::NoIterations);
        }

        let mut sample = Measurement::default();
        for _ in 0..iterations {
            let start = self.counter.cycles();
            body();
            let end = self.counter.cycles();
            sample.record(end.wrapping_sub(start));
        }

        let report = sample.report(self.clock_hz);
        debug!(
            "wcet: {} runs, max {} cycles, avg {} cycles",
            report.runs, report.max_cycles, report.avg_cycles
        );
        Ok(report)
    }
}
