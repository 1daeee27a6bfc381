//! # Background Load
//!
//! A periodic task that burns a configurable amount of CPU to compete with the
//! tone chain. Its body does no useful work on purpose: the point is the
//! wall-clock time it occupies, so the spin must survive optimisation.

use core::hint::black_box;

use crate::config::{DEFAULT_DEADLINE_MODE, DEFAULT_LOAD, LOAD_STEP, MAX_LOAD, MIN_LOAD};
use crate::tone::Adjust;

/// Spin for `units` iterations. Every iteration passes its counter through
/// [`black_box`], so the loop cannot be folded away.
#[inline(never)]
pub fn spin(units: u32) {
    let mut i = 0u32;
    while black_box(i) < units {
        i = black_box(i + 1);
    }
}

/// Load configuration. Mutated only by the load-adjust and deadline-toggle
/// commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackgroundLoad {
    loop_range: u32,
    deadline_mode: bool,
}

impl BackgroundLoad {
    /// Minimum load, deadline mode per [`DEFAULT_DEADLINE_MODE`].
    pub const fn new() -> Self {
        Self {
            loop_range: DEFAULT_LOAD,
            deadline_mode: DEFAULT_DEADLINE_MODE,
        }
    }

    /// The task body.
    pub fn run(&self) {
        spin(self.loop_range);
    }

    /// Grow the spin by [`LOAD_STEP`], up to [`MAX_LOAD`].
    pub fn increase_load(&mut self) -> Adjust<u32> {
        if self.loop_range + LOAD_STEP > MAX_LOAD {
            return Adjust::AtLimit;
        }
        self.loop_range += LOAD_STEP;
        Adjust::Changed(self.loop_range)
    }

    /// Shrink the spin by [`LOAD_STEP`], down to [`MIN_LOAD`].
    pub fn decrease_load(&mut self) -> Adjust<u32> {
        if self.loop_range < MIN_LOAD + LOAD_STEP {
            return Adjust::AtLimit;
        }
        self.loop_range -= LOAD_STEP;
        Adjust::Changed(self.loop_range)
    }

    /// Flip deadline mode. Returns the new mode; every chain picks it up on
    /// its next resubmission.
    pub fn toggle_deadline(&mut self) -> bool {
        self.deadline_mode = !self.deadline_mode;
        self.deadline_mode
    }

    /// Spin iterations per run.
    #[inline]
    pub fn loop_range(&self) -> u32 {
        self.loop_range
    }

    /// Whether the chains resubmit through the hard path.
    #[inline]
    pub fn deadline_mode(&self) -> bool {
        self.deadline_mode
    }
}

impl Default for BackgroundLoad {
    fn default() -> Self {
        Self::new()
    }
}
