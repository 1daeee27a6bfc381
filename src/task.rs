//! # Task Model
//!
//! The node runs a fixed set of task chains, one slot per [`TaskId`]. A task
//! body runs to completion and then decides for itself whether, and how, it
//! is released again.
//!
//! ## Release modes
//!
//! ```text
//!  soft  (Resubmit::After)     hard  (Resubmit::Periodic)
//!
//!  |== body ==|-- delay --|==   |== body ==|        |== body ==|
//!  ^          ^           ^     ^                   ^
//!  release    completion  next  release             release + period
//!                                 completion must stay before
//!                                 release + deadline
//! ```
//!
//! Both modes go through the same scheduling primitive; the task picks one
//! per resubmission from its `deadline_mode` flag.

use crate::clock::{Duration, Instant};

// ---------------------------------------------------------------------------
// Task identity
// ---------------------------------------------------------------------------

/// The task chains known to the scheduler. The discriminant doubles as the
/// slot index and as the tie-breaker when two releases fall due together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TaskId {
    /// Drains received command characters.
    Reader = 0,
    /// Toggles the DAC line.
    Tone = 1,
    /// Walks the note sequence.
    Melody = 2,
    /// Busy-spins to emulate competing CPU load.
    Load = 3,
    /// Runs an on-demand WCET measurement.
    Profiler = 4,
}

impl TaskId {
    pub const COUNT: usize = 5;

    pub const ALL: [TaskId; Self::COUNT] = [
        TaskId::Reader,
        TaskId::Tone,
        TaskId::Melody,
        TaskId::Load,
        TaskId::Profiler,
    ];

    /// Slot index in the scheduler tables.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Short lowercase name used in logs and status lines.
    pub const fn name(self) -> &'static str {
        match self {
            TaskId::Reader => "reader",
            TaskId::Tone => "tone",
            TaskId::Melody => "melody",
            TaskId::Load => "load",
            TaskId::Profiler => "profiler",
        }
    }
}

// ---------------------------------------------------------------------------
// Resubmission
// ---------------------------------------------------------------------------

/// How a task asks to be released again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resubmit {
    /// Soft: release once, `delay` after the request is made.
    After(Duration),
    /// Hard: release `period` after the previous release, and flag the run
    /// if it completes later than `deadline` after that release.
    Periodic { period: Duration, deadline: Duration },
}

impl Resubmit {
    /// Pick the release mode from a task's `deadline_mode` flag.
    #[inline]
    pub const fn select(deadline_mode: bool, period: Duration, deadline: Duration) -> Self {
        if deadline_mode {
            Resubmit::Periodic { period, deadline }
        } else {
            Resubmit::After(period)
        }
    }

    /// True for the deadline-checked periodic path.
    #[inline]
    pub const fn is_hard(&self) -> bool {
        matches!(self, Resubmit::Periodic { .. })
    }
}

/// A release waiting in a task slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Release {
    /// Earliest instant the body may start.
    pub at: Instant,
    /// Latest acceptable completion, hard releases only.
    pub deadline: Option<Instant>,
}

// ---------------------------------------------------------------------------
// Execution state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// No release pending.
    Idle,
    /// Waiting for its release instant.
    Pending,
    /// Body currently executing.
    Running,
}

// ---------------------------------------------------------------------------
// Runtime statistics
// ---------------------------------------------------------------------------

/// Per-task counters kept by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskStats {
    /// Completed bodies.
    pub runs: u32,
    /// Hard releases that completed within their deadline.
    pub deadlines_met: u32,
    /// Hard releases that completed late.
    pub deadlines_missed: u32,
    /// Largest lateness observed, in microseconds.
    pub worst_lateness_us: u64,
}

impl TaskStats {
    pub const fn new() -> Self {
        Self {
            runs: 0,
            deadlines_met: 0,
            deadlines_missed: 0,
            worst_lateness_us: 0,
        }
    }

    /// Count one completed body.
    pub fn record_run(&mut self) {
        self.runs = self.runs.wrapping_add(1);
    }

    pub fn record_deadline_met(&mut self) {
        self.deadlines_met = self.deadlines_met.wrapping_add(1);
    }

    /// Count a late completion and track the worst lateness.
    pub fn record_deadline_missed(&mut self, lateness: Duration) {
        self.deadlines_missed = self.deadlines_missed.wrapping_add(1);
        self.worst_lateness_us = self.worst_lateness_us.max(lateness.ticks());
    }

}

impl Default for TaskStats {
    fn default() -> Self {
        Self::new()
    }
}
