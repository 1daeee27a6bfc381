//! # Error Types
//!
//! Nothing in the node is fatal. Every condition below degrades to a
//! reported, recoverable state; limit-reached outcomes are not errors at all
//! and are modelled by [`Adjust`](crate::Adjust).

use thiserror::Error;

/// A scheduling request the scheduler refuses to coerce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("relative delay must be positive")]
    ZeroDelay,
    #[error("period must be positive")]
    ZeroPeriod,
    #[error("deadline must be positive")]
    ZeroDeadline,
}

/// A profiling request that cannot produce a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error("at least one iteration is required")]
    NoIterations,
}

/// Validation failure while committing the numeric input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("input is not an integer")]
    Malformed,
    #[error("key {0} outside accepted range")]
    KeyOutOfRange(i32),
    #[error("tempo {0} outside accepted range")]
    TempoOutOfRange(i32),
}
