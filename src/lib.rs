//! # rts-tone: deadline-scheduled tone node
//!
//! Reactive control core of a small audio/load-simulation node for ARM
//! Cortex-M4 microcontrollers.
//!
//! ## Overview
//!
//! Three periodic task chains compete for a single execution context:
//!
//! - **Tone generator**: toggles a DAC line at the half-period of the current
//!   note, honouring volume and mute
//! - **Melody sequencer**: walks a 32-note tune, transposed by the current key
//!   and paced by the current tempo
//! - **Background load**: busy-spins for a configurable number of iterations
//!
//! Each chain reschedules itself at the end of its body, either *soft*
//! (some time after it finished) or *hard* (at a fixed cadence, with a
//! completion deadline that is checked and reported). A single runtime flag
//! picks the mode, and every chain reads it on each resubmission.
//!
//! A WCET profiler measures the same bodies with the hardware cycle counter.
//! A CAN greeting goes out at startup and received frames are echoed to the
//! console.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │        Firmware / host runner (main.rs)                │
//! ├────────────────────────────────────────────────────────┤
//! │                  Node (node.rs)                        │
//! │     start() · receive() · task bodies · commands       │
//! ├───────────────┬───────────────────┬────────────────────┤
//! │  Scheduler    │   Workloads       │  Profiler          │
//! │  scheduler.rs │   tone.rs         │  profiler.rs       │
//! │  ─ submit()   │   melody.rs       │  ─ measure()       │
//! │  ─ dispatch() │   load.rs         │                    │
//! ├───────────────┴───────────────────┴────────────────────┤
//! │  Task model (task.rs) · Commands · CAN (can.rs)        │
//! ├────────────────────────────────────────────────────────┤
//! │    Clock (clock.rs): CycleCounter · Monotonic          │
//! ├────────────────────────────────────────────────────────┤
//! │    Arch port (arch/cortex_m4.rs): DWT CYCCNT · DAC     │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency Model
//!
//! - **Run-to-completion**: one body at a time, never suspended mid-body
//! - **Single owner**: all state lives in [`Node`] and is only reached
//!   through `&mut self` from a body, so no locks are needed
//! - **No cancellation**: mode, mute and playing flags change behavior at the
//!   next tick or resubmission
//!
//! ## Memory Model
//!
//! - **No heap**: bounded `heapless` buffers only
//! - **Fixed task set**: one pending-release slot per [`TaskId`]

#![no_std]

pub mod arch;
pub mod can;
pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod load;
pub mod melody;
pub mod node;
pub mod profiler;
pub mod scheduler;
pub mod task;
pub mod tone;

pub use can::{Can, CanFrame, NullCan};
pub use clock::{CycleClock, CycleCounter, Duration, Instant, ManualClock, Monotonic};
pub use error::{InputError, ProfileError, ScheduleError};
pub use node::{Node, Subject};
pub use profiler::{WcetProfiler, WcetReport};
pub use scheduler::{DeadlineScheduler, Dispatched, Runner};
pub use task::{Resubmit, TaskId};
pub use tone::{Adjust, Dac, NullDac};
