//! # Architecture Abstraction Layer
//!
//! Hardware collaborators behind the library's [`CycleCounter`] and [`Dac`]
//! traits. Currently implements the Cortex-M4 / STM32F4 port; other targets
//! add sibling modules.
//!
//! [`CycleCounter`]: crate::clock::CycleCounter
//! [`Dac`]: crate::tone::Dac

pub mod cortex_m4;
