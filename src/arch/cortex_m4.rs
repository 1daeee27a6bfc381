//! # Cortex-M4 Port Layer
//!
//! Cycle counter and DAC output for an STM32F4 running at 168 MHz.
//!
//! ## Cycle counter
//!
//! The Data Watchpoint and Trace unit carries a free-running 32-bit cycle
//! counter (`CYCCNT`). It only counts once trace is enabled in the Debug
//! Control Block (`DEMCR.TRCENA`) and `DWT_CTRL.CYCCNTENA` is set. Reading it
//! is a single load with no side effects, which keeps profiling overhead to
//! a couple of cycles per sample.
//!
//! ## DAC
//!
//! The tone generator drives DAC channel 2 through its 8-bit right-aligned
//! data holding register. Each write is one volatile byte store; the
//! converter itself is configured by the board bring-up code.

use cortex_m::peripheral::{DCB, DWT};

use crate::clock::CycleCounter;
use crate::tone::Dac;

/// Address of the DAC 8-bit data holding register driven by the tone
/// generator.
pub const DAC_DATA_ADDR: usize = 0x4000_741C;

/// `CYCCNT`-backed cycle counter. Owns the DWT so nothing else can reset it.
pub struct DwtCycleCounter {
    _dwt: DWT,
}

impl DwtCycleCounter {
    /// Enable trace and start the cycle counter from zero.
    pub fn new(dcb: &mut DCB, mut dwt: DWT) -> Self {
        dcb.enable_trace();
        dwt.set_cycle_count(0);
        dwt.enable_cycle_counter();
        Self { _dwt: dwt }
    }
}

impl CycleCounter for DwtCycleCounter {
    #[inline(always)]
    fn cycles(&mut self) -> u32 {
        DWT::cycle_count()
    }
}

/// Memory-mapped DAC data register.
pub struct DacRegister {
    data: *mut u8,
}

impl DacRegister {
    /// # Safety
    /// The DAC must be clocked and enabled, and no other code may write the
    /// data register while this handle exists.
    pub const unsafe fn new() -> Self {
        Self {
            data: DAC_DATA_ADDR as *mut u8,
        }
    }
}

impl Dac for DacRegister {
    #[inline(always)]
    fn write(&mut self, level: u8) {
        // SAFETY: `data` is the DAC holding register, exclusively owned per
        // the contract of `new`.
        unsafe { core::ptr::write_volatile(self.data, level) }
    }
}
