//! Busy-wait delay for bit timing.
//!
//! The embassy time driver ticks at 32.768 kHz, far too coarse for the
//! microsecond half-periods of the bit-banged buses.

use embedded_hal::delay::DelayNs;

/// Core clock set up in `main`.
pub const SYSCLK_HZ: u32 = 48_000_000;

const CYCLES_PER_US: u32 = SYSCLK_HZ / 1_000_000;

#[derive(Debug, Clone, Copy, Default)]
pub struct CycleDelay;

impl DelayNs for CycleDelay {
    fn delay_ns(&mut self, ns: u32) {
        let cycles = (ns / 1000).saturating_mul(CYCLES_PER_US) + (ns % 1000) * CYCLES_PER_US / 1000;
        cortex_m::asm::delay(cycles.max(1));
    }

    fn delay_us(&mut self, us: u32) {
        cortex_m::asm::delay(us.saturating_mul(CYCLES_PER_US));
    }
}
