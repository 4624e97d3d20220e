//! LTC6802 configuration register group handling.

use crate::CELLS;

/// Configuration register group (CFGR0..CFGR5).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub duty_cycle: ComparatorDutyCycle,
    pub discharge: Discharge,
}

impl Config {
    pub(crate) fn as_bytes(&self) -> [u8; 6] {
        let [low, high] = self.discharge.bits().to_le_bytes();
        [
            self.duty_cycle.as_config_bits(),
            low,
            high & 0x0F, // upper nibble masks cell interrupts, left clear
            0,
            0, // undervoltage comparison
            0, // overvoltage comparison
        ]
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            duty_cycle: ComparatorDutyCycle::ComparatorOff,
            discharge: Discharge::NONE,
        }
    }
}

/// Comparator duty cycle, CFGR0 bits 0..2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ComparatorDutyCycle {
    /// Reference and ADC powered down between commands.
    Standby,
    /// Conversions on command only, comparator off.
    ComparatorOff,
    /// Comparator polls every 13 ms.
    Period13ms,
    /// Comparator polls every 130 ms.
    Period130ms,
    /// Comparator polls every 500 ms.
    Period500ms,
}

impl ComparatorDutyCycle {
    fn as_config_bits(&self) -> u8 {
        match self {
            ComparatorDutyCycle::Standby => 0,
            ComparatorDutyCycle::ComparatorOff => 1,
            ComparatorDutyCycle::Period13ms => 2,
            ComparatorDutyCycle::Period130ms => 3,
            ComparatorDutyCycle::Period500ms => 4,
        }
    }
}

/// Shunt switches of one chip, bit `n` discharging cell `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Discharge(u16);

impl Discharge {
    pub const NONE: Discharge = Discharge(0);
    const MASK: u16 = (1 << CELLS) - 1;

    /// Bits above the chip's cell count are dropped.
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits & Self::MASK)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn is_set(self, cell: usize) -> bool {
        cell < CELLS && self.0 & (1 << cell) != 0
    }
}
