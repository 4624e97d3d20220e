//! Rolling averages, calibration and shunt decisions.

use can_messages::Group;
use ltc6802::Discharge;

use crate::{CELLS, SENSORS, WINDOW};

/// Averages above this mean the chip is powered but no cells are attached.
pub const MAX_CELL_MV: u16 = 5000;

/// Per-chip correction for the drop across the input buffer resistors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    /// Added to cells 0-11, in mV.
    pub low_correction_mv: u16,
    /// Added to cells 12-23, in mV.
    pub high_correction_mv: u16,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            low_correction_mv: 6,
            high_correction_mv: 6,
        }
    }
}

impl Calibration {
    /// The bottom cell of each chip sees a single resistor and gets half.
    fn correction_mv(&self, cell: usize) -> u16 {
        let correction = if cell < ltc6802::CELLS {
            self.low_correction_mv
        } else {
            self.high_correction_mv
        };
        if cell % ltc6802::CELLS == 0 {
            correction / 2
        } else {
            correction
        }
    }

    /// Corrected voltage of `cell`, or 0 for an absent cell.
    pub fn apply(&self, cell: usize, average_mv: u16) -> u16 {
        if average_mv == 0 {
            return 0;
        }
        let corrected = average_mv.saturating_add(self.correction_mv(cell));
        if corrected > MAX_CELL_MV { 0 } else { corrected }
    }
}

/// One shunt switch per cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ShuntMask(u32);

impl ShuntMask {
    pub const NONE: ShuntMask = ShuntMask(0);

    /// Shunt every cell above a non-zero target.
    pub fn select(voltages: &[u16; CELLS], target_mv: u16) -> Self {
        let bits = voltages
            .iter()
            .enumerate()
            .filter(|(_, v)| target_mv > 0 && **v > target_mv)
            .fold(0, |bits, (cell, _)| bits | 1 << cell);
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn is_set(self, cell: usize) -> bool {
        cell < CELLS && self.0 & (1 << cell) != 0
    }

    /// The 12 switches belonging to one chip.
    pub fn discharge(self, group: Group) -> Discharge {
        let shift = group.index() * ltc6802::CELLS;
        Discharge::from_bits((self.0 >> shift) as u16)
    }
}

/// Ring buffers holding the last [`WINDOW`] readings of every input.
#[derive(Debug, Clone)]
pub(crate) struct SampleWindow {
    cells: [[u16; WINDOW]; CELLS],
    sensors: [[u16; WINDOW]; SENSORS],
    next: usize,
}

impl SampleWindow {
    pub const fn new() -> Self {
        Self {
            cells: [[0; WINDOW]; CELLS],
            sensors: [[0; WINDOW]; SENSORS],
            next: 0,
        }
    }

    /// Store one reading of every input; true once the window is full.
    pub fn push(&mut self, cells: &[u16; CELLS], sensors: &[u16; SENSORS]) -> bool {
        for (buf, mv) in self.cells.iter_mut().zip(cells) {
            buf[self.next] = *mv;
        }
        for (buf, raw) in self.sensors.iter_mut().zip(sensors) {
            buf[self.next] = *raw;
        }
        self.next += 1;
        if self.next == WINDOW {
            self.next = 0;
            true
        } else {
            false
        }
    }

    pub fn cell_averages(&self) -> [u16; CELLS] {
        self.cells.map(|buf| mean(&buf))
    }

    pub fn sensor_averages(&self) -> [u16; SENSORS] {
        self.sensors.map(|buf| mean(&buf))
    }
}

fn mean(samples: &[u16; WINDOW]) -> u16 {
    let sum: u32 = samples.iter().map(|s| u32::from(*s)).sum();
    (sum / WINDOW as u32) as u16
}
