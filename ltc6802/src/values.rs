//! Register group readings and their decoding.

use crate::{CELLS, SENSORS};

/// Bytes clocked out for one cell voltage register read.
pub const CELL_REGISTER_BYTES: usize = 25;
/// Bytes clocked out for one temperature register read.
pub const TEMPERATURE_REGISTER_BYTES: usize = 5;

/// Raw cell voltage register group. Only the first 18 bytes carry codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRegisters(pub [u8; CELL_REGISTER_BYTES]);

impl Default for CellRegisters {
    fn default() -> Self {
        Self([0; CELL_REGISTER_BYTES])
    }
}

impl CellRegisters {
    /// Raw 12-bit ADC codes of all cells.
    pub fn codes(&self) -> [u16; CELLS] {
        let mut codes = [0; CELLS];
        for (pair, bytes) in codes.chunks_exact_mut(2).zip(self.0.chunks_exact(3)) {
            let (a, b) = unpack_pair([bytes[0], bytes[1], bytes[2]]);
            pair[0] = a;
            pair[1] = b;
        }
        codes
    }

    /// Cell voltages in millivolts, uncalibrated.
    pub fn millivolts(&self) -> [u16; CELLS] {
        self.codes().map(code_to_millivolts)
    }
}

/// Raw temperature register group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TemperatureRegisters(pub [u8; TEMPERATURE_REGISTER_BYTES]);

impl TemperatureRegisters {
    /// Raw 12-bit codes of both external thermistor inputs.
    ///
    /// Left in ADC units, the thermistor curve is applied downstream.
    pub fn codes(&self) -> [u16; SENSORS] {
        let [b0, b1, b2, ..] = self.0;
        let (a, b) = unpack_pair([b0, b1, b2]);
        [a, b]
    }
}

/// Two 12-bit values packed little-endian into three bytes.
fn unpack_pair(bytes: [u8; 3]) -> (u16, u16) {
    let [b0, b1, b2] = bytes.map(u16::from);
    let first = b0 | (b1 & 0x0F) << 8;
    let second = b1 >> 4 | b2 << 4;
    (first, second)
}

/// One LSB is 1.5 mV.
pub const fn code_to_millivolts(code: u16) -> u16 {
    code * 3 / 2
}
