#![cfg_attr(not(test), no_std)]
//! Driver for the LTC6802 12-cell battery stack monitor.
//!
//! One driver instance talks to one chip on its own SPI bus. Conversions are
//! started and read back in separate calls so that several chips can convert
//! at the same time; the caller waits [`CELL_CONVERSION_US`] or
//! [`TEMPERATURE_CONVERSION_US`] in between.

use embedded_hal::{
    delay::DelayNs,
    spi::{Operation, SpiDevice},
};

pub mod bitbang;
mod config;
mod values;
pub use config::*;
pub use values::*;

/// Cells measured by one chip.
pub const CELLS: usize = 12;
/// External thermistor inputs of one chip.
pub const SENSORS: usize = 2;

/// Wait after starting a cell conversion. The chip needs up to 16 ms.
pub const CELL_CONVERSION_US: u32 = 20_000;
/// Wait after starting a temperature conversion. The chip needs about 3 ms.
pub const TEMPERATURE_CONVERSION_US: u32 = 5_000;
/// Idle time after configuration writes and register reads.
pub const COMMAND_GAP_US: u32 = 100;

/// LTC6802 command codes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    WriteConfig = 0x01,
    ReadCells = 0x04,
    ReadTemperatures = 0x08,
    StartCellConversion = 0x10,
    StartTemperatureConversion = 0x30,
}

/// The LTC6802 driver.
///
/// A chip that is unplugged reads back stable but meaningless registers;
/// nothing here can tell, range checks belong to the caller.
pub struct Ltc6802<SPI, D> {
    spi: SPI,
    delay: D,
    config: Config,
}

impl<SPI, D> Ltc6802<SPI, D> {
    /// New driver with default configuration and all shunts off.
    pub fn new(spi: SPI, delay: D) -> Self {
        Self {
            spi,
            delay,
            config: Config::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn release(self) -> (SPI, D) {
        (self.spi, self.delay)
    }
}

impl<SPI, D> Ltc6802<SPI, D>
where
    SPI: SpiDevice,
    D: DelayNs,
{
    fn command(&mut self, command: Command) -> Result<(), SPI::Error> {
        self.spi.write(&[command as u8])
    }

    fn read_group(&mut self, command: Command, buf: &mut [u8]) -> Result<(), SPI::Error> {
        self.spi
            .transaction(&mut [Operation::Write(&[command as u8]), Operation::Read(buf)])?;
        self.delay.delay_us(COMMAND_GAP_US);
        Ok(())
    }

    /// Write the configuration group with a new shunt selection.
    pub fn write_config(&mut self, discharge: Discharge) -> Result<(), SPI::Error> {
        self.config.discharge = discharge;
        let [c0, c1, c2, c3, c4, c5] = self.config.as_bytes();
        self.spi
            .write(&[Command::WriteConfig as u8, c0, c1, c2, c3, c4, c5])?;
        self.delay.delay_us(COMMAND_GAP_US);
        Ok(())
    }

    /// Start converting all cell voltages.
    pub fn start_cell_conversion(&mut self) -> Result<(), SPI::Error> {
        self.command(Command::StartCellConversion)
    }

    /// Start converting both thermistor inputs.
    pub fn start_temperature_conversion(&mut self) -> Result<(), SPI::Error> {
        self.command(Command::StartTemperatureConversion)
    }

    /// Read the cell voltage register group.
    pub fn read_cell_registers(&mut self) -> Result<CellRegisters, SPI::Error> {
        let mut regs = CellRegisters::default();
        self.read_group(Command::ReadCells, &mut regs.0)?;
        Ok(regs)
    }

    /// Read the temperature register group.
    pub fn read_temperature_registers(&mut self) -> Result<TemperatureRegisters, SPI::Error> {
        let mut regs = TemperatureRegisters::default();
        self.read_group(Command::ReadTemperatures, &mut regs.0)?;
        Ok(regs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::spi::ErrorType;
    use std::{collections::VecDeque, vec, vec::Vec};

    /// Records every transaction, answers reads from a queue.
    #[derive(Default)]
    struct FakeSpi {
        transactions: Vec<Vec<u8>>,
        replies: VecDeque<u8>,
    }

    impl ErrorType for FakeSpi {
        type Error = Infallible;
    }

    impl SpiDevice for FakeSpi {
        fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Infallible> {
            let mut written = Vec::new();
            for op in operations {
                match op {
                    Operation::Write(words) => written.extend_from_slice(words),
                    Operation::Read(words) => {
                        for word in words.iter_mut() {
                            *word = self.replies.pop_front().unwrap_or(0);
                        }
                    }
                    _ => unimplemented!(),
                }
            }
            self.transactions.push(written);
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingDelay(u32);

    impl DelayNs for CountingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.0 += ns;
        }
    }

    fn chip() -> Ltc6802<FakeSpi, CountingDelay> {
        Ltc6802::new(FakeSpi::default(), CountingDelay::default())
    }

    #[test]
    fn config_write_carries_shunt_bits() {
        let mut ltc = chip();
        ltc.write_config(Discharge::from_bits(0x0F01)).unwrap();
        let (spi, delay) = ltc.release();
        assert_eq!(spi.transactions, [vec![0x01, 0x01, 0x01, 0x0F, 0, 0, 0]]);
        assert_eq!(delay.0, COMMAND_GAP_US * 1000);
    }

    #[test]
    fn conversions_are_single_byte_commands() {
        let mut ltc = chip();
        ltc.start_cell_conversion().unwrap();
        ltc.start_temperature_conversion().unwrap();
        let (spi, _) = ltc.release();
        assert_eq!(spi.transactions, [vec![0x10], vec![0x30]]);
    }

    #[test]
    fn cell_read_returns_full_group() {
        let mut ltc = chip();
        ltc.spi.replies.extend((0..CELL_REGISTER_BYTES as u8).map(|b| b + 1));
        let regs = ltc.read_cell_registers().unwrap();
        assert_eq!(regs.0[0], 1);
        assert_eq!(regs.0[CELL_REGISTER_BYTES - 1], CELL_REGISTER_BYTES as u8);
        assert_eq!(ltc.spi.transactions, [vec![0x04]]);
    }

    #[test]
    fn temperature_read_decodes_codes() {
        let mut ltc = chip();
        ltc.spi.replies.extend([0xC3, 0x57, 0x7C, 0, 0]);
        let regs = ltc.read_temperature_registers().unwrap();
        assert_eq!(regs.codes(), [0x7C3, 0x7C5]);
        assert_eq!(ltc.spi.transactions, [vec![0x08]]);
    }

    #[test]
    fn config_is_remembered() {
        let mut ltc = chip();
        ltc.write_config(Discharge::from_bits(0x003)).unwrap();
        assert_eq!(ltc.config().discharge.bits(), 0x003);
        assert_eq!(ltc.config().duty_cycle, ComparatorDutyCycle::ComparatorOff);
    }
}
