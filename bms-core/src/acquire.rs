//! Acquisition sequencing over both chips.

use can_messages::Group;
use embedded_hal::{delay::DelayNs, spi::SpiDevice};
use ltc6802::{CELL_CONVERSION_US, Ltc6802, TEMPERATURE_CONVERSION_US};

use crate::{balance::ShuntMask, monitor::Sample};

/// Both monitor chips of the module.
pub struct Pack<SPI, D> {
    /// Cells 0-11.
    pub low: Ltc6802<SPI, D>,
    /// Cells 12-23.
    pub high: Ltc6802<SPI, D>,
}

impl<SPI, D> Pack<SPI, D>
where
    SPI: SpiDevice,
    D: DelayNs,
{
    pub fn new(low: Ltc6802<SPI, D>, high: Ltc6802<SPI, D>) -> Self {
        Self { low, high }
    }

    /// Apply `shunts`, convert everything and read it back.
    ///
    /// Both chips convert in parallel; `timer` covers the conversion waits so
    /// the executor can run other tasks meanwhile.
    pub async fn acquire<T>(&mut self, shunts: ShuntMask, timer: &mut T) -> Result<Sample, SPI::Error>
    where
        T: embedded_hal_async::delay::DelayNs,
    {
        self.high.write_config(shunts.discharge(Group::High))?;
        self.high.start_cell_conversion()?;
        self.low.write_config(shunts.discharge(Group::Low))?;
        self.low.start_cell_conversion()?;
        timer.delay_us(CELL_CONVERSION_US).await;

        self.high.start_temperature_conversion()?;
        self.low.start_temperature_conversion()?;
        timer.delay_us(TEMPERATURE_CONVERSION_US).await;

        let high_cells = self.high.read_cell_registers()?.millivolts();
        let high_sensors = self.high.read_temperature_registers()?.codes();
        let low_cells = self.low.read_cell_registers()?.millivolts();
        let low_sensors = self.low.read_temperature_registers()?.codes();

        let mut sample = Sample::default();
        let (low, high) = sample.cells.split_at_mut(ltc6802::CELLS);
        low.copy_from_slice(&low_cells);
        high.copy_from_slice(&high_cells);
        let (low, high) = sample.sensors.split_at_mut(ltc6802::SENSORS);
        low.copy_from_slice(&low_sensors);
        high.copy_from_slice(&high_sensors);
        Ok(sample)
    }
}
