//! Bit-banged SPI bus for boards where the monitor chips sit on plain GPIOs.
//!
//! Mode 0, MSB first: the data line is set up, the clock rises (the chip
//! samples), the clock falls. Chip select is left to the `SpiDevice` wrapper.

use core::convert::Infallible;

use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
    spi::{ErrorType, SpiBus},
};
use unwrap_infallible::UnwrapInfallible;

/// Half clock period. The delay must be accurate to the microsecond.
pub const HALF_PERIOD_US: u32 = 2;
/// Word clocked out on the data line while reading.
const READ_FILL: u8 = 0xFF;

pub struct BitBangSpi<SCK, SDI, SDO, D> {
    sck: SCK,
    sdi: SDI,
    sdo: SDO,
    delay: D,
}

impl<SCK, SDI, SDO, D> BitBangSpi<SCK, SDI, SDO, D>
where
    SCK: OutputPin<Error = Infallible>,
    SDI: OutputPin<Error = Infallible>,
    SDO: InputPin<Error = Infallible>,
    D: DelayNs,
{
    /// `sdi` is the chip's data input, `sdo` its data output.
    pub fn new(mut sck: SCK, sdi: SDI, sdo: SDO, delay: D) -> Self {
        sck.set_low().unwrap_infallible();
        Self {
            sck,
            sdi,
            sdo,
            delay,
        }
    }

    fn exchange(&mut self, out: u8) -> u8 {
        let mut word = 0;
        for bit in (0..8).rev() {
            self.sdi.set_state((out >> bit & 1 == 1).into()).unwrap_infallible();
            self.delay.delay_us(HALF_PERIOD_US);
            self.sck.set_high().unwrap_infallible();
            self.delay.delay_us(HALF_PERIOD_US);
            if self.sdo.is_high().unwrap_infallible() {
                word |= 1 << bit;
            }
            self.sck.set_low().unwrap_infallible();
        }
        word
    }
}

impl<SCK, SDI, SDO, D> ErrorType for BitBangSpi<SCK, SDI, SDO, D> {
    type Error = Infallible;
}

impl<SCK, SDI, SDO, D> SpiBus<u8> for BitBangSpi<SCK, SDI, SDO, D>
where
    SCK: OutputPin<Error = Infallible>,
    SDI: OutputPin<Error = Infallible>,
    SDO: InputPin<Error = Infallible>,
    D: DelayNs,
{
    fn read(&mut self, words: &mut [u8]) -> Result<(), Infallible> {
        for word in words {
            *word = self.exchange(READ_FILL);
        }
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Infallible> {
        for word in words {
            self.exchange(*word);
        }
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Infallible> {
        for i in 0..read.len().max(write.len()) {
            let word = self.exchange(write.get(i).copied().unwrap_or(READ_FILL));
            if let Some(slot) = read.get_mut(i) {
                *slot = word;
            }
        }
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Infallible> {
        for word in words {
            *word = self.exchange(*word);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}
