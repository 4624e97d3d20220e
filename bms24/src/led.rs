//! Two-colour status LED driver

use bms_core::StatusLed;
use embassy_stm32::{
    Peri,
    gpio::{Level, OutputOpenDrain, Pin, Speed},
};

/// Common-anode LED, a segment lights when its pin is pulled low.
pub struct Led<'d> {
    green: OutputOpenDrain<'d>,
    red: OutputOpenDrain<'d>,
}

impl<'d> Led<'d> {
    pub fn new(green: Peri<'d, impl Pin>, red: Peri<'d, impl Pin>) -> Self {
        let green = OutputOpenDrain::new(green, Level::High, Speed::Low);
        let red = OutputOpenDrain::new(red, Level::High, Speed::Low);
        Self { green, red }
    }

    pub fn show(&mut self, status: StatusLed) {
        self.green.set_level(level(status.green));
        self.red.set_level(level(status.red));
    }
}

fn level(on: bool) -> Level {
    if on { Level::Low } else { Level::High }
}
