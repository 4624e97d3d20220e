//! Two-colour status LED policy.

/// Desired LED state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusLed {
    pub green: bool,
    pub red: bool,
}

impl Default for StatusLed {
    fn default() -> Self {
        Self {
            green: true,
            red: false,
        }
    }
}

/// Conditions the LED reports, in priority order.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Conditions {
    pub shunting: bool,
    pub no_cells: bool,
    pub comms_lost: bool,
}

/// Blink phase, advanced once per evaluation window.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Blinker(u8);

impl Blinker {
    pub fn advance(&mut self) {
        self.0 = (self.0 + 1) & 0b11;
    }

    fn is_on(self) -> bool {
        self.0 & 1 == 1
    }

    pub fn status(self, conditions: Conditions) -> StatusLed {
        let on = self.is_on();
        if conditions.shunting {
            StatusLed { green: true, red: on }
        } else if conditions.no_cells {
            StatusLed { green: false, red: on }
        } else if conditions.comms_lost {
            StatusLed { green: !on, red: false }
        } else {
            StatusLed::default()
        }
    }
}
