#![cfg_attr(not(test), no_std)]
//! Acquisition, balancing and reporting logic of a 24-cell module built from
//! two LTC6802 chips.
//!
//! Everything here is hardware independent: the firmware feeds one [`Sample`]
//! per cycle into the [`Monitor`] and acts on what comes back.

mod acquire;
mod balance;
mod comms;
mod identity;
mod monitor;
mod status;
mod thermistor;

pub use acquire::Pack;
pub use balance::{Calibration, ShuntMask, MAX_CELL_MV};
pub use comms::{CommsTimer, Reply, Request, RequestMailbox};
pub use identity::decode_selector;
pub use monitor::{Monitor, Sample, Tick};
pub use status::StatusLed;
pub use thermistor::linearize;

/// Cells in the pack.
pub const CELLS: usize = 2 * ltc6802::CELLS;
/// Thermistors in the pack.
pub const SENSORS: usize = 2 * ltc6802::SENSORS;
/// Samples averaged per evaluation window.
pub const WINDOW: usize = 8;
/// Main cycle frequency.
pub const CYCLE_HZ: u64 = 32;
/// Cycles without a request before balancing is switched off.
pub const COMMS_TIMEOUT: u8 = 32;
