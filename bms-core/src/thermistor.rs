//! NTC thermistor linearization.
//!
//! 100 kΩ NTC, B25/100 = 4540 K, read by the chip's external temperature
//! inputs. Full scale is nominally 2048 but input loading pulls it to ~2030.

/// ADC code at -40, -30, ... 160 °C.
const TABLE: [u16; 21] = [
    1987, 1946, 1876, 1763, 1599, 1386, 1140, 890, 668, 492, 352, 249, 176, 126, 91, 65, 48, 36,
    28, 20, 16,
];
const STEP: u16 = 10;

/// Codes above this come from an unplugged sensor, which reads around -30 °C.
const PLAUSIBLE_LIMIT: u16 = 1950;

/// Temperature code for an averaged ADC reading, °C + 40.
///
/// Returns 0 when temperatures are disabled, the sensor looks unplugged, or
/// the code is at or below the hottest table entry.
pub fn linearize(adc: u16) -> u8 {
    if cfg!(feature = "disable-temps") || adc > PLAUSIBLE_LIMIT {
        return 0;
    }
    TABLE
        .windows(2)
        .enumerate()
        .find(|(_, pair)| adc <= pair[0] && adc > pair[1])
        .map(|(n, pair)| {
            let fraction = STEP * (pair[0] - adc) / (pair[0] - pair[1]);
            (n as u16 * STEP + fraction) as u8
        })
        .unwrap_or(0)
}
