//! Module identity from the rotary selector.

use can_messages::ModuleAddress;

/// Identity from the selector input levels, weights 1, 2, 4, 8.
///
/// Inputs are pulled up and the switch grounds the selected bits.
pub fn decode_selector(levels_high: [bool; 4]) -> ModuleAddress {
    let identity = levels_high
        .iter()
        .enumerate()
        .filter(|(_, high)| !**high)
        .fold(0, |id, (bit, _)| id | 1 << bit);
    ModuleAddress::new(identity)
}
