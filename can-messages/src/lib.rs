#![no_std]

use num_enum::{TryFromPrimitive, IntoPrimitive};
use zerocopy::byteorder::big_endian::U16;

pub use can_messages_trait::prelude::*;

pub mod prelude {
    pub use can_messages_trait::prelude::*;
}

#[cfg(feature = "bitrate-1000k")]
pub const BITRATE: u32 = 1_000_000;
#[cfg(all(feature = "bitrate-500k", not(feature = "bitrate-1000k")))]
pub const BITRATE: u32 = 500_000;
#[cfg(all(
    feature = "bitrate-125k",
    not(any(feature = "bitrate-500k", feature = "bitrate-1000k"))
))]
pub const BITRATE: u32 = 125_000;
#[cfg(not(any(feature = "bitrate-125k", feature = "bitrate-500k", feature = "bitrate-1000k")))]
pub const BITRATE: u32 = 250_000;

/// First identifier of the BMS block on the bus.
pub const BASE_ID: u16 = 300;
/// Spacing between module identities, and between a module's low and high group.
pub const GROUP_STRIDE: u16 = 10;
/// Highest identity the rotary selector can produce.
pub const MAX_IDENTITY: u8 = 15;

/// Offsets inside a group's identifier block.
#[repr(u16)]
#[derive(Debug, TryFromPrimitive, IntoPrimitive, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    REQUEST = 0,
    VOLTAGES1 = 1,
    VOLTAGES2 = 2,
    VOLTAGES3 = 3,
    TEMPERATURES = 4,
}

impl Slot {
    /// Voltage reply slots in transmit order.
    pub const VOLTAGES: [Slot; 3] = [Slot::VOLTAGES1, Slot::VOLTAGES2, Slot::VOLTAGES3];
}

/// Half of the pack served by one monitor chip.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Group {
    /// Cells 0-11, sensors 0-1.
    Low = 0,
    /// Cells 12-23, sensors 2-3.
    High = 1,
}

impl Group {
    pub const ALL: [Group; 2] = [Group::Low, Group::High];

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Identity of this module on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModuleAddress(u8);

impl ModuleAddress {
    /// Identities above [`MAX_IDENTITY`] are masked to the selector width.
    pub const fn new(identity: u8) -> Self {
        Self(identity & MAX_IDENTITY)
    }

    pub const fn identity(self) -> u8 {
        self.0
    }

    /// Identifier the controller polls `group` on.
    pub const fn request_id(self, group: Group) -> u32 {
        BASE_ID as u32 + self.0 as u32 * GROUP_STRIDE as u32 + group as u32 * GROUP_STRIDE as u32
    }

    pub fn id(self, group: Group, slot: Slot) -> u32 {
        self.request_id(group) + u16::from(slot) as u32
    }

    /// Identifier of message `T` for `group`.
    pub fn id_of<T: CanMessage>(self, group: Group) -> u32 {
        self.request_id(group) + T::SLOT as u32
    }

    /// Which group, if any, a received identifier polls.
    pub fn match_request(self, id: u32) -> Option<Group> {
        Group::ALL
            .into_iter()
            .find(|group| self.request_id(*group) == id)
    }
}

/// Poll from the controller. Carries the balancing target for the whole module.
#[can_message(Slot::REQUEST)]
pub struct ShuntRequest {
    pub target_mv: U16,
}

impl ShuntRequest {
    pub fn new(target_mv: u16) -> Self {
        Self {
            target_mv: U16::new(target_mv),
        }
    }

    pub fn target_mv(&self) -> u16 {
        self.target_mv.get()
    }
}

/// Four consecutive cell voltages. Sent on each of the [`Slot::VOLTAGES`] slots.
#[can_message(Slot::VOLTAGES1)]
pub struct CellVoltages {
    pub voltages_mv: [U16; 4],
}

impl CellVoltages {
    pub fn new(voltages_mv: [u16; 4]) -> Self {
        Self {
            voltages_mv: voltages_mv.map(U16::new),
        }
    }

    pub fn voltages_mv(&self) -> [u16; 4] {
        self.voltages_mv.map(|v| v.get())
    }
}

/// Both sensor readings of a group.
///
/// Each code is the temperature in °C plus 40, 0 meaning unavailable.
#[can_message(Slot::TEMPERATURES)]
pub struct Temperatures {
    pub codes: [u8; 2],
    pub reserved: [u8; 6],
}

impl Temperatures {
    pub fn new(codes: [u8; 2]) -> Self {
        Self {
            codes,
            reserved: [0; 6],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RawFrame<'a>(u32, &'a [u8]);

    impl CanParseable for RawFrame<'_> {
        fn raw_id(&self) -> Option<u32> {
            Some(self.0)
        }
        fn payload(&self) -> &[u8] {
            self.1
        }
    }

    #[test]
    fn identifiers_follow_base_and_stride() {
        let addr = ModuleAddress::new(0);
        assert_eq!(addr.request_id(Group::Low), 300);
        assert_eq!(addr.request_id(Group::High), 310);

        let addr = ModuleAddress::new(3);
        assert_eq!(addr.request_id(Group::Low), 330);
        assert_eq!(addr.id(Group::Low, Slot::VOLTAGES1), 331);
        assert_eq!(addr.id(Group::Low, Slot::VOLTAGES3), 333);
        assert_eq!(addr.id(Group::High, Slot::TEMPERATURES), 344);
        assert_eq!(addr.id_of::<Temperatures>(Group::Low), 334);
        assert_eq!(addr.id_of::<CellVoltages>(Group::High), 341);
        assert_eq!(addr.id_of::<ShuntRequest>(Group::High), 340);
    }

    #[test]
    fn identity_is_masked_to_selector_width() {
        assert_eq!(ModuleAddress::new(0x1F).identity(), 15);
        let top = ModuleAddress::new(MAX_IDENTITY);
        assert!(top.id(Group::High, Slot::TEMPERATURES) <= can_messages_trait::MAX_ID);
    }

    #[test]
    fn requests_match_their_group() {
        let addr = ModuleAddress::new(2);
        assert_eq!(addr.match_request(320), Some(Group::Low));
        assert_eq!(addr.match_request(330), Some(Group::High));
        assert_eq!(addr.match_request(321), None);
        assert_eq!(addr.match_request(310), None);
    }

    #[test]
    fn shunt_request_is_big_endian_prefix() {
        let data = [0x0F, 0xA0, 0xAA, 0xBB, 0, 0, 0, 0];
        let frame = RawFrame(300, &data);
        let req = frame.try_decode::<ShuntRequest>(300).unwrap();
        assert_eq!(req.target_mv(), 4000);

        assert!(frame.try_decode::<ShuntRequest>(310).is_none());
        assert!(RawFrame(300, &[0x0F]).try_decode::<ShuntRequest>(300).is_none());
    }

    #[test]
    fn voltage_reply_layout() {
        let msg = CellVoltages::new([3300, 4200, 0, 0x1234]);
        assert_eq!(
            msg.as_bytes(),
            &[0x0C, 0xE4, 0x10, 0x68, 0x00, 0x00, 0x12, 0x34]
        );
        assert_eq!(msg.voltages_mv(), [3300, 4200, 0, 0x1234]);
    }

    #[test]
    fn temperature_reply_layout() {
        let msg = Temperatures::new([60, 197]);
        assert_eq!(msg.as_bytes(), &[60, 197, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn slots_round_trip_through_raw_offsets() {
        assert!(matches!(Slot::try_from(4u16), Ok(Slot::TEMPERATURES)));
        assert!(Slot::try_from(5u16).is_err());
    }
}
