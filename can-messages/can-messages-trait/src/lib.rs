//! Helpers for CAN messages I/O.
#![no_std]

pub mod prelude {
    pub use zerocopy::{TryFromBytes, IntoBytes, Immutable, KnownLayout, Unaligned};
    pub use can_messages_derive::can_message;
    pub use super::{CanMessage, IncomingCan, OutgoingCan, CanParseable};
}

pub use can_messages_derive::*;

use zerocopy::{TryFromBytes, IntoBytes, Immutable, KnownLayout};

/// Widest identifier the configured bus accepts.
#[cfg(feature = "standard-id")]
pub const MAX_ID: u32 = 0x7FF;
#[cfg(not(feature = "standard-id"))]
pub const MAX_ID: u32 = 0x1FFF_FFFF;

/// Trait for payload structs answering at a fixed offset inside a group's identifier block.
pub trait CanMessage: TryFromBytes + IntoBytes + Immutable + KnownLayout {
    const SLOT: u16;
}

/// Extension trait for anything that is CAN-parseable.
pub trait CanParseable {
    /// Raw identifier, or `None` if the frame does not use the configured identifier width.
    fn raw_id(&self) -> Option<u32>;
    fn payload(&self) -> &[u8];
}

/// Extension trait for incoming CAN messages.
pub trait IncomingCan {
    /// Decode `T` if the frame carries identifier `id`.
    ///
    /// Trailing bytes past the message layout are ignored.
    fn try_decode<T: CanMessage>(&self, id: u32) -> Option<&T>;
}

impl<C> IncomingCan for C
where
    C: CanParseable,
{
    fn try_decode<T: CanMessage>(&self, id: u32) -> Option<&T> {
        if self.raw_id() == Some(id) {
            T::try_ref_from_prefix(self.payload()).ok().map(|(msg, _)| msg)
        } else {
            None
        }
    }
}

/// Extension trait for outgoing CAN messages.
pub trait OutgoingCan<T> {
    fn try_encode(&self, id: u32) -> Option<T>;
}

#[cfg(feature = "embassy")]
mod embassy {
    use embassy_stm32::can::{Id, frame::{Frame, Envelope}};
    use crate::prelude::*;

    impl CanParseable for Frame {
        fn raw_id(&self) -> Option<u32> {
            match self.id() {
                #[cfg(feature = "standard-id")]
                Id::Standard(id) => Some(id.as_raw().into()),
                #[cfg(not(feature = "standard-id"))]
                Id::Extended(id) => Some(id.as_raw()),
                _ => None,
            }
        }
        fn payload(&self) -> &[u8] {
            self.data()
        }
    }

    impl CanParseable for Envelope {
        fn raw_id(&self) -> Option<u32> {
            self.frame.raw_id()
        }
        fn payload(&self) -> &[u8] {
            self.frame.payload()
        }
    }

    impl<T> OutgoingCan<Frame> for T
    where
        T: CanMessage,
    {
        #[cfg(feature = "standard-id")]
        fn try_encode(&self, id: u32) -> Option<Frame> {
            let id = u16::try_from(id).ok()?;
            Frame::new_standard(id, self.as_bytes()).ok()
        }

        #[cfg(not(feature = "standard-id"))]
        fn try_encode(&self, id: u32) -> Option<Frame> {
            Frame::new_extended(id, self.as_bytes()).ok()
        }
    }
}
