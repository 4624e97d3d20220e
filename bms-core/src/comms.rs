//! Request handoff from the CAN receive path and reply assembly.

use can_messages::{CellVoltages, Group, ShuntRequest, Temperatures};
use embassy_sync::{blocking_mutex::raw::RawMutex, signal::Signal};

use crate::{COMMS_TIMEOUT, CELLS, SENSORS};

/// A poll received for one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Request {
    pub group: Group,
    /// Balancing target for the whole module, 0 disables balancing.
    pub target_mv: u16,
}

impl Request {
    pub fn new(group: Group, request: &ShuntRequest) -> Self {
        Self {
            group,
            target_mv: request.target_mv(),
        }
    }
}

/// One pending request per group. A newer request replaces an unserved one.
pub struct RequestMailbox<M: RawMutex> {
    low: Signal<M, u16>,
    high: Signal<M, u16>,
}

impl<M: RawMutex> RequestMailbox<M> {
    pub const fn new() -> Self {
        Self {
            low: Signal::new(),
            high: Signal::new(),
        }
    }

    fn slot(&self, group: Group) -> &Signal<M, u16> {
        match group {
            Group::Low => &self.low,
            Group::High => &self.high,
        }
    }

    pub fn post(&self, request: Request) {
        self.slot(request.group).signal(request.target_mv);
    }

    /// Take one pending request. The low group wins; a high group request
    /// stays pending for a later call.
    pub fn take(&self) -> Option<Request> {
        Group::ALL.into_iter().find_map(|group| {
            self.slot(group)
                .try_take()
                .map(|target_mv| Request { group, target_mv })
        })
    }
}

impl<M: RawMutex> Default for RequestMailbox<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Cycles since the last request, saturating at [`COMMS_TIMEOUT`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CommsTimer(u8);

impl CommsTimer {
    /// Count one cycle. True once the controller has been silent for too long.
    pub fn tick(&mut self) -> bool {
        if self.0 < COMMS_TIMEOUT {
            self.0 += 1;
            false
        } else {
            true
        }
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }

    pub fn is_expired(&self) -> bool {
        self.0 >= COMMS_TIMEOUT
    }
}

/// The four frames answering one request, in transmit order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub group: Group,
    pub voltages: [CellVoltages; 3],
    pub temperatures: Temperatures,
}

impl Reply {
    pub(crate) fn new(group: Group, voltages: &[u16; CELLS], temperatures: &[u8; SENSORS]) -> Self {
        let first_cell = group.index() * ltc6802::CELLS;
        let first_sensor = group.index() * ltc6802::SENSORS;
        let voltages = core::array::from_fn(|packet| {
            let start = first_cell + packet * 4;
            CellVoltages::new(core::array::from_fn(|n| voltages[start + n]))
        });
        let temperatures =
            Temperatures::new([temperatures[first_sensor], temperatures[first_sensor + 1]]);
        Self {
            group,
            voltages,
            temperatures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    #[test]
    fn mailbox_keeps_latest_request_per_group() {
        let mailbox = RequestMailbox::<NoopRawMutex>::new();
        assert_eq!(mailbox.take(), None);

        mailbox.post(Request { group: Group::High, target_mv: 3500 });
        mailbox.post(Request { group: Group::High, target_mv: 3600 });
        assert_eq!(mailbox.take(), Some(Request { group: Group::High, target_mv: 3600 }));
        assert_eq!(mailbox.take(), None);
    }

    #[test]
    fn low_group_is_served_first() {
        let mailbox = RequestMailbox::<NoopRawMutex>::new();
        mailbox.post(Request { group: Group::High, target_mv: 1 });
        mailbox.post(Request { group: Group::Low, target_mv: 2 });
        assert_eq!(mailbox.take(), Some(Request { group: Group::Low, target_mv: 2 }));
        assert_eq!(mailbox.take(), Some(Request { group: Group::High, target_mv: 1 }));
    }

    #[test]
    fn timer_expires_after_timeout_cycles() {
        let mut timer = CommsTimer::default();
        for _ in 0..COMMS_TIMEOUT {
            assert!(!timer.tick());
        }
        assert!(timer.is_expired());
        assert!(timer.tick());
        assert!(timer.tick());
        timer.reset();
        assert!(!timer.is_expired());
        assert!(!timer.tick());
    }

    #[test]
    fn reply_groups_cells_in_fours() {
        let voltages = core::array::from_fn(|cell| 3000 + cell as u16);
        let temperatures = [61, 62, 35, 100];

        let low = Reply::new(Group::Low, &voltages, &temperatures);
        assert_eq!(low.voltages[0].voltages_mv(), [3000, 3001, 3002, 3003]);
        assert_eq!(low.voltages[1].voltages_mv(), [3004, 3005, 3006, 3007]);
        assert_eq!(low.voltages[2].voltages_mv(), [3008, 3009, 3010, 3011]);
        assert_eq!(low.temperatures.codes, [61, 62]);

        let high = Reply::new(Group::High, &voltages, &temperatures);
        assert_eq!(high.voltages[0].voltages_mv(), [3012, 3013, 3014, 3015]);
        assert_eq!(high.voltages[2].voltages_mv(), [3020, 3021, 3022, 3023]);
        assert_eq!(high.temperatures.codes, [35, 100]);
        assert_eq!(high.temperatures.reserved, [0; 6]);
    }
}
