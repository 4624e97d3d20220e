//! Per-cycle state of the module.

use crate::{
    CELLS, SENSORS,
    balance::{Calibration, SampleWindow, ShuntMask},
    comms::{CommsTimer, Reply, Request},
    status::{Blinker, Conditions, StatusLed},
    thermistor::linearize,
};

/// One cycle's worth of readings from both chips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Uncalibrated cell voltages in mV.
    pub cells: [u16; CELLS],
    /// Raw thermistor codes.
    pub sensors: [u16; SENSORS],
}

impl Default for Sample {
    fn default() -> Self {
        Self {
            cells: [0; CELLS],
            sensors: [0; SENSORS],
        }
    }
}

/// What the firmware has to act on after a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tick {
    /// New LED state, once per evaluation window.
    pub status: Option<StatusLed>,
    /// Frames to send for a served request.
    pub reply: Option<Reply>,
}

pub struct Monitor {
    calibration: Calibration,
    window: SampleWindow,
    voltages: [u16; CELLS],
    sensors: [u16; SENSORS],
    shunts: ShuntMask,
    target_mv: u16,
    comms: CommsTimer,
    blinker: Blinker,
    status: StatusLed,
}

impl Monitor {
    pub fn new(calibration: Calibration) -> Self {
        Self {
            calibration,
            window: SampleWindow::new(),
            voltages: [0; CELLS],
            sensors: [0; SENSORS],
            shunts: ShuntMask::NONE,
            target_mv: 0,
            comms: CommsTimer::default(),
            blinker: Blinker::default(),
            status: StatusLed::default(),
        }
    }

    /// Calibrated cell voltages of the last window, 0 for absent cells.
    pub fn voltages(&self) -> &[u16; CELLS] {
        &self.voltages
    }

    /// Temperature codes of the last window, °C + 40.
    pub fn temperatures(&self) -> [u8; SENSORS] {
        self.sensors.map(linearize)
    }

    pub fn shunts(&self) -> ShuntMask {
        self.shunts
    }

    pub fn target_mv(&self) -> u16 {
        self.target_mv
    }

    pub fn status(&self) -> StatusLed {
        self.status
    }

    pub fn comms_lost(&self) -> bool {
        self.comms.is_expired()
    }

    /// Store a sample. Every full window recomputes voltages, shunts and the LED.
    pub fn record(&mut self, sample: &Sample) -> Option<StatusLed> {
        if !self.window.push(&sample.cells, &sample.sensors) {
            return None;
        }
        self.blinker.advance();

        let averages = self.window.cell_averages();
        for (cell, (voltage, average)) in self.voltages.iter_mut().zip(averages).enumerate() {
            *voltage = self.calibration.apply(cell, average);
        }
        self.sensors = self.window.sensor_averages();
        self.shunts = ShuntMask::select(&self.voltages, self.target_mv);

        self.status = self.blinker.status(Conditions {
            shunting: !self.shunts.is_empty(),
            no_cells: self.voltages.iter().all(|v| *v == 0),
            comms_lost: self.comms.is_expired(),
        });
        Some(self.status)
    }

    /// Advance the comms timer and serve at most one request.
    pub fn service(&mut self, request: Option<Request>) -> Option<Reply> {
        if self.comms.tick() {
            self.target_mv = 0;
        }
        let request = request?;
        self.comms.reset();
        self.target_mv = request.target_mv;
        Some(Reply::new(request.group, &self.voltages, &self.temperatures()))
    }

    /// One full cycle.
    pub fn tick(&mut self, sample: &Sample, request: Option<Request>) -> Tick {
        let status = self.record(sample);
        let reply = self.service(request);
        Tick { status, reply }
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new(Calibration::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{COMMS_TIMEOUT, WINDOW};
    use can_messages::Group;

    fn sample(cell_mv: u16) -> Sample {
        Sample {
            cells: [cell_mv; CELLS],
            sensors: [1140; SENSORS],
        }
    }

    fn run_window(monitor: &mut Monitor, sample: &Sample, request: Option<Request>) -> Tick {
        let mut last = Tick::default();
        for i in 0..WINDOW {
            let request = if i == 0 { request } else { None };
            last = monitor.tick(sample, request);
        }
        last
    }

    #[test]
    fn first_window_publishes_calibrated_voltages() {
        let mut monitor = Monitor::default();
        for _ in 0..WINDOW - 1 {
            assert_eq!(monitor.record(&sample(3300)), None);
        }
        assert!(monitor.record(&sample(3300)).is_some());

        let v = monitor.voltages();
        assert_eq!(v[0], 3303);
        assert_eq!(v[1], 3306);
        assert_eq!(v[12], 3303);
        assert_eq!(v[23], 3306);
        assert_eq!(monitor.temperatures(), [60; SENSORS]);
    }

    #[test]
    fn shunts_follow_requested_target() {
        let mut monitor = Monitor::default();
        let mut s = sample(3300);
        s.cells[5] = 3500;
        s.cells[20] = 3450;

        run_window(&mut monitor, &s, Some(Request { group: Group::Low, target_mv: 3400 }));
        let shunts = monitor.shunts();
        assert_eq!(shunts.bits(), 1 << 5 | 1 << 20);
        assert_eq!(shunts.discharge(Group::Low).bits(), 1 << 5);
        assert_eq!(shunts.discharge(Group::High).bits(), 1 << 8);
        assert!(monitor.status().green);
    }

    #[test]
    fn zero_target_never_shunts() {
        let mut monitor = Monitor::default();
        run_window(&mut monitor, &sample(4200), Some(Request { group: Group::High, target_mv: 0 }));
        assert!(monitor.shunts().is_empty());
    }

    #[test]
    fn silence_drops_target_and_shunts() {
        let mut monitor = Monitor::default();
        let s = sample(3600);
        monitor.tick(&s, Some(Request { group: Group::Low, target_mv: 3500 }));
        assert_eq!(monitor.target_mv(), 3500);

        for _ in 0..COMMS_TIMEOUT {
            monitor.tick(&s, None);
        }
        assert!(monitor.comms_lost());
        assert_eq!(monitor.target_mv(), 3500);

        monitor.tick(&s, None);
        assert_eq!(monitor.target_mv(), 0);

        run_window(&mut monitor, &s, None);
        assert!(monitor.shunts().is_empty());
    }

    #[test]
    fn request_restarts_comms_timer() {
        let mut monitor = Monitor::default();
        let s = sample(3300);
        for _ in 0..=COMMS_TIMEOUT {
            monitor.tick(&s, None);
        }
        assert!(monitor.comms_lost());
        monitor.tick(&s, Some(Request { group: Group::High, target_mv: 3400 }));
        assert!(!monitor.comms_lost());
        assert_eq!(monitor.target_mv(), 3400);
    }

    #[test]
    fn no_cells_blinks_red() {
        let mut monitor = Monitor::default();
        let first = run_window(&mut monitor, &sample(0), None).status.unwrap();
        let second = run_window(&mut monitor, &sample(0), None).status.unwrap();
        assert!(!first.green && !second.green);
        assert_ne!(first.red, second.red);
    }

    #[test]
    fn unpowered_cells_read_zero() {
        let mut monitor = Monitor::default();
        run_window(&mut monitor, &sample(6142), None);
        assert_eq!(monitor.voltages(), &[0; CELLS]);
    }

    #[test]
    fn lost_comms_blinks_green() {
        let mut monitor = Monitor::default();
        let s = sample(3300);
        let mut seen = [false; 2];
        for _ in 0..8 {
            let tick = run_window(&mut monitor, &s, None);
            if let Some(status) = tick.status {
                if monitor.comms_lost() {
                    assert!(!status.red);
                    seen[status.green as usize] = true;
                }
            }
        }
        assert_eq!(seen, [true, true]);
    }

    #[test]
    fn reply_carries_group_data() {
        let mut monitor = Monitor::default();
        let mut s = sample(3300);
        s.sensors = [1599, 1140, 1015, 16];
        run_window(&mut monitor, &s, None);

        let reply = monitor
            .tick(&s, Some(Request { group: Group::High, target_mv: 0 }))
            .reply
            .unwrap();
        assert_eq!(reply.group, Group::High);
        assert_eq!(reply.voltages[0].voltages_mv(), [3303, 3306, 3306, 3306]);
        assert_eq!(reply.temperatures.codes, [65, 0]);

        let reply = monitor
            .tick(&s, Some(Request { group: Group::Low, target_mv: 0 }))
            .reply
            .unwrap();
        assert_eq!(reply.temperatures.codes, [40, 60]);
    }

    #[test]
    fn no_request_no_reply() {
        let mut monitor = Monitor::default();
        assert_eq!(monitor.tick(&sample(3300), None).reply, None);
    }
}
