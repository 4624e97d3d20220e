#![feature(impl_trait_in_assoc_type)]
#![no_std]
#![no_main]

mod can;
mod delay;
mod led;

use {defmt_rtt as _, panic_probe as _};

use crate::{
    can::{ADDRESS, REPLIES, REQUESTS, process as can_process},
    delay::CycleDelay,
    led::Led,
};
use bms_core::{CYCLE_HZ, Calibration, Monitor, Pack, decode_selector};
use can_messages::ModuleAddress;
use defmt::{Debug2Format, error, info, unwrap, warn};
use embassy_executor::{Spawner, main};
use embassy_stm32::{
    Config as DeviceConfig, bind_interrupts,
    can::{self as stm32_can, Can},
    gpio::{Input, Level, Output, Pull, Speed},
    peripherals,
    wdg::IndependentWatchdog,
};
use embassy_time::{Delay, Duration, Ticker, Timer};
use embedded_hal_bus::spi::ExclusiveDevice;
use ltc6802::{Ltc6802, bitbang::BitBangSpi};
use portable_atomic::Ordering;
use unwrap_infallible::UnwrapInfallible;

bind_interrupts!(struct Irqs {
    CEC_CAN => stm32_can::Rx0InterruptHandler<peripherals::CAN>, stm32_can::Rx1InterruptHandler<peripherals::CAN>,
               stm32_can::TxInterruptHandler<peripherals::CAN>, stm32_can::SceInterruptHandler<peripherals::CAN>;
});

/// Watchdog timeout in µs.
const WATCHDOG_US: u32 = 120_000;
/// Settling time for the monitor chips after power-up.
const STARTUP_DELAY_MS: u64 = 100;

fn read_selector(selector: &[Input<'_>; 4]) -> ModuleAddress {
    decode_selector(selector.each_ref().map(|input| input.is_high()))
}

#[main]
async fn main(spawner: Spawner) {
    // HSI oscillator 8 MHz, 48 MHz system frequency (delay::SYSCLK_HZ)
    let mut config = DeviceConfig::default();
    {
        use embassy_stm32::rcc::*;
        config.rcc.hsi = true;
        config.rcc.hse = None;
        config.rcc.pll = Some(Pll {
            src: PllSource::HSI,
            prediv: PllPreDiv::DIV1,
            mul: PllMul::MUL6,
        });
        config.rcc.sys = Sysclk::PLL1_P;
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        config.rcc.apb1_pre = APBPrescaler::DIV1;
    }
    let dev = embassy_stm32::init(config);
    info!("BMS24 firmware {}", env!("CARGO_PKG_VERSION"));

    let mut dog = IndependentWatchdog::new(dev.IWDG, WATCHDOG_US);
    dog.unleash();

    // Status LED, green PB0, red PB1
    let mut led = Led::new(dev.PB0, dev.PB1);
    let mut monitor = Monitor::new(Calibration::default());
    led.show(monitor.status());

    // Identity selector, grounded inputs set their bit
    let selector = [
        Input::new(dev.PA0, Pull::Up),
        Input::new(dev.PA1, Pull::Up),
        Input::new(dev.PA2, Pull::Up),
        Input::new(dev.PA3, Pull::Up),
    ];
    let mut address = read_selector(&selector);
    ADDRESS.store(address.identity(), Ordering::Relaxed);
    info!("Module identity {}", address.identity());

    // CAN_RX PA11, CAN_TX PA12
    let can = Can::new(dev.CAN, dev.PA11, dev.PA12, Irqs);
    unwrap!(spawner.spawn(can_process(can)));
    dog.pet();

    // Bus 1: high chip, cells 12-23
    // SCK PA5, SDI PA7, SDO PA6, CS PA4
    let bus = BitBangSpi::new(
        Output::new(dev.PA5, Level::Low, Speed::Low),
        Output::new(dev.PA7, Level::High, Speed::Low),
        Input::new(dev.PA6, Pull::None),
        CycleDelay,
    );
    let cs = Output::new(dev.PA4, Level::High, Speed::Low);
    let high = ExclusiveDevice::new(bus, cs, Delay).unwrap_infallible();

    // Bus 2: low chip, cells 0-11
    // SCK PB3, SDI PB5, SDO PB4, CS PA15
    let bus = BitBangSpi::new(
        Output::new(dev.PB3, Level::Low, Speed::Low),
        Output::new(dev.PB5, Level::High, Speed::Low),
        Input::new(dev.PB4, Pull::None),
        CycleDelay,
    );
    let cs = Output::new(dev.PA15, Level::High, Speed::Low);
    let low = ExclusiveDevice::new(bus, cs, Delay).unwrap_infallible();

    let mut pack = Pack::new(Ltc6802::new(low, Delay), Ltc6802::new(high, Delay));

    Timer::after_millis(STARTUP_DELAY_MS).await;
    dog.pet();

    info!("System startup");
    let mut ticker = Ticker::every(Duration::from_hz(CYCLE_HZ));
    loop {
        dog.pet();

        match pack.acquire(monitor.shunts(), &mut Delay).await {
            Ok(sample) => {
                let was_lost = monitor.comms_lost();
                let tick = monitor.tick(&sample, REQUESTS.take());

                if let Some(status) = tick.status {
                    led.show(status);
                    let voltages = monitor.voltages();
                    info!(
                        "Cells {}..{} mV, shunts {:#x}",
                        voltages.iter().min().copied().unwrap_or(0),
                        voltages.iter().max().copied().unwrap_or(0),
                        monitor.shunts().bits(),
                    );
                }

                match (was_lost, monitor.comms_lost()) {
                    (false, true) => warn!("Controller silent, balancing off"),
                    (true, false) => info!("Controller back"),
                    _ => {}
                }

                if let Some(reply) = tick.reply {
                    info!("Request for {}, target {} mV", reply.group, monitor.target_mv());
                    if REPLIES.try_send((address, reply)).is_err() {
                        warn!("Reply queue full, reply dropped");
                    }
                }
            }
            Err(e) => error!("Acquisition failed: {}", Debug2Format(&e)),
        }

        let current = read_selector(&selector);
        if current != address {
            info!("Module identity {} -> {}", address.identity(), current.identity());
            address = current;
            ADDRESS.store(address.identity(), Ordering::Relaxed);
        }

        ticker.next().await;
    }
}
