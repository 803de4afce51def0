//! Shared fixture: a calibrated controller on simulated hardware.

#![allow(dead_code)]

use std::sync::Arc;
use stepr_common::config::{EngineConfig, RtConfig};
use stepr_common::hal::driver::{Hardware, Level};
use stepr_engine::interpreter::TickReport;
use stepr_engine::{Controller, TickInterpreter};
use stepr_hal::{SimulationCounter, SimulationGpio};

/// Microseconds the simulated counter advances per read.
pub const COUNTER_STEP_US: u64 = 2300;

/// Calibration window used by every fixture.
pub const CALIBRATION_TICKS: u32 = 100;

/// Frequency the fixture calibrates to: 100 ticks over 2300 µs.
pub const EXPECTED_HZ: f64 = 100.0 / 2300.0 * 1_000_000.0;

/// Default wiring: motor 0 step/dir/enable = 17/18/2, motor 1 = 23/24/3.
pub const STEP_PINS: [u8; 2] = [17, 23];
pub const DIR_PINS: [u8; 2] = [18, 24];
pub const ENABLE_PINS: [u8; 2] = [2, 3];

/// Fast test timings: no settle sleep, no pulse hold, short calibration.
pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.timing.tick_period_ns = 1_000;
    config.timing.enable_settle_us = 0;
    config.timing.pulse_width_us = 0;
    config.timing.calibration_ticks = CALIBRATION_TICKS;
    config.timing.calibration_timeout_ms = 5_000;
    config.rt = RtConfig::disabled();
    config
}

/// Fresh simulated hardware.
pub fn sim_hardware() -> (Hardware, Arc<SimulationGpio>) {
    let gpio = Arc::new(SimulationGpio::new());
    let hardware = Hardware {
        gpio: gpio.clone(),
        counter: Arc::new(SimulationCounter::new(COUNTER_STEP_US)),
    };
    (hardware, gpio)
}

/// Controller + interpreter driven tick by tick from the test thread.
pub struct Rig {
    pub ctl: Controller,
    pub gpio: Arc<SimulationGpio>,
    pub interp: TickInterpreter,
}

impl Rig {
    /// Build and run the calibration tick.
    pub fn calibrated() -> Self {
        let (hardware, gpio) = sim_hardware();
        let ctl = Controller::new(&test_config(), hardware).unwrap();
        let mut rig = Self {
            ctl,
            gpio,
            interp: TickInterpreter::new(),
        };
        let report = rig.tick();
        assert!(report.calibrated);
        rig
    }

    pub fn tick(&mut self) -> TickReport {
        self.interp.tick(&self.ctl).unwrap()
    }

    /// Tick until every motor is idle; returns ticks run. Panics past `limit`.
    pub fn run_until_idle(&mut self, limit: u64) -> u64 {
        for n in 0..limit {
            if self.ctl.all_idle() {
                return n;
            }
            self.tick();
        }
        panic!("motors still busy after {limit} ticks");
    }

    pub fn steps(&self, motor: usize) -> u64 {
        self.gpio.rising_edges(STEP_PINS[motor])
    }

    pub fn dir(&self, motor: usize) -> Level {
        self.gpio.level(DIR_PINS[motor])
    }

    /// Coil state as seen on the active-low enable pin.
    pub fn coil_energized(&self, motor: usize) -> bool {
        self.gpio.level(ENABLE_PINS[motor]) == Level::Low
    }
}
