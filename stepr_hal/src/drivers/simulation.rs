//! Simulation GPIO driver.
//!
//! Records pin modes, levels, write counts and rising edges instead of
//! touching hardware. Used by `--simulate` runs and by the engine tests to
//! count emitted step pulses.

use parking_lot::Mutex;
use std::sync::Arc;
use stepr_common::consts::MAX_GPIO_PIN;
use stepr_common::hal::config::HardwareConfig;
use stepr_common::hal::driver::{GpioDriver, HalError, Level};
use tracing::trace;

const PIN_COUNT: usize = MAX_GPIO_PIN as usize + 1;

/// Recorded state of one simulated pin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PinState {
    /// Configured as output.
    pub output: bool,
    /// Last written level.
    pub level: Level,
    /// Low → High transitions seen.
    pub rising_edges: u64,
    /// Total writes, including ones that did not change the level.
    pub writes: u64,
}

/// Recording GPIO driver.
pub struct SimulationGpio {
    pins: Mutex<[PinState; PIN_COUNT]>,
}

impl SimulationGpio {
    /// Create a driver with every pin low and unconfigured.
    pub fn new() -> Self {
        Self {
            pins: Mutex::new([PinState::default(); PIN_COUNT]),
        }
    }

    /// Snapshot of a pin. Out-of-range pins read as default.
    pub fn pin(&self, pin: u8) -> PinState {
        self.pins
            .lock()
            .get(pin as usize)
            .copied()
            .unwrap_or_default()
    }

    /// Last written level.
    pub fn level(&self, pin: u8) -> Level {
        self.pin(pin).level
    }

    /// Low → High transitions; one per step pulse on a step pin.
    pub fn rising_edges(&self, pin: u8) -> u64 {
        self.pin(pin).rising_edges
    }

    /// Whether `configure_output` was called for the pin.
    pub fn is_output(&self, pin: u8) -> bool {
        self.pin(pin).output
    }
}

impl Default for SimulationGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl GpioDriver for SimulationGpio {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn configure_output(&self, pin: u8) -> Result<(), HalError> {
        let mut pins = self.pins.lock();
        let state = pins
            .get_mut(pin as usize)
            .ok_or(HalError::InvalidPin(pin))?;
        state.output = true;
        trace!("sim: pin {} configured as output", pin);
        Ok(())
    }

    fn write(&self, pin: u8, level: Level) {
        let mut pins = self.pins.lock();
        if let Some(state) = pins.get_mut(pin as usize) {
            if level == Level::High && state.level == Level::Low {
                state.rising_edges += 1;
            }
            state.level = level;
            state.writes += 1;
        }
    }
}

/// Factory function registered under "simulation".
pub fn create_driver(_config: &HardwareConfig) -> Result<Arc<dyn GpioDriver>, HalError> {
    Ok(Arc::new(SimulationGpio::new()))
}
