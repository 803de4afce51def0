//! Hardware configuration types.
//!
//! - `MotorPins` - GPIO pin assignment of one motor driver
//! - `MotorConfig` - per-motor pins and mechanical constants
//! - `HardwareConfig` - GPIO driver and counter selection
//! - `CounterKind` - which free-running counter backs timing

use crate::consts::{
    DEFAULT_GPIO_MEM_PATH, DEFAULT_MIN_CYCLES_PER_STEP, DEFAULT_STEPS_PER_MM,
    DEFAULT_SYSTEM_TIMER_BASE, MAX_GPIO_PIN,
};
use crate::hal::driver::HalError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_steps_per_mm() -> f64 {
    DEFAULT_STEPS_PER_MM
}

fn default_min_cycles_per_step() -> u32 {
    DEFAULT_MIN_CYCLES_PER_STEP
}

fn default_gpio_driver() -> String {
    "bcm2835".to_string()
}

fn default_gpio_mem_path() -> PathBuf {
    PathBuf::from(DEFAULT_GPIO_MEM_PATH)
}

fn default_system_timer_base() -> u64 {
    DEFAULT_SYSTEM_TIMER_BASE
}

/// GPIO pins (BCM numbering) wired to one stepper driver board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorPins {
    /// Step input; one rising edge per step.
    pub step: u8,
    /// Direction input.
    pub dir: u8,
    /// Coil enable input (active low).
    pub enable: u8,
    /// Lower limit switch. Accepted but not acted upon.
    #[serde(default)]
    pub limit_low: Option<u8>,
    /// Upper limit switch. Accepted but not acted upon.
    #[serde(default)]
    pub limit_high: Option<u8>,
}

impl MotorPins {
    /// Output pins the engine drives, in configuration order.
    pub fn outputs(&self) -> [u8; 3] {
        [self.step, self.dir, self.enable]
    }
}

/// Per-motor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorConfig {
    /// Human-readable motor name (unique within an engine).
    pub name: String,

    /// Pin assignment.
    pub pins: MotorPins,

    /// Steps per millimetre of travel.
    #[serde(default = "default_steps_per_mm")]
    pub steps_per_mm: f64,

    /// Minimum ticks between two steps (maximum speed clamp).
    #[serde(default = "default_min_cycles_per_step")]
    pub min_cycles_per_step: u32,
}

impl MotorConfig {
    /// Validate a single motor entry.
    pub fn validate(&self) -> Result<(), HalError> {
        if self.name.is_empty() {
            return Err(HalError::ConfigError("motor name cannot be empty".to_string()));
        }
        if !self.steps_per_mm.is_finite() || self.steps_per_mm <= 0.0 {
            return Err(HalError::ConfigError(format!(
                "motor {}: steps_per_mm must be positive, got {}",
                self.name, self.steps_per_mm
            )));
        }
        if self.min_cycles_per_step == 0 {
            return Err(HalError::ConfigError(format!(
                "motor {}: min_cycles_per_step must be at least 1",
                self.name
            )));
        }
        let limits = [self.pins.limit_low, self.pins.limit_high];
        for pin in self.pins.outputs().into_iter().chain(limits.into_iter().flatten()) {
            if pin > MAX_GPIO_PIN {
                return Err(HalError::InvalidPin(pin));
            }
        }
        Ok(())
    }
}

/// Which free-running counter backs calibration and pulse timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CounterKind {
    /// BCM2835 1 MHz system timer mapped from `/dev/mem`.
    #[default]
    SystemTimer,
    /// `Instant`-based software clock (degraded precision).
    Monotonic,
}

/// Hardware backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareConfig {
    /// Registered GPIO driver name ("bcm2835", "simulation").
    #[serde(default = "default_gpio_driver")]
    pub gpio_driver: String,

    /// GPIO register device mapped by the bcm2835 driver.
    #[serde(default = "default_gpio_mem_path")]
    pub gpio_mem_path: PathBuf,

    /// Counter backend.
    #[serde(default)]
    pub counter: CounterKind,

    /// Physical address of the system timer registers.
    #[serde(default = "default_system_timer_base")]
    pub system_timer_base: u64,

    /// Fall back to the monotonic clock if the system timer cannot be mapped.
    #[serde(default)]
    pub allow_software_clock: bool,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            gpio_driver: default_gpio_driver(),
            gpio_mem_path: default_gpio_mem_path(),
            counter: CounterKind::default(),
            system_timer_base: default_system_timer_base(),
            allow_software_clock: false,
        }
    }
}

impl HardwareConfig {
    /// Simulation backends: recorded GPIO and a software clock.
    pub fn simulation() -> Self {
        Self {
            gpio_driver: "simulation".to_string(),
            counter: CounterKind::Monotonic,
            allow_software_clock: true,
            ..Self::default()
        }
    }
}
