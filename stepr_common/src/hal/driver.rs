//! Hardware boundary traits and error types.
//!
//! This module defines:
//! - `GpioDriver` trait - pin-mode configuration and digital writes
//! - `FreeRunningCounter` trait - non-blocking microsecond counter
//! - `Level` enum - digital output level
//! - `Hardware` - the GPIO + counter pair handed to the engine
//! - `HalError` enum - error types for hardware access
//! - `GpioFactory` type alias - factory function type for the driver registry

use crate::hal::config::HardwareConfig;
use std::sync::Arc;
use thiserror::Error;

/// Error types for hardware boundary operations.
#[derive(Debug, Clone, Error)]
pub enum HalError {
    /// Privileged memory or a required device could not be opened or mapped.
    #[error("Hardware unavailable: {0}")]
    HardwareUnavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Pin number outside the range the driver can address
    #[error("Invalid pin: {0}")]
    InvalidPin(u8),

    /// Driver not found
    #[error("Driver not found: {0}")]
    DriverNotFound(String),
}

/// Digital output level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Level {
    /// Logic low (0 V).
    #[default]
    Low,
    /// Logic high.
    High,
}

impl Level {
    /// `true` maps to `High`.
    #[inline]
    pub const fn from_bool(high: bool) -> Self {
        if high { Level::High } else { Level::Low }
    }

    /// Returns `true` for `High`.
    #[inline]
    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }
}

/// Digital output access used by the stepper engine.
///
/// Both caller threads (coil enable on start/stop) and the interpreter
/// thread (pulses, pause coil handling) write pins, so implementations take
/// `&self` and must be safe to share.
///
/// # Timing Contracts
///
/// | Operation | RT Constraint |
/// |-----------|---------------|
/// | `configure_output()` | None (startup only) |
/// | `write()` | **HARD**: no blocking, no allocation |
pub trait GpioDriver: Send + Sync {
    /// Returns the driver's unique identifier (e.g., "bcm2835", "simulation").
    fn name(&self) -> &'static str;

    /// Configure `pin` as a digital output.
    ///
    /// # Errors
    /// Returns `HalError::InvalidPin` if the driver cannot address the pin.
    fn configure_output(&self, pin: u8) -> Result<(), HalError>;

    /// Drive `pin` to `level`. Called on the hot path.
    fn write(&self, pin: u8, level: Level);
}

/// Free-running microsecond counter.
///
/// Reads must not block or allocate: the tick loop reads the counter while
/// a step pulse is held high.
pub trait FreeRunningCounter: Send + Sync {
    /// Returns the counter's identifier (e.g., "system-timer", "monotonic").
    fn name(&self) -> &'static str;

    /// Current counter value in microseconds. Monotonic, arbitrary epoch.
    fn micros(&self) -> u64;

    /// `false` for software substitutes with degraded timing precision.
    fn is_hardware(&self) -> bool {
        true
    }
}

/// The pair of hardware handles an engine is constructed with.
#[derive(Clone)]
pub struct Hardware {
    /// Digital outputs (step, direction, coil enable).
    pub gpio: Arc<dyn GpioDriver>,
    /// Timing source for calibration and pulse width.
    pub counter: Arc<dyn FreeRunningCounter>,
}

impl std::fmt::Debug for Hardware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hardware")
            .field("gpio", &self.gpio.name())
            .field("counter", &self.counter.name())
            .finish()
    }
}

/// Factory function type for creating GPIO drivers from the hardware config.
pub type GpioFactory = fn(&HardwareConfig) -> Result<Arc<dyn GpioDriver>, HalError>;
