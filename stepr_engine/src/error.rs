//! Engine error types.

use std::time::Duration;
use stepr_common::config::ConfigError;
use stepr_common::hal::driver::HalError;
use thiserror::Error;

/// Startup frequency calibration failed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CalibrationError {
    /// The counter did not advance across the calibration window.
    #[error("counter '{counter}' reported {elapsed_us}µs over {ticks} calibration ticks")]
    NoElapsedTime {
        /// Counter name.
        counter: &'static str,
        /// Tick periods slept.
        ticks: u32,
        /// Measured elapsed time (zero or wrapped).
        elapsed_us: i64,
    },

    /// Calibration requested with a zero tick count.
    #[error("calibration requires at least one tick")]
    ZeroTicks,
}

/// Errors returned by engine construction and facade operations.
///
/// Facade operations never mutate state when they return an error.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Motor index outside `0..num_motors`.
    #[error("invalid motor index {index} (engine has {count} motors)")]
    InvalidMotor {
        /// Requested index.
        index: usize,
        /// Configured motor count.
        count: usize,
    },

    /// Move distance is zero or not finite.
    #[error("invalid move distance: {0}")]
    InvalidDistance(f64),

    /// Duration is not strictly positive and finite.
    #[error("invalid duration: {0}s")]
    InvalidDuration(f64),

    /// Acceleration factor is not strictly positive and finite.
    #[error("invalid acceleration: {0}")]
    InvalidAcceleration(f64),

    /// Distance rounds to zero steps.
    #[error("move of {distance}mm is shorter than one step at {steps_per_mm} steps/mm")]
    MoveTooShort {
        /// Requested distance [mm].
        distance: f64,
        /// Motor resolution.
        steps_per_mm: f64,
    },

    /// Loop iteration count of zero.
    #[error("loop iteration count must be non-zero (negative means infinite)")]
    InvalidIterations,

    /// Loop end refers to a queue slot that is not a loop start.
    #[error("motor {motor}: index {index} is not a loop start")]
    InvalidLoopStart {
        /// Motor index.
        motor: usize,
        /// Referenced queue index.
        index: usize,
    },

    /// A duration-based command was queued before the tick frequency is known.
    #[error("tick frequency not calibrated yet")]
    NotCalibrated,

    /// The interpreter thread could not be spawned.
    #[error("failed to spawn tick thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    /// The interpreter thread panicked.
    #[error("tick thread panicked: {0}")]
    TickThreadPanicked(String),

    /// Startup calibration failed.
    #[error("calibration failed: {0}")]
    Calibration(#[from] CalibrationError),

    /// Startup calibration did not finish in time.
    #[error("calibration did not complete within {0:?}")]
    CalibrationTimeout(Duration),

    /// Invalid engine configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Hardware access failed.
    #[error("hardware error: {0}")]
    Hal(#[from] HalError),
}
