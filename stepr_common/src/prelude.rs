//! Prelude module for common re-exports.
//!
//! ```rust
//! use stepr_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{
    ConfigError, ConfigLoader, EngineConfig, LogLevel, RtConfig, SharedConfig, TimingConfig,
};

// ─── Hardware Boundary ──────────────────────────────────────────────
pub use crate::hal::config::{CounterKind, HardwareConfig, MotorConfig, MotorPins};
pub use crate::hal::driver::{FreeRunningCounter, GpioDriver, HalError, Hardware, Level};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{MAX_MOTORS, RAMP_NUMERATOR};
