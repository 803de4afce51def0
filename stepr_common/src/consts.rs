//! System-wide constants for the stepr workspace.
//!
//! Single source of truth for numeric limits and timing defaults.

use static_assertions::const_assert;

/// Maximum number of motors driven by one engine.
pub const MAX_MOTORS: usize = 8;

/// Highest BCM GPIO pin number addressable on the BCM2835 family.
pub const MAX_GPIO_PIN: u8 = 53;

/// Default inter-tick sleep in nanoseconds.
pub const DEFAULT_TICK_PERIOD_NS: u64 = 23_000;

/// Default settle delay after energizing a motor coil, in microseconds.
pub const DEFAULT_ENABLE_SETTLE_US: u64 = 15_000;

/// Default minimum step pulse width in microseconds.
pub const DEFAULT_PULSE_WIDTH_US: u64 = 2;

/// Number of tick periods slept during the startup frequency calibration.
pub const DEFAULT_CALIBRATION_TICKS: u32 = 10_000;

/// Upper bound on how long engine startup waits for calibration, in milliseconds.
pub const DEFAULT_CALIBRATION_TIMEOUT_MS: u64 = 10_000;

/// Default mechanical constant (steps per millimetre of travel).
pub const DEFAULT_STEPS_PER_MM: f64 = 441.0;

/// Default floor on ticks between two steps (maximum speed clamp).
pub const DEFAULT_MIN_CYCLES_PER_STEP: u32 = 15;

/// Numerator of the ramp start computation: `start_cycles = RAMP_NUMERATOR / accel`.
pub const RAMP_NUMERATOR: f64 = 200.0;

/// Default acceleration factor used by text programs that omit one.
pub const DEFAULT_ACCEL: f64 = 1.0;

/// Physical base address of the BCM2835 system timer (Raspberry Pi 1).
pub const DEFAULT_SYSTEM_TIMER_BASE: u64 = 0x2000_3000;

/// Default GPIO register device.
pub const DEFAULT_GPIO_MEM_PATH: &str = "/dev/gpiomem";

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/stepr/stepr.toml";

// Pulse batches and motor masks are sized by MAX_MOTORS.
const_assert!(MAX_MOTORS > 0 && MAX_MOTORS <= 32);
const_assert!(DEFAULT_CALIBRATION_TICKS > 0);
