//! Configuration loading traits and types.
//!
//! This module provides a standardized way to load TOML configuration files
//! and the top-level [`EngineConfig`] consumed by the stepper engine.
//!
//! # Usage
//!
//! ```rust,no_run
//! use stepr_common::config::{ConfigLoader, ConfigError, EngineConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = EngineConfig::load(Path::new("stepr.toml"))?;
//!     config.validate()?;
//!     println!("Motors: {}", config.motors.len());
//!     Ok(())
//! }
//! ```

use crate::consts::{
    DEFAULT_CALIBRATION_TICKS, DEFAULT_CALIBRATION_TIMEOUT_MS, DEFAULT_ENABLE_SETTLE_US,
    DEFAULT_MIN_CYCLES_PER_STEP, DEFAULT_PULSE_WIDTH_US, DEFAULT_STEPS_PER_MM,
    DEFAULT_TICK_PERIOD_NS, MAX_MOTORS,
};
use crate::hal::config::{HardwareConfig, MotorConfig, MotorPins};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

fn default_service_name() -> String {
    "stepr".to_string()
}

/// Common configuration fields.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "stepr-bench-01"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: default_service_name(),
        }
    }
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

fn default_tick_period_ns() -> u64 {
    DEFAULT_TICK_PERIOD_NS
}

fn default_enable_settle_us() -> u64 {
    DEFAULT_ENABLE_SETTLE_US
}

fn default_pulse_width_us() -> u64 {
    DEFAULT_PULSE_WIDTH_US
}

fn default_calibration_ticks() -> u32 {
    DEFAULT_CALIBRATION_TICKS
}

fn default_calibration_timeout_ms() -> u64 {
    DEFAULT_CALIBRATION_TIMEOUT_MS
}

fn default_true() -> bool {
    true
}

/// Tick loop timing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Nominal sleep between two ticks [ns].
    #[serde(default = "default_tick_period_ns")]
    pub tick_period_ns: u64,

    /// Delay after energizing a coil before stepping [µs].
    #[serde(default = "default_enable_settle_us")]
    pub enable_settle_us: u64,

    /// Minimum step pulse width [µs]. Zero disables the hold.
    #[serde(default = "default_pulse_width_us")]
    pub pulse_width_us: u64,

    /// Tick periods slept during startup calibration.
    #[serde(default = "default_calibration_ticks")]
    pub calibration_ticks: u32,

    /// Upper bound on how long startup waits for calibration [ms].
    #[serde(default = "default_calibration_timeout_ms")]
    pub calibration_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_period_ns: DEFAULT_TICK_PERIOD_NS,
            enable_settle_us: DEFAULT_ENABLE_SETTLE_US,
            pulse_width_us: DEFAULT_PULSE_WIDTH_US,
            calibration_ticks: DEFAULT_CALIBRATION_TICKS,
            calibration_timeout_ms: DEFAULT_CALIBRATION_TIMEOUT_MS,
        }
    }
}

impl TimingConfig {
    /// Inter-tick sleep.
    pub fn tick_period(&self) -> Duration {
        Duration::from_nanos(self.tick_period_ns)
    }

    /// Coil settle delay.
    pub fn enable_settle(&self) -> Duration {
        Duration::from_micros(self.enable_settle_us)
    }

    /// Calibration wait bound.
    pub fn calibration_timeout(&self) -> Duration {
        Duration::from_millis(self.calibration_timeout_ms)
    }
}

/// Real-time scheduling requests for the tick thread. All best-effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtConfig {
    /// Request SCHED_FIFO at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// SCHED_FIFO priority; `None` selects the maximum for the policy.
    #[serde(default)]
    pub priority: Option<i32>,

    /// Pin the tick thread to this CPU core.
    #[serde(default)]
    pub cpu_core: Option<usize>,

    /// `mlockall(MCL_CURRENT | MCL_FUTURE)`.
    #[serde(default = "default_true")]
    pub lock_memory: bool,
}

impl Default for RtConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: None,
            cpu_core: None,
            lock_memory: true,
        }
    }
}

impl RtConfig {
    /// No scheduling or memory-lock requests.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            priority: None,
            cpu_core: None,
            lock_memory: false,
        }
    }
}

/// Top-level engine configuration loaded from `stepr.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Service name and log level.
    #[serde(default)]
    pub shared: SharedConfig,

    /// Tick loop timing.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Real-time scheduling requests.
    #[serde(default)]
    pub rt: RtConfig,

    /// GPIO driver and counter selection.
    #[serde(default)]
    pub hardware: HardwareConfig,

    /// One entry per motor, in motor-index order.
    #[serde(default)]
    pub motors: Vec<MotorConfig>,
}

impl Default for EngineConfig {
    /// Two-motor Raspberry Pi wiring (BCM numbering).
    fn default() -> Self {
        let motor = |name: &str, step: u8, dir: u8, enable: u8, limit_low: u8, limit_high: u8| MotorConfig {
            name: name.to_string(),
            pins: MotorPins {
                step,
                dir,
                enable,
                limit_low: Some(limit_low),
                limit_high: Some(limit_high),
            },
            steps_per_mm: DEFAULT_STEPS_PER_MM,
            min_cycles_per_step: DEFAULT_MIN_CYCLES_PER_STEP,
        };

        Self {
            shared: SharedConfig::default(),
            timing: TimingConfig::default(),
            rt: RtConfig::default(),
            hardware: HardwareConfig::default(),
            motors: vec![motor("motor-0", 17, 18, 2, 27, 22), motor("motor-1", 23, 24, 3, 25, 4)],
        }
    }
}

impl EngineConfig {
    /// Validate the engine configuration.
    ///
    /// # Validation Rules
    /// 1. 1 ≤ `motors.len()` ≤ MAX_MOTORS
    /// 2. Each motor entry valid (see `MotorConfig::validate`)
    /// 3. Motor names unique
    /// 4. No output pin driven by two motors (or twice by one)
    /// 5. `tick_period_ns` > 0, `calibration_ticks` > 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.motors.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one motor must be configured".to_string(),
            ));
        }
        if self.motors.len() > MAX_MOTORS {
            return Err(ConfigError::ValidationError(format!(
                "Too many motors: {} (max {})",
                self.motors.len(),
                MAX_MOTORS
            )));
        }

        let mut names = HashSet::new();
        let mut pins = HashSet::new();
        for motor in &self.motors {
            motor
                .validate()
                .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
            if !names.insert(motor.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate motor name: {}",
                    motor.name
                )));
            }
            for pin in motor.pins.outputs() {
                if !pins.insert(pin) {
                    return Err(ConfigError::ValidationError(format!(
                        "Output pin {pin} assigned more than once (motor {})",
                        motor.name
                    )));
                }
            }
        }

        if self.timing.tick_period_ns == 0 {
            return Err(ConfigError::ValidationError(
                "tick_period_ns must be greater than 0".to_string(),
            ));
        }
        if self.timing.calibration_ticks == 0 {
            return Err(ConfigError::ValidationError(
                "calibration_ticks must be greater than 0".to_string(),
            ));
        }
        if let Some(priority) = self.rt.priority {
            if !(1..=99).contains(&priority) {
                return Err(ConfigError::ValidationError(format!(
                    "rt.priority must be within 1..=99, got {priority}"
                )));
            }
        }

        Ok(())
    }

    /// Load from a TOML file and validate.
    pub fn load_validated(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        tracing::debug!(
            "Loaded engine config from {}: {} motors, tick_period={}ns",
            path.display(),
            config.motors.len(),
            config.timing.tick_period_ns
        );
        Ok(config)
    }
}
