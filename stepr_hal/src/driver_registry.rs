//! Driver registry for GPIO drivers.
//!
//! Provides a `DriverRegistry` struct for registering and retrieving GPIO
//! driver factories. This uses constructor-injection rather than global state.

use std::collections::HashMap;
use std::sync::Arc;

use stepr_common::hal::config::HardwareConfig;
use stepr_common::hal::driver::{GpioDriver, GpioFactory, HalError};

/// Registry of available GPIO drivers.
///
/// Constructed at startup, populated via `register()`, and consulted by
/// [`crate::hardware::open_hardware`]. No global state, testable in isolation.
pub struct DriverRegistry {
    factories: HashMap<&'static str, GpioFactory>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry holding every built-in driver.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        crate::drivers::register_all_drivers(&mut registry);
        registry
    }

    /// Register a driver factory.
    ///
    /// # Panics
    /// Panics if a driver with the same name is already registered.
    pub fn register(&mut self, name: &'static str, factory: GpioFactory) {
        if self.factories.contains_key(name) {
            panic!("Driver '{name}' is already registered");
        }
        self.factories.insert(name, factory);
    }

    /// Get a driver factory by name.
    pub fn get_factory(&self, name: &str) -> Option<GpioFactory> {
        self.factories.get(name).copied()
    }

    /// Create the driver named by `config.gpio_driver`.
    ///
    /// # Errors
    /// Returns `HalError::DriverNotFound` if no driver with that name is registered,
    /// or whatever the factory reports when the hardware cannot be opened.
    pub fn create_driver(&self, config: &HardwareConfig) -> Result<Arc<dyn GpioDriver>, HalError> {
        let factory = self
            .get_factory(&config.gpio_driver)
            .ok_or_else(|| HalError::DriverNotFound(config.gpio_driver.clone()))?;
        factory(config)
    }

    /// List all registered driver names.
    pub fn list_drivers(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
