//! GPIO driver implementations.
//!
//! - [`bcm2835`] - Memory-mapped BCM2835/2836/2837 GPIO registers
//! - [`simulation`] - Recording driver for development and testing
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement the `GpioDriver` trait from `stepr_common::hal::driver`
//! 3. Register its factory in [`register_all_drivers`]

pub mod bcm2835;
pub mod simulation;

use crate::driver_registry::DriverRegistry;

/// Register all built-in drivers.
pub fn register_all_drivers(registry: &mut DriverRegistry) {
    registry.register("bcm2835", bcm2835::create_driver);
    registry.register("simulation", simulation::create_driver);
}
