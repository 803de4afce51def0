//! Opens the configured GPIO driver and counter as one [`Hardware`] pair.

use crate::counter::open_counter;
use crate::driver_registry::DriverRegistry;
use stepr_common::hal::config::HardwareConfig;
use stepr_common::hal::driver::{Hardware, HalError};
use tracing::{info, warn};

/// Create the GPIO driver named in `config` from `registry` and open the
/// configured counter.
///
/// # Errors
/// `HalError::DriverNotFound` for an unknown driver name, otherwise whatever
/// the driver factory or counter reports (typically `HardwareUnavailable`).
pub fn open_hardware(config: &HardwareConfig, registry: &DriverRegistry) -> Result<Hardware, HalError> {
    let gpio = registry.create_driver(config)?;
    let counter = open_counter(config)?;

    if !counter.is_hardware() && gpio.name() != "simulation" {
        warn!(
            "GPIO driver '{}' paired with software counter '{}'; step timing will jitter",
            gpio.name(),
            counter.name()
        );
    }
    info!("Hardware opened: gpio={}, counter={}", gpio.name(), counter.name());

    Ok(Hardware { gpio, counter })
}
