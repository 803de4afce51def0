//! # stepr HAL Library
//!
//! Hardware backends for the stepper engine's hardware boundary.
//! Drivers implement the `GpioDriver` / `FreeRunningCounter` traits defined
//! in `stepr_common::hal::driver`.
//!
//! # Module Structure
//!
//! - [`counter`] - System timer, monotonic and simulation counters
//! - [`driver_registry`] - GPIO driver factory registration
//! - [`drivers`] - GPIO driver implementations
//! - [`hardware`] - Opens the configured GPIO + counter pair
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        stepr_hal                         │
//! │  ┌────────────────┐   ┌──────────────┐   ┌────────────┐  │
//! │  │ DriverRegistry │──►│ GpioDriver   │   │  counter   │  │
//! │  │  (factories)   │   │ bcm2835/sim  │   │ st / mono  │  │
//! │  └────────────────┘   └──────┬───────┘   └─────┬──────┘  │
//! │                              └──────┬──────────┘         │
//! │                                     ▼                    │
//! │                            Hardware { gpio, counter }    │
//! └──────────────────────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]

pub mod counter;
pub mod driver_registry;
pub mod drivers;
pub mod hardware;

pub use crate::counter::{open_counter, MonotonicCounter, SimulationCounter, SystemTimerCounter};
pub use crate::driver_registry::DriverRegistry;
pub use crate::drivers::simulation::SimulationGpio;
pub use crate::hardware::open_hardware;
