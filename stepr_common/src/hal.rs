//! Hardware boundary types and configuration.
//!
//! The engine never touches registers directly. It consumes the
//! [`driver::GpioDriver`] and [`driver::FreeRunningCounter`] traits, which
//! `stepr_hal` implements for real hardware and for simulation.

pub mod config;
pub mod driver;
