//! # stepr Engine Library
//!
//! Tick-driven stepper motor engine. A dedicated tick thread sleeps one
//! fixed period per tick, advances each stepping motor's command program by
//! one tick and fires the resulting step pulses together. All durations are
//! converted to tick counts using a tick frequency measured once at startup
//! against a free-running microsecond counter.
//!
//! ## Threads
//!
//! - **Caller threads** queue commands and start/stop motors through the
//!   [`Controller`] facade.
//! - **Tick thread** ([`cycle::run_tick_loop`]) owns pacing, calibration and
//!   pulse output.
//!
//! ## Commands
//!
//! Per motor: ramped moves, pauses with the coil released, and loop markers
//! (bounded or infinite). A motor-independent priority queue carries the
//! startup calibration.

pub mod calibration;
pub mod command;
pub mod controller;
pub mod cycle;
pub mod engine;
pub mod error;
pub mod interpreter;
pub mod motor;
pub mod program;

pub use crate::command::{Command, Direction, LoopCount};
pub use crate::controller::{Controller, LoopStatus};
pub use crate::cycle::TickStats;
pub use crate::engine::Engine;
pub use crate::error::{CalibrationError, EngineError};
pub use crate::interpreter::TickInterpreter;
pub use crate::program::{Program, ProgramError};
