//! Per-motor program queue and coil/stepping state.

use crate::command::Command;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use stepr_common::hal::config::MotorConfig;
use stepr_common::hal::driver::{GpioDriver, Level};
use tracing::trace;

/// Ordered command queue with the interpreter cursor.
///
/// `cursor == commands.len()` means the program is exhausted.
#[derive(Debug, Default, Clone)]
pub struct MotorProgram {
    commands: Vec<Command>,
    cursor: usize,
}

impl MotorProgram {
    /// Empty program.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command; returns its queue index.
    pub fn push(&mut self, command: Command) -> usize {
        self.commands.push(command);
        self.commands.len() - 1
    }

    /// Number of queued commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// No commands queued.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Index of the command executed next.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Cursor ran off the end of the queue.
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.commands.len()
    }

    /// Queued commands in order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Command at `index`.
    pub fn get(&self, index: usize) -> Option<&Command> {
        self.commands.get(index)
    }

    /// Command under the cursor.
    pub(crate) fn current_mut(&mut self) -> Option<&mut Command> {
        self.commands.get_mut(self.cursor)
    }

    /// Move the cursor to `index`, clamped to the queue length.
    pub(crate) fn jump(&mut self, index: usize) {
        self.cursor = index.min(self.commands.len());
    }

    /// Move the cursor to the next command.
    pub(crate) fn advance(&mut self) {
        self.jump(self.cursor + 1);
    }

    /// Cursor to 0, every command back to its queued state.
    pub fn rewind(&mut self) {
        self.cursor = 0;
        for command in &mut self.commands {
            command.rewind();
        }
    }

    /// Drop every command.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.cursor = 0;
    }
}

/// Runtime state of one motor.
pub struct MotorState {
    config: MotorConfig,
    gpio: Arc<dyn GpioDriver>,
    enable_settle: Duration,
    pub(crate) program: Mutex<MotorProgram>,
    stepping: AtomicBool,
    coil: Mutex<bool>,
}

impl MotorState {
    /// Motor with an empty program, coil released.
    pub(crate) fn new(config: MotorConfig, gpio: Arc<dyn GpioDriver>, enable_settle: Duration) -> Self {
        Self {
            config,
            gpio,
            enable_settle,
            program: Mutex::new(MotorProgram::new()),
            stepping: AtomicBool::new(false),
            coil: Mutex::new(false),
        }
    }

    /// Static configuration.
    pub fn config(&self) -> &MotorConfig {
        &self.config
    }

    /// Motor name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Interpreter advances this motor's program.
    #[inline]
    pub fn is_stepping(&self) -> bool {
        self.stepping.load(Ordering::Acquire)
    }

    pub(crate) fn set_stepping(&self, stepping: bool) {
        self.stepping.store(stepping, Ordering::Release);
    }

    /// Coil currently energized.
    pub fn is_coil_enabled(&self) -> bool {
        *self.coil.lock()
    }

    /// Energize or release the coil. The enable input is active low.
    ///
    /// No-op when the coil is already in the requested state. Energizing
    /// sleeps for the settle delay after the pin write, outside the lock.
    pub(crate) fn set_coil(&self, energized: bool) {
        {
            let mut coil = self.coil.lock();
            if *coil == energized {
                return;
            }
            self.gpio
                .write(self.config.pins.enable, Level::from_bool(!energized));
            *coil = energized;
        }
        trace!(motor = %self.config.name, energized, "coil");
        if energized && !self.enable_settle.is_zero() {
            std::thread::sleep(self.enable_settle);
        }
    }

    /// Step and direction low, coil released, stepping off.
    pub(crate) fn park(&self) {
        self.set_stepping(false);
        let pins = self.config.pins;
        self.gpio.write(pins.step, Level::Low);
        self.gpio.write(pins.dir, Level::Low);
        let mut coil = self.coil.lock();
        self.gpio.write(pins.enable, Level::High);
        *coil = false;
    }
}
