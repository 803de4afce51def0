//! Thread-safe engine facade shared between caller threads and the tick
//! thread.
//!
//! Callers queue commands and toggle stepping; the tick thread reads the same
//! state through [`crate::interpreter::TickInterpreter`]. Each motor program
//! sits behind its own lock and the priority queue behind another, so a
//! caller queueing on one motor never blocks another motor's tick work.

use crate::command::{Command, LoopCount, LoopEndCmd, MoveCmd, PauseCmd};
use crate::error::EngineError;
use crate::motor::MotorState;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use stepr_common::config::{EngineConfig, TimingConfig};
use stepr_common::hal::driver::{FreeRunningCounter, GpioDriver, Hardware, Level};
use tracing::{debug, info};

/// Tick loop lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoopStatus {
    /// Loop running (or about to start).
    Running = 0,
    /// Stop requested; observed at the next tick boundary.
    StopRequested = 1,
    /// Loop exited after a stop request.
    Terminated = 2,
    /// Loop exited on an error.
    Failed = 3,
}

impl LoopStatus {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => LoopStatus::Running,
            1 => LoopStatus::StopRequested,
            2 => LoopStatus::Terminated,
            _ => LoopStatus::Failed,
        }
    }
}

/// Engine state and public operations.
pub struct Controller {
    motors: Vec<MotorState>,
    gpio: Arc<dyn GpioDriver>,
    counter: Arc<dyn FreeRunningCounter>,
    timing: TimingConfig,
    /// f64 bits; 0 until calibrated.
    tick_frequency: AtomicU64,
    priority: Mutex<VecDeque<Command>>,
    status: AtomicU8,
}

impl Controller {
    /// Validate `config`, configure every motor's outputs (step/dir low,
    /// coil released) and queue the startup calibration.
    pub fn new(config: &EngineConfig, hardware: Hardware) -> Result<Self, EngineError> {
        config.validate()?;
        let Hardware { gpio, counter } = hardware;

        let mut motors = Vec::with_capacity(config.motors.len());
        for motor in &config.motors {
            let pins = motor.pins;
            for pin in pins.outputs() {
                gpio.configure_output(pin)?;
            }
            gpio.write(pins.step, Level::Low);
            gpio.write(pins.dir, Level::Low);
            gpio.write(pins.enable, Level::High);
            debug!(
                "Motor '{}': step={} dir={} enable={} ({} steps/mm)",
                motor.name, pins.step, pins.dir, pins.enable, motor.steps_per_mm
            );
            motors.push(MotorState::new(
                motor.clone(),
                Arc::clone(&gpio),
                config.timing.enable_settle(),
            ));
        }

        info!(
            "Controller ready: {} motors, gpio={}, counter={}",
            motors.len(),
            gpio.name(),
            counter.name()
        );

        let controller = Self {
            motors,
            gpio,
            counter,
            timing: config.timing,
            tick_frequency: AtomicU64::new(0),
            priority: Mutex::new(VecDeque::new()),
            status: AtomicU8::new(LoopStatus::Running as u8),
        };
        controller.push_priority(Command::CalibrateFrequency {
            ticks: config.timing.calibration_ticks,
        });
        Ok(controller)
    }

    // ─── Inspection ─────────────────────────────────────────────────

    /// Configured motor count.
    pub fn num_motors(&self) -> usize {
        self.motors.len()
    }

    /// Motor by index.
    pub fn motor(&self, index: usize) -> Result<&MotorState, EngineError> {
        self.motors.get(index).ok_or(EngineError::InvalidMotor {
            index,
            count: self.motors.len(),
        })
    }

    /// Index of the motor named `name`.
    pub fn motor_index(&self, name: &str) -> Option<usize> {
        self.motors.iter().position(|m| m.name() == name)
    }

    pub(crate) fn motors(&self) -> &[MotorState] {
        &self.motors
    }

    /// Measured tick frequency in Hz, once calibrated.
    pub fn tick_frequency(&self) -> Option<f64> {
        let f = f64::from_bits(self.tick_frequency.load(Ordering::Acquire));
        (f > 0.0).then_some(f)
    }

    pub(crate) fn set_tick_frequency(&self, hz: f64) {
        self.tick_frequency.store(hz.to_bits(), Ordering::Release);
    }

    /// Timing parameters.
    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    pub(crate) fn gpio(&self) -> &dyn GpioDriver {
        self.gpio.as_ref()
    }

    pub(crate) fn counter(&self) -> &dyn FreeRunningCounter {
        self.counter.as_ref()
    }

    /// Queued command count.
    pub fn queue_len(&self, motor: usize) -> Result<usize, EngineError> {
        Ok(self.motor(motor)?.program.lock().len())
    }

    /// Cursor position.
    pub fn cursor(&self, motor: usize) -> Result<usize, EngineError> {
        Ok(self.motor(motor)?.program.lock().cursor())
    }

    /// Snapshot of the queued commands, including their live counters.
    pub fn commands(&self, motor: usize) -> Result<Vec<Command>, EngineError> {
        Ok(self.motor(motor)?.program.lock().commands().to_vec())
    }

    /// Stepping flag.
    pub fn is_stepping(&self, motor: usize) -> Result<bool, EngineError> {
        Ok(self.motor(motor)?.is_stepping())
    }

    /// Coil energized.
    pub fn is_coil_enabled(&self, motor: usize) -> Result<bool, EngineError> {
        Ok(self.motor(motor)?.is_coil_enabled())
    }

    /// Not stepping, or the program is exhausted.
    pub fn is_idle(&self, motor: usize) -> Result<bool, EngineError> {
        let m = self.motor(motor)?;
        Ok(!m.is_stepping() || m.program.lock().is_exhausted())
    }

    /// Every motor idle.
    pub fn all_idle(&self) -> bool {
        (0..self.motors.len()).all(|i| self.is_idle(i).unwrap_or(true))
    }

    // ─── Queueing ───────────────────────────────────────────────────

    /// Queue a ramped move of `distance` mm over `duration` s.
    pub fn queue_move(
        &self,
        motor: usize,
        distance: f64,
        duration: f64,
        accel: f64,
    ) -> Result<(), EngineError> {
        let m = self.motor(motor)?;
        let frequency = self.tick_frequency().unwrap_or(0.0);
        let cmd = MoveCmd::new(distance, duration, accel, m.config(), frequency)?;
        debug!(
            "Motor {motor}: queue move {distance}mm/{duration}s, {} steps, cycles {}→{}",
            cmd.num_triggers, cmd.init_num_cycles, cmd.end_num_cycles
        );
        m.program.lock().push(Command::Move(cmd));
        Ok(())
    }

    /// Queue a pause of `duration` s with the coil released.
    pub fn queue_pause(&self, motor: usize, duration: f64) -> Result<(), EngineError> {
        let m = self.motor(motor)?;
        let cmd = PauseCmd::new(duration, self.tick_frequency().unwrap_or(0.0))?;
        debug!("Motor {motor}: queue pause {duration}s = {} ticks", cmd.num_cycles);
        m.program.lock().push(Command::Pause(cmd));
        Ok(())
    }

    /// Queue a loop start marker; returns its queue index for the loop end.
    pub fn queue_loop_start(&self, motor: usize) -> Result<usize, EngineError> {
        let index = self.motor(motor)?.program.lock().push(Command::LoopStart);
        debug!("Motor {motor}: queue loop start at {index}");
        Ok(index)
    }

    /// Queue a loop end jumping back to `start_index`.
    ///
    /// `iterations < 0` loops until the motor is stopped; `0` is rejected.
    pub fn queue_loop_end(
        &self,
        motor: usize,
        start_index: usize,
        iterations: i64,
    ) -> Result<(), EngineError> {
        let m = self.motor(motor)?;
        let count = LoopCount::from_iterations(iterations)?;
        let mut program = m.program.lock();
        if !matches!(program.get(start_index), Some(Command::LoopStart)) {
            return Err(EngineError::InvalidLoopStart {
                motor,
                index: start_index,
            });
        }
        program.push(Command::LoopEnd(LoopEndCmd::new(start_index, count)));
        debug!("Motor {motor}: queue loop end → {start_index} ({count:?})");
        Ok(())
    }

    // ─── Control ────────────────────────────────────────────────────

    /// Energize the coil and start executing the program.
    pub fn start_motor(&self, motor: usize) -> Result<(), EngineError> {
        let m = self.motor(motor)?;
        m.set_coil(true);
        m.set_stepping(true);
        info!("Motor {motor} started");
        Ok(())
    }

    /// Stop executing and release the coil. Queue and cursor are kept.
    pub fn stop_motor(&self, motor: usize) -> Result<(), EngineError> {
        let m = self.motor(motor)?;
        m.set_stepping(false);
        m.set_coil(false);
        info!("Motor {motor} stopped");
        Ok(())
    }

    /// Stop and rewind the program to its first command.
    pub fn reset_motor(&self, motor: usize) -> Result<(), EngineError> {
        let m = self.motor(motor)?;
        m.set_stepping(false);
        m.program.lock().rewind();
        m.set_coil(false);
        info!("Motor {motor} reset");
        Ok(())
    }

    /// Stop and delete every queued command.
    pub fn clear_motor(&self, motor: usize) -> Result<(), EngineError> {
        let m = self.motor(motor)?;
        m.set_stepping(false);
        m.program.lock().clear();
        m.set_coil(false);
        info!("Motor {motor} cleared");
        Ok(())
    }

    /// Start every motor that has queued commands.
    pub fn start_all(&self) {
        for (index, m) in self.motors.iter().enumerate() {
            if m.program.lock().is_empty() {
                debug!("Motor {index}: nothing queued, not started");
                continue;
            }
            m.set_coil(true);
            m.set_stepping(true);
        }
        info!("All motors started");
    }

    /// Stop every motor.
    pub fn stop_all(&self) {
        for m in &self.motors {
            m.set_stepping(false);
            m.set_coil(false);
        }
        info!("All motors stopped");
    }

    /// Reset every motor.
    pub fn reset_all(&self) {
        for m in &self.motors {
            m.set_stepping(false);
            m.program.lock().rewind();
            m.set_coil(false);
        }
        info!("All motors reset");
    }

    /// Clear every motor.
    pub fn clear_all(&self) {
        for m in &self.motors {
            m.set_stepping(false);
            m.program.lock().clear();
            m.set_coil(false);
        }
        info!("All motors cleared");
    }

    // ─── Tick loop plumbing ─────────────────────────────────────────

    /// Current loop status.
    pub fn status(&self) -> LoopStatus {
        LoopStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub(crate) fn set_status(&self, status: LoopStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    /// Ask the tick loop to exit at the next tick boundary.
    pub fn request_stop(&self) {
        // Only a running loop moves to StopRequested; terminal states stay.
        let _ = self.status.compare_exchange(
            LoopStatus::Running as u8,
            LoopStatus::StopRequested as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Queue a command ahead of all motor work for the next tick.
    pub(crate) fn push_priority(&self, command: Command) {
        self.priority.lock().push_back(command);
    }

    /// Pop the next priority command.
    pub(crate) fn pop_priority(&self) -> Option<Command> {
        self.priority.lock().pop_front()
    }

    /// Drive every output to its safe level.
    pub fn park_outputs(&self) {
        for m in &self.motors {
            m.park();
        }
    }

    /// Drop all queued work, motor and priority.
    pub(crate) fn drop_queues(&self) {
        for m in &self.motors {
            m.program.lock().clear();
        }
        self.priority.lock().clear();
    }
}
