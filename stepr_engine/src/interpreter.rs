//! Tick interpreter: advances every stepping motor by one tick and fires
//! the resulting step pulses as one batch.
//!
//! ## Per-tick sequence
//! 1. Drain the priority queue (startup calibration).
//! 2. For each stepping motor with work left: skip loop-start markers and
//!    advance the command under the cursor by one tick. At most one pulse
//!    per motor. A motor about to step gets its coil energized first; a
//!    motor inside a pause keeps it released.
//! 3. Fire all pulses together: direction pins, step pins high, hold the
//!    pulse width on the free-running counter, step pins low.
//! 4. Release the coil of every motor that had no work this tick.
//!
//! The pulse batch is a fixed-capacity `heapless::Vec`; nothing here
//! allocates.

use crate::calibration::calibrate;
use crate::command::{Command, Direction, LoopTick, MoveTick};
use crate::controller::Controller;
use crate::error::CalibrationError;
use crate::motor::MotorProgram;
use heapless::Vec as HVec;
use stepr_common::consts::MAX_MOTORS;
use stepr_common::hal::driver::{FreeRunningCounter, GpioDriver, Level};
use tracing::{info, warn};

/// One step pulse scheduled for this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pulse {
    /// Motor index.
    pub motor: usize,
    /// Step pin.
    pub step_pin: u8,
    /// Direction pin.
    pub dir_pin: u8,
    /// Direction for this step.
    pub dir: Direction,
}

/// What one tick did to one motor's program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotorTick {
    /// Motor had a command to work on.
    pub active: bool,
    /// Step to emit.
    pub step: Option<Direction>,
    /// Release the coil (pause in progress).
    pub release_coil: bool,
    /// Energize the coil (pause finished).
    pub energize_coil: bool,
}

/// Summary of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// Pulses fired.
    pub pulses: usize,
    /// This tick ran the startup calibration.
    pub calibrated: bool,
}

/// Advance a program by one tick.
///
/// Loop-start markers (and stray calibration commands) under the cursor are
/// skipped first; running off the end leaves the motor inactive.
pub fn advance_program(program: &mut MotorProgram) -> MotorTick {
    let mut out = MotorTick::default();

    loop {
        match program.current_mut() {
            None => return out,
            Some(Command::LoopStart | Command::CalibrateFrequency { .. }) => program.advance(),
            Some(_) => break,
        }
    }
    out.active = true;

    let mut next: Option<usize> = None;
    let mut advance = false;
    match program.current_mut() {
        Some(Command::Move(m)) => match m.tick() {
            MoveTick::Wait => {}
            MoveTick::Step => out.step = Some(m.dir),
            MoveTick::LastStep => {
                out.step = Some(m.dir);
                advance = true;
            }
        },
        Some(Command::Pause(p)) => {
            out.release_coil = true;
            if p.tick() {
                out.energize_coil = true;
                advance = true;
            }
        }
        Some(Command::LoopEnd(l)) => match l.tick() {
            LoopTick::Jump(start) => next = Some(start),
            LoopTick::Exit => advance = true,
        },
        _ => {}
    }

    if let Some(index) = next {
        program.jump(index);
    } else if advance {
        program.advance();
    }
    out
}

/// Raise and lower a batch of step pulses.
///
/// Direction pins are written before any step pin rises; the step pins stay
/// high for at least `width_us` on `counter`.
pub fn fire_pulses(
    gpio: &dyn GpioDriver,
    counter: &dyn FreeRunningCounter,
    pulses: &[Pulse],
    width_us: u64,
) {
    if pulses.is_empty() {
        return;
    }
    for p in pulses {
        gpio.write(p.dir_pin, p.dir.level());
        gpio.write(p.step_pin, Level::High);
    }
    if width_us > 0 {
        let start = counter.micros();
        while counter.micros().wrapping_sub(start) < width_us {
            core::hint::spin_loop();
        }
    }
    for p in pulses {
        gpio.write(p.step_pin, Level::Low);
    }
}

/// Reusable per-tick scratch state.
pub struct TickInterpreter {
    pulses: HVec<Pulse, MAX_MOTORS>,
    active: [bool; MAX_MOTORS],
    ticks: u64,
}

impl TickInterpreter {
    /// Fresh interpreter.
    pub fn new() -> Self {
        Self {
            pulses: HVec::new(),
            active: [false; MAX_MOTORS],
            ticks: 0,
        }
    }

    /// Ticks executed.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Pulses fired by the last tick.
    pub fn last_pulses(&self) -> &[Pulse] {
        &self.pulses
    }

    /// Run one tick against `controller`. Does not sleep.
    pub fn tick(&mut self, controller: &Controller) -> Result<TickReport, CalibrationError> {
        let calibrated = self.drain_priority(controller)?;

        self.pulses.clear();
        for (index, motor) in controller.motors().iter().enumerate() {
            self.active[index] = false;
            if !motor.is_stepping() {
                continue;
            }

            let outcome = advance_program(&mut motor.program.lock());
            self.active[index] = outcome.active;

            if let Some(dir) = outcome.step {
                motor.set_coil(true);
                let pins = motor.config().pins;
                // Capacity equals MAX_MOTORS and each motor pushes at most once.
                let _ = self.pulses.push(Pulse {
                    motor: index,
                    step_pin: pins.step,
                    dir_pin: pins.dir,
                    dir,
                });
            }
            if outcome.release_coil {
                motor.set_coil(false);
            }
            if outcome.energize_coil {
                motor.set_coil(true);
            }
        }

        fire_pulses(
            controller.gpio(),
            controller.counter(),
            &self.pulses,
            controller.timing().pulse_width_us,
        );

        for (index, motor) in controller.motors().iter().enumerate() {
            if !self.active[index] {
                motor.set_coil(false);
            }
        }

        self.ticks += 1;
        Ok(TickReport {
            pulses: self.pulses.len(),
            calibrated,
        })
    }

    /// Execute pending priority commands; `true` if calibration ran.
    fn drain_priority(&self, controller: &Controller) -> Result<bool, CalibrationError> {
        let mut calibrated = false;
        while let Some(command) = controller.pop_priority() {
            match command {
                Command::CalibrateFrequency { ticks } => {
                    if let Some(hz) = controller.tick_frequency() {
                        warn!("Ignoring repeated calibration request; keeping {:.1} Hz", hz);
                        continue;
                    }
                    let hz = calibrate(controller.counter(), ticks, controller.timing().tick_period())?;
                    controller.set_tick_frequency(hz);
                    info!(
                        "Calibrated tick frequency: {:.1} Hz over {} ticks (nominal {:.1} Hz)",
                        hz,
                        ticks,
                        1e9 / controller.timing().tick_period_ns as f64
                    );
                    calibrated = true;
                }
                other => warn!("Ignoring non-priority command '{}' on priority queue", other.kind()),
            }
        }
        Ok(calibrated)
    }
}

impl Default for TickInterpreter {
    fn default() -> Self {
        Self::new()
    }
}
